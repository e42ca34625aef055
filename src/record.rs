//! Source records and the attributes they carry.
//!
//! A source record is one independently submitted description of a
//! real-world entity. The linking core never owns source records; it only
//! reads their persisted id, display attributes, identifiers and tags.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Persistent numeric identifier assigned by the record store.
///
/// Links are keyed by pids, never by raw resource references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pid(u64);

impl Pid {
    /// Wraps a raw store id.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw store id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Pid {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// A person's name.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HumanName {
    /// Family name.
    pub family: Option<String>,
    /// Given names, in order.
    pub given: Vec<String>,
}

impl HumanName {
    /// Creates a name from a family name and given names.
    #[must_use]
    pub fn new<I, S>(family: impl Into<String>, given: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            family: Some(family.into()),
            given: given.into_iter().map(Into::into).collect(),
        }
    }

    /// Given names joined by a single space.
    #[must_use]
    pub fn given_as_single_string(&self) -> String {
        self.given.join(" ")
    }

    /// Returns true when neither a family nor a given name is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.family.as_deref().map_or(true, |f| f.trim().is_empty())
            && self.given.iter().all(|g| g.trim().is_empty())
    }
}

/// Where an identifier value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierOrigin {
    /// Supplied by a source system or a person.
    External,
    /// Generated by this core when no value was supplied.
    SystemAssigned,
}

/// A `(system, value)` identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    /// Namespace URI of the identifier.
    pub system: String,
    /// Identifier value within the namespace.
    pub value: String,
    /// Provenance of the value.
    pub origin: IdentifierOrigin,
}

impl Identifier {
    /// Creates an externally supplied identifier.
    #[must_use]
    pub fn external(system: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            value: value.into(),
            origin: IdentifierOrigin::External,
        }
    }

    /// Creates a system-assigned identifier.
    #[must_use]
    pub fn system_assigned(system: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            value: value.into(),
            origin: IdentifierOrigin::SystemAssigned,
        }
    }

    /// Returns true if this identifier lives in `system`.
    #[must_use]
    pub fn is_in(&self, system: &str) -> bool {
        self.system == system
    }
}

/// A `(system, code)` metadata tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    /// Tag namespace.
    pub system: String,
    /// Tag code.
    pub code: String,
}

impl Tag {
    /// Creates a tag.
    #[must_use]
    pub fn new(system: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            code: code.into(),
        }
    }
}

/// An incoming record that may be resolved to a golden record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Resource reference, e.g. `Patient/123`.
    pub resource_id: String,
    /// Persisted id, `None` until the record store has saved the record.
    pub pid: Option<Pid>,
    /// Display name.
    pub name: Option<HumanName>,
    /// Date of birth.
    pub birth_date: Option<NaiveDate>,
    /// Identifiers, in submission order.
    pub identifiers: Vec<Identifier>,
    /// Metadata tags.
    pub tags: Vec<Tag>,
}

impl SourceRecord {
    /// Creates an unpersisted record with no attributes.
    #[must_use]
    pub fn new(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            pid: None,
            name: None,
            birth_date: None,
            identifiers: Vec::new(),
            tags: Vec::new(),
        }
    }

    /// Sets the persisted id.
    #[must_use]
    pub fn with_pid(mut self, pid: Pid) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: HumanName) -> Self {
        self.name = Some(name);
        self
    }

    /// Sets the birth date.
    #[must_use]
    pub fn with_birth_date(mut self, birth_date: NaiveDate) -> Self {
        self.birth_date = Some(birth_date);
        self
    }

    /// Adds an identifier.
    #[must_use]
    pub fn with_identifier(mut self, identifier: Identifier) -> Self {
        self.identifiers.push(identifier);
        self
    }

    /// Adds a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tags.push(tag);
        self
    }

    /// First identifier value in `system`, if any.
    #[must_use]
    pub fn identifier_in(&self, system: &str) -> Option<&str> {
        self.identifiers
            .iter()
            .find(|id| id.is_in(system))
            .map(|id| id.value.as_str())
    }

    /// Returns true when the record carries `tag`.
    #[must_use]
    pub fn has_tag(&self, tag: &Tag) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}
