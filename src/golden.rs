//! Golden records: the canonical representation of an entity.
//!
//! A golden record carries display attributes copied from the record that
//! defined it, an ordered identifier list holding at most one enterprise
//! identifier, and weak references to the source records linked to it. The
//! references are for display only; the authoritative relationship is the
//! [`Link`](crate::link::Link) row.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::assurance::AssuranceLevel;
use crate::record::{HumanName, Identifier, Pid};

/// Weak reference from a golden record to a linked source record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedRecordRef {
    /// Pid of the linked source record.
    pub target: Pid,
    /// Assurance of the link, if ranked.
    pub assurance: Option<AssuranceLevel>,
}

/// Canonical, deduplicated representation of a real-world entity.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GoldenRecord {
    /// Persisted id, assigned by the golden record store.
    pub pid: Option<Pid>,
    /// Display name.
    pub name: Option<HumanName>,
    /// Date of birth.
    pub birth_date: Option<NaiveDate>,
    /// Identifiers. The enterprise identifier, when present, is kept first.
    pub identifiers: Vec<Identifier>,
    /// Linked source records.
    pub links: Vec<LinkedRecordRef>,
    /// Optimistic-concurrency version. 0 until first persisted.
    pub version: u64,
}

impl GoldenRecord {
    /// Creates an empty, unpersisted golden record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The enterprise identifier in `system`, if assigned.
    #[must_use]
    pub fn enterprise_identifier(&self, system: &str) -> Option<&Identifier> {
        self.identifiers.iter().find(|id| id.is_in(system))
    }

    /// Replaces the enterprise identifier for `identifier.system`.
    ///
    /// Any previous identifier in the same system is dropped so the record
    /// never carries two.
    pub fn set_enterprise_identifier(&mut self, identifier: Identifier) {
        self.identifiers.retain(|id| !id.is_in(&identifier.system));
        self.identifiers.insert(0, identifier);
    }

    /// Adds a reference to `target` or refreshes its assurance.
    ///
    /// Returns true if the reference was new.
    pub fn add_or_update_link(&mut self, target: Pid, assurance: Option<AssuranceLevel>) -> bool {
        if let Some(existing) = self.links.iter_mut().find(|l| l.target == target) {
            existing.assurance = assurance;
            return false;
        }
        self.links.push(LinkedRecordRef { target, assurance });
        true
    }

    /// Removes the reference to `target`. Returns true if one was removed.
    pub fn remove_link(&mut self, target: Pid) -> bool {
        let before = self.links.len();
        self.links.retain(|l| l.target != target);
        self.links.len() != before
    }

    /// Returns true if `target` is referenced.
    #[must_use]
    pub fn is_linked_to(&self, target: Pid) -> bool {
        self.links.iter().any(|l| l.target == target)
    }
}
