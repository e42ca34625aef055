//! Configuration for the linking core.
//!
//! Configuration is read once, validated, and handed to the services by
//! value. Nothing here is process-wide state.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::assurance::{AssuranceEntry, AssuranceMapper};
use crate::error::ConfigError;
use crate::record::Tag;

/// Default namespace URI for enterprise identifiers.
pub const DEFAULT_ENTERPRISE_EID_SYSTEM: &str = "urn:identity-link:enterprise-eid";

/// Default namespace of the opt-out tag.
pub const DEFAULT_EXCLUSION_TAG_SYSTEM: &str = "urn:identity-link:managed";

/// Default code of the opt-out tag.
pub const DEFAULT_EXCLUSION_TAG_CODE: &str = "no-resolution";

/// What to do when an incoming human-supplied enterprise identifier
/// collides with another human-supplied one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EidConflictPolicy {
    /// Keep the identifier already on the golden record and report the conflict.
    #[default]
    KeepExisting,
    /// Last writer wins.
    Overwrite,
}

/// Linking core configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Namespace URI that tags enterprise identifiers.
    pub enterprise_eid_system: String,
    /// Records carrying this tag are excluded from identity resolution.
    pub exclusion_tag: Tag,
    /// Resolution of human-vs-human enterprise identifier conflicts.
    pub eid_conflict_policy: EidConflictPolicy,
    /// Bound on re-read-and-update attempts after a conflicting first insert.
    pub max_conflict_retries: u32,
    /// Optional override of the assurance table.
    pub assurance: Option<Vec<AssuranceEntry>>,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            enterprise_eid_system: DEFAULT_ENTERPRISE_EID_SYSTEM.to_string(),
            exclusion_tag: Tag::new(DEFAULT_EXCLUSION_TAG_SYSTEM, DEFAULT_EXCLUSION_TAG_CODE),
            eid_conflict_policy: EidConflictPolicy::default(),
            max_conflict_retries: 3,
            assurance: None,
        }
    }
}

impl ResolutionConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Checks field invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enterprise_eid_system.trim().is_empty() {
            return Err(ConfigError::EmptyField {
                field: "enterprise_eid_system",
            });
        }
        if self.exclusion_tag.system.trim().is_empty() || self.exclusion_tag.code.trim().is_empty() {
            return Err(ConfigError::EmptyField {
                field: "exclusion_tag",
            });
        }
        if self.max_conflict_retries == 0 {
            return Err(ConfigError::InvalidField {
                field: "max_conflict_retries",
                reason: "must be at least 1".to_string(),
            });
        }
        self.assurance_mapper().map(|_| ())
    }

    /// Builds the assurance mapper: the override table if configured, the default otherwise.
    pub fn assurance_mapper(&self) -> Result<AssuranceMapper, ConfigError> {
        match &self.assurance {
            Some(entries) => AssuranceMapper::from_entries(entries),
            None => Ok(AssuranceMapper::default()),
        }
    }
}
