//! Error types for identity linking.
//!
//! All errors are strongly typed using thiserror so callers can pattern
//! match on the exact failure. The taxonomy separates caller errors that
//! must never be retried (rule violations, unresolved references, excluded
//! records) from transient store conflicts that may be.

use thiserror::Error;

use crate::record::Pid;
use crate::storage::StorageError;

/// A requested link mutation broke a linking rule.
///
/// Rule violations are raised before any write happens, so the call that
/// produced one has no side effects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleViolation {
    /// Automated matching tried to change a human decision.
    #[error("automated matching is not allowed to modify a manually created link")]
    ManualOverrideDenied,

    /// Automated matching tried to declare two records unrelated.
    #[error("automated matching is not allowed to assert NO_MATCH")]
    AutoNoMatchDenied,

    /// A deployment-specific rule rejected the request.
    #[error("rule '{rule}' rejected the link: {reason}")]
    Custom {
        /// Name of the rejecting rule.
        rule: String,
        /// Why the rule rejected the request.
        reason: String,
    },
}

impl RuleViolation {
    /// Stable machine-readable code.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::ManualOverrideDenied => "MANUAL_OVERRIDE_DENIED",
            Self::AutoNoMatchDenied => "AUTO_NO_MATCH_DENIED",
            Self::Custom { rule, .. } => rule,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration field '{field}' cannot be empty")]
    EmptyField {
        field: &'static str,
    },

    #[error("Configuration field '{field}' is invalid: {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },

    #[error("Invalid assurance table: {reason}")]
    InvalidAssuranceTable {
        reason: String,
    },

    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Which side of a link request referenced an unpersisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordRole {
    /// The incoming source record.
    Source,
    /// The golden record.
    Golden,
}

impl std::fmt::Display for RecordRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Golden => write!(f, "golden"),
        }
    }
}

/// Top-level error type for link operations.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Rule violation: {0}")]
    Rule(#[from] RuleViolation),

    #[error("Concurrent insert of link {source_pid} -> {golden_pid} kept conflicting after {attempts} attempts")]
    ConflictOnInsert {
        source_pid: Pid,
        golden_pid: Pid,
        attempts: u32,
    },

    #[error("Concurrent modification: {message}")]
    Conflict {
        message: String,
    },

    #[error("The {role} record has no persisted id; persist it before linking")]
    UnresolvedReference {
        role: RecordRole,
    },

    #[error("Record '{resource_id}' is excluded from identity resolution")]
    ExcludedRecord {
        resource_id: String,
    },

    #[error("Golden record not found: {golden_pid}")]
    NotFound {
        golden_pid: Pid,
    },

    #[error("Storage error: {message}")]
    Storage {
        message: String,
    },

    #[error("Golden record {golden_pid} could not be restored after a failed link write ({cause}): {restore}")]
    RestoreFailed {
        golden_pid: Pid,
        cause: String,
        restore: String,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl LinkError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a rule violation.
    #[must_use]
    pub const fn is_rule_violation(&self) -> bool {
        matches!(self, Self::Rule(_))
    }

    /// Returns the rule violation, if this is one.
    #[must_use]
    pub const fn rule_violation(&self) -> Option<&RuleViolation> {
        match self {
            Self::Rule(violation) => Some(violation),
            _ => None,
        }
    }

    /// Returns true if this error is retryable.
    ///
    /// Only store-level concurrency conflicts qualify. Everything else is a
    /// caller error that will fail the same way again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ConflictOnInsert { .. } | Self::Conflict { .. })
    }
}

impl From<StorageError> for LinkError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::GoldenRecordNotFound(golden_pid) => Self::NotFound { golden_pid },
            StorageError::VersionConflict { .. } => Self::Conflict {
                message: err.to_string(),
            },
            other => Self::Storage {
                message: other.to_string(),
            },
        }
    }
}

/// Result type alias for link operations.
pub type LinkResult<T> = Result<T, LinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_violation_codes() {
        assert_eq!(RuleViolation::ManualOverrideDenied.code(), "MANUAL_OVERRIDE_DENIED");
        assert_eq!(RuleViolation::AutoNoMatchDenied.code(), "AUTO_NO_MATCH_DENIED");
        let custom = RuleViolation::Custom {
            rule: "same_tenant".to_string(),
            reason: "tenants differ".to_string(),
        };
        assert_eq!(custom.code(), "same_tenant");
        assert!(custom.to_string().contains("tenants differ"));
    }

    #[test]
    fn test_link_error_from_rule_violation() {
        let err: LinkError = RuleViolation::AutoNoMatchDenied.into();
        assert!(err.is_rule_violation());
        assert!(!err.is_retryable());
        assert_eq!(err.rule_violation(), Some(&RuleViolation::AutoNoMatchDenied));
    }

    #[test]
    fn test_link_error_retryable() {
        let err = LinkError::ConflictOnInsert {
            source_pid: Pid::new(1),
            golden_pid: Pid::new(2),
            attempts: 3,
        };
        assert!(err.is_retryable());
        assert!(err.to_string().contains("3 attempts"));

        let err = LinkError::UnresolvedReference { role: RecordRole::Golden };
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("golden record"));
    }

    #[test]
    fn test_storage_error_mapping() {
        let err: LinkError = StorageError::GoldenRecordNotFound(Pid::new(7)).into();
        assert!(matches!(err, LinkError::NotFound { golden_pid } if golden_pid == Pid::new(7)));

        let err: LinkError = StorageError::VersionConflict {
            key: "golden 7".to_string(),
            expected: 2,
            actual: 3,
        }
        .into();
        assert!(err.is_retryable());

        let err: LinkError = StorageError::BackendError("disk full".to_string()).into();
        assert!(matches!(err, LinkError::Storage { ref message } if message.contains("disk full")));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::EmptyField { field: "enterprise_eid_system" };
        assert!(err.to_string().contains("enterprise_eid_system"));
    }
}
