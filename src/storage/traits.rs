//! Abstract storage traits for identity linking.
//!
//! These traits define the contract that storage backends must implement.
//! All lookups are pid-based; resolving a resource reference to its pid is
//! the caller's job.

use thiserror::Error;

use crate::golden::GoldenRecord;
use crate::link::Link;
use crate::match_result::MatchResult;
use crate::record::Pid;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Link not found for the pair.
    #[error("Link not found: {source_pid} -> {golden_pid}")]
    LinkNotFound {
        /// Source record pid.
        source_pid: Pid,
        /// Golden record pid.
        golden_pid: Pid,
    },

    /// Golden record not found.
    #[error("Golden record not found: {0}")]
    GoldenRecordNotFound(Pid),

    /// Key already exists.
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// The stored row changed since it was read.
    #[error("Version conflict on {key}: expected {expected}, stored {actual}")]
    VersionConflict {
        /// Human-readable row key.
        key: String,
        /// Version the writer read.
        expected: u64,
        /// Version currently stored.
        actual: u64,
    },

    /// Backend error.
    #[error("Storage backend error: {0}")]
    BackendError(String),
}

/// Storage trait for [`Link`] rows.
///
/// # Contract
/// - At most one link per `(source_pid, golden_pid)`; `insert` on an
///   existing pair fails with `DuplicateKey`.
/// - `update` requires the caller's `version` to equal the stored one and
///   bumps it; a stale version fails with `VersionConflict`.
/// - Implementations must be safe for concurrent use.
pub trait LinkStore: Send + Sync {
    /// Get the link for a pair.
    fn find_link(&self, source_pid: Pid, golden_pid: Pid) -> Result<Option<Link>, StorageError>;

    /// Get the `MATCH` link for a source record, if any.
    fn find_matched_link(&self, source_pid: Pid) -> Result<Option<Link>, StorageError>;

    /// All links from a source record, ordered by golden pid.
    fn find_by_source(&self, source_pid: Pid) -> Result<Vec<Link>, StorageError>;

    /// All links to a golden record, ordered by source pid.
    fn find_by_golden(&self, golden_pid: Pid) -> Result<Vec<Link>, StorageError>;

    /// All links in a given state.
    fn find_by_match_result(&self, match_result: MatchResult) -> Result<Vec<Link>, StorageError>;

    /// Insert a new link, returning the stored row (version 1).
    fn insert(&self, link: Link) -> Result<Link, StorageError>;

    /// Update an existing link, returning the stored row.
    fn update(&self, link: Link) -> Result<Link, StorageError>;

    /// Insert-or-update keyed by the pair.
    ///
    /// Dispatches on whether `link` has been persisted before, so a fresh
    /// link racing another insert still surfaces `DuplicateKey`.
    fn save(&self, link: Link) -> Result<Link, StorageError> {
        if link.is_persisted() {
            self.update(link)
        } else {
            self.insert(link)
        }
    }

    /// Total number of links.
    fn count(&self) -> Result<usize, StorageError>;
}

/// Storage trait for [`GoldenRecord`]s.
///
/// Golden records are never deleted through this contract.
pub trait GoldenRecordStore: Send + Sync {
    /// Persist a new golden record, assigning its pid and version 1.
    fn create(&self, golden: GoldenRecord) -> Result<GoldenRecord, StorageError>;

    /// Get a golden record by pid.
    fn get(&self, pid: Pid) -> Result<Option<GoldenRecord>, StorageError>;

    /// Update a golden record. Same versioning contract as [`LinkStore::update`].
    fn update(&self, golden: GoldenRecord) -> Result<GoldenRecord, StorageError>;

    /// Golden records whose identifier list contains `(system, value)`.
    fn find_by_enterprise_id(&self, system: &str, value: &str)
        -> Result<Vec<GoldenRecord>, StorageError>;

    /// All golden records, ordered by pid.
    fn all(&self) -> Result<Vec<GoldenRecord>, StorageError>;

    /// Total number of golden records.
    fn count(&self) -> Result<usize, StorageError>;
}
