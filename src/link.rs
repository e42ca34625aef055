//! Link records between source records and golden records.
//!
//! A link is uniquely keyed by its `(source_pid, golden_pid)` pair. Repeated
//! resolution of the same pair updates the existing link; un-linking
//! transitions it to `NO_MATCH` instead of deleting it, so the decision
//! history stays auditable.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::assurance::AssuranceLevel;
use crate::match_result::{LinkSource, MatchResult};
use crate::record::Pid;

/// Unique identifier for a link row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(Uuid);

impl LinkId {
    /// Creates a new random link ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LinkId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The relationship between one source record and one golden record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Row identifier.
    pub id: LinkId,
    /// Pid of the source record.
    pub source_pid: Pid,
    /// Pid of the golden record.
    pub golden_pid: Pid,
    /// Current match decision.
    pub match_result: MatchResult,
    /// Who made the current decision.
    pub link_source: LinkSource,
    /// Assurance derived from `match_result` and `link_source`.
    pub assurance: Option<AssuranceLevel>,
    /// When the link was first created.
    pub created_at: DateTime<Utc>,
    /// When the link was last modified.
    pub updated_at: DateTime<Utc>,
    /// Optimistic-concurrency version. 0 until inserted.
    pub version: u64,
}

impl Link {
    /// Creates an unsaved link for a pair.
    #[must_use]
    pub fn new(
        source_pid: Pid,
        golden_pid: Pid,
        match_result: MatchResult,
        link_source: LinkSource,
        assurance: Option<AssuranceLevel>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: LinkId::new(),
            source_pid,
            golden_pid,
            match_result,
            link_source,
            assurance,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// The `(source_pid, golden_pid)` key.
    #[must_use]
    pub const fn key(&self) -> (Pid, Pid) {
        (self.source_pid, self.golden_pid)
    }

    /// Returns true once the link has been stored.
    #[must_use]
    pub const fn is_persisted(&self) -> bool {
        self.version > 0
    }

    /// Applies a new decision, refreshing `updated_at`.
    pub fn apply(
        &mut self,
        match_result: MatchResult,
        link_source: LinkSource,
        assurance: Option<AssuranceLevel>,
    ) {
        self.match_result = match_result;
        self.link_source = link_source;
        self.assurance = assurance;
        self.updated_at = Utc::now().max(self.created_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_link_is_unsaved() {
        let link = Link::new(Pid::new(1), Pid::new(2), MatchResult::Match, LinkSource::Auto, None);
        assert!(!link.is_persisted());
        assert_eq!(link.key(), (Pid::new(1), Pid::new(2)));
        assert_eq!(link.created_at, link.updated_at);
    }

    #[test]
    fn apply_keeps_identity_and_creation_time() {
        let mut link = Link::new(Pid::new(1), Pid::new(2), MatchResult::Match, LinkSource::Auto, None);
        let id = link.id;
        let created = link.created_at;

        link.apply(MatchResult::NoMatch, LinkSource::Manual, Some(AssuranceLevel::Level1));

        assert_eq!(link.id, id);
        assert_eq!(link.created_at, created);
        assert!(link.updated_at >= created);
        assert_eq!(link.match_result, MatchResult::NoMatch);
        assert_eq!(link.link_source, LinkSource::Manual);
    }
}
