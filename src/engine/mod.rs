//! Link update orchestration.
//!
//! [`LinkService`] is the entry point for every link mutation. One call to
//! [`LinkService::update_link`] reads the existing link, validates the
//! request, synchronizes the golden record, and persists the link, all while
//! holding the golden record's serialization point.
//!
//! Validation happens before any write, so a rule violation leaves no side
//! effects. If the link write fails after the golden record was saved, the
//! golden record is restored before the error (or the retry) proceeds.

mod locks;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::accessor::{EidSync, GoldenRecordAccessor};
use crate::assurance::AssuranceMapper;
use crate::config::ResolutionConfig;
use crate::error::{LinkError, LinkResult, RecordRole};
use crate::golden::GoldenRecord;
use crate::link::Link;
use crate::match_result::{LinkSource, MatchResult};
use crate::record::{Pid, SourceRecord, Tag};
use crate::rules::LinkRuleEngine;
use crate::storage::{GoldenRecordStore, LinkStore, StorageError};

use self::locks::KeyedLocks;

/// Result of a successful [`LinkService::update_link`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkUpdate {
    /// The stored link.
    pub link: Link,
    /// The golden record as stored after the update.
    pub golden: GoldenRecord,
    /// What happened to the golden record's enterprise identifier.
    pub eid_sync: EidSync,
    /// True if this call created the link.
    pub created: bool,
}

/// Orchestrates link mutations against pluggable stores.
pub struct LinkService {
    links: Arc<dyn LinkStore>,
    golden: GoldenRecordAccessor,
    rules: LinkRuleEngine,
    assurance: AssuranceMapper,
    exclusion_tag: Tag,
    max_conflict_retries: u32,
    locks: KeyedLocks,
}

impl LinkService {
    /// Create a service with the standard rule set.
    ///
    /// # Errors
    /// Returns a configuration error if `config` is invalid.
    pub fn new(
        links: Arc<dyn LinkStore>,
        golden_records: Arc<dyn GoldenRecordStore>,
        config: &ResolutionConfig,
    ) -> LinkResult<Self> {
        config.validate()?;
        Ok(Self {
            links,
            golden: GoldenRecordAccessor::new(golden_records, config),
            rules: LinkRuleEngine::standard(),
            assurance: config.assurance_mapper()?,
            exclusion_tag: config.exclusion_tag.clone(),
            max_conflict_retries: config.max_conflict_retries,
            locks: KeyedLocks::new(),
        })
    }

    /// Replace the rule engine.
    #[must_use]
    pub fn with_rules(mut self, rules: LinkRuleEngine) -> Self {
        self.rules = rules;
        self
    }

    /// Get a reference to the link store.
    pub fn link_store(&self) -> &Arc<dyn LinkStore> {
        &self.links
    }

    /// Get the golden record accessor.
    pub fn accessor(&self) -> &GoldenRecordAccessor {
        &self.golden
    }

    /// Get the assurance mapper.
    pub fn assurance(&self) -> &AssuranceMapper {
        &self.assurance
    }

    /// Get the rule engine.
    pub fn rules(&self) -> &LinkRuleEngine {
        &self.rules
    }

    /// Returns true when `record` opted out of identity resolution.
    #[must_use]
    pub fn is_excluded(&self, record: &SourceRecord) -> bool {
        record.has_tag(&self.exclusion_tag)
    }

    /// Create or update the link between `source` and `golden`.
    ///
    /// Only `golden.pid` is used from `golden`; the stored copy is re-read
    /// under the golden record's lock so concurrent attachments compose.
    ///
    /// # Preconditions
    /// `source` must not carry the exclusion tag; filtering excluded records
    /// is the caller's job and an excluded record here is a caller error.
    ///
    /// # Errors
    /// - `ExcludedRecord`, `UnresolvedReference`: precondition violations.
    /// - `Rule`: the request is illegal. Nothing was written.
    /// - `ConflictOnInsert`: concurrent first inserts kept colliding.
    /// - `Conflict`: a row changed underneath this call; retry at the caller's discretion.
    /// - `RestoreFailed`: the link write failed and the golden record could
    ///   not be put back. Carries both failures.
    pub fn update_link(
        &self,
        source: &SourceRecord,
        golden: &GoldenRecord,
        match_result: MatchResult,
        link_source: LinkSource,
    ) -> LinkResult<LinkUpdate> {
        if self.is_excluded(source) {
            return Err(LinkError::ExcludedRecord {
                resource_id: source.resource_id.clone(),
            });
        }
        let source_pid = source.pid.ok_or(LinkError::UnresolvedReference {
            role: RecordRole::Source,
        })?;
        let golden_pid = golden.pid.ok_or(LinkError::UnresolvedReference {
            role: RecordRole::Golden,
        })?;

        self.locks.with_lock(golden_pid, || {
            self.update_link_locked(source, source_pid, golden_pid, match_result, link_source)
        })
    }

    fn update_link_locked(
        &self,
        source: &SourceRecord,
        source_pid: Pid,
        golden_pid: Pid,
        match_result: MatchResult,
        link_source: LinkSource,
    ) -> LinkResult<LinkUpdate> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;

            let existing = self.links.find_link(source_pid, golden_pid)?;
            if let Err(violation) = self.rules.validate(existing.as_ref(), match_result, link_source) {
                warn!(
                    %source_pid,
                    %golden_pid,
                    %match_result,
                    %link_source,
                    code = violation.code(),
                    "link update rejected"
                );
                return Err(violation.into());
            }

            let before = self.golden.get(golden_pid)?;
            let mut golden = before.clone();
            let assurance = self.assurance.level(match_result, link_source);
            let eid_sync = match match_result {
                MatchResult::Match | MatchResult::PossibleMatch => {
                    self.golden.attach(&mut golden, source, match_result, assurance)?
                }
                MatchResult::NoMatch => {
                    self.golden.detach(&mut golden, source_pid);
                    EidSync::Unchanged
                }
                MatchResult::PossibleDuplicate => EidSync::Unchanged,
            };

            // Saving an unchanged record would only bump its version.
            let golden_written = golden != before;
            let golden = if golden_written {
                self.golden.persist(golden)?
            } else {
                before.clone()
            };

            let created = existing.is_none();
            let link = match existing {
                Some(mut link) => {
                    link.apply(match_result, link_source, assurance);
                    link
                }
                None => Link::new(source_pid, golden_pid, match_result, link_source, assurance),
            };

            match self.links.save(link) {
                Ok(link) => {
                    if created {
                        info!(%source_pid, %golden_pid, %match_result, %link_source, "created link");
                    } else {
                        debug!(
                            %source_pid,
                            %golden_pid,
                            %match_result,
                            %link_source,
                            version = link.version,
                            "updated link"
                        );
                    }
                    return Ok(LinkUpdate {
                        link,
                        golden,
                        eid_sync,
                        created,
                    });
                }
                Err(err) => {
                    if golden_written {
                        if let Err(restore_err) = self.restore(before, &golden) {
                            warn!(
                                %golden_pid,
                                cause = %err,
                                error = %restore_err,
                                "failed to restore golden record after link write failure"
                            );
                            return Err(LinkError::RestoreFailed {
                                golden_pid,
                                cause: err.to_string(),
                                restore: restore_err.to_string(),
                            });
                        }
                    }
                    match err {
                        StorageError::DuplicateKey(_) if attempts < self.max_conflict_retries => {
                            warn!(
                                %source_pid,
                                %golden_pid,
                                attempts,
                                "concurrent link insert, retrying as update"
                            );
                        }
                        StorageError::DuplicateKey(_) => {
                            return Err(LinkError::ConflictOnInsert {
                                source_pid,
                                golden_pid,
                                attempts,
                            });
                        }
                        other => return Err(other.into()),
                    }
                }
            }
        }
    }

    /// Writes `before`'s content back over the version saved as `saved`.
    fn restore(&self, before: GoldenRecord, saved: &GoldenRecord) -> LinkResult<()> {
        let restored = GoldenRecord {
            version: saved.version,
            ..before
        };
        self.golden.persist(restored).map(|_| ())
    }

    /// The link between two persisted records, or `None` if either is unpersisted.
    pub fn link_between(
        &self,
        source: &SourceRecord,
        golden: &GoldenRecord,
    ) -> LinkResult<Option<Link>> {
        match (source.pid, golden.pid) {
            (Some(source_pid), Some(golden_pid)) => self.get_link(source_pid, golden_pid),
            _ => Ok(None),
        }
    }

    /// The link for a pair, if any.
    pub fn get_link(&self, source_pid: Pid, golden_pid: Pid) -> LinkResult<Option<Link>> {
        Ok(self.links.find_link(source_pid, golden_pid)?)
    }

    /// The `MATCH` link for a source record, if any.
    pub fn get_matched_link(&self, source_pid: Pid) -> LinkResult<Option<Link>> {
        Ok(self.links.find_matched_link(source_pid)?)
    }

    /// All links from a source record.
    pub fn links_for_source(&self, source_pid: Pid) -> LinkResult<Vec<Link>> {
        Ok(self.links.find_by_source(source_pid)?)
    }

    /// All links to a golden record.
    pub fn links_for_golden(&self, golden_pid: Pid) -> LinkResult<Vec<Link>> {
        Ok(self.links.find_by_golden(golden_pid)?)
    }

    /// Total number of links.
    pub fn count_links(&self) -> LinkResult<usize> {
        Ok(self.links.count()?)
    }
}

impl std::fmt::Debug for LinkService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkService")
            .field("golden", &self.golden)
            .field("rules", &self.rules)
            .field("exclusion_tag", &self.exclusion_tag)
            .field("max_conflict_retries", &self.max_conflict_retries)
            .finish_non_exhaustive()
    }
}
