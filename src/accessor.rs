//! Golden record creation and synchronization.
//!
//! The accessor owns every mutation of a golden record's content: copying
//! display attributes down from a source record, maintaining the weak link
//! references, and assigning or overwriting the enterprise identifier.
//!
//! Display attributes are first-writer-wins: a later attachment only fills
//! fields that are still empty. The enterprise identifier is the one field
//! with overwrite-on-conflict semantics: an explicit identifier on an
//! incoming record replaces a system-assigned one. Collisions between two
//! human-supplied identifiers follow [`EidConflictPolicy`].

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::assurance::AssuranceLevel;
use crate::config::{EidConflictPolicy, ResolutionConfig};
use crate::error::{LinkError, LinkResult, RecordRole};
use crate::golden::GoldenRecord;
use crate::match_result::MatchResult;
use crate::record::{Identifier, IdentifierOrigin, Pid, SourceRecord};
use crate::storage::GoldenRecordStore;

/// What happened to a golden record's enterprise identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EidSync {
    /// Nothing changed.
    Unchanged,
    /// The golden record had none; one was assigned.
    Assigned {
        /// The assigned identifier.
        identifier: Identifier,
    },
    /// An incoming explicit identifier replaced the previous one.
    Overwritten {
        /// Previous value.
        previous: String,
        /// New value.
        current: String,
    },
    /// The incoming identifier was rejected.
    Conflict {
        /// Value the golden record keeps.
        kept: Option<String>,
        /// Incoming value that was not applied.
        rejected: String,
        /// Another golden record already labelled with the incoming value.
        held_by: Option<Pid>,
    },
}

/// Creates, reads and synchronizes golden records.
#[derive(Clone)]
pub struct GoldenRecordAccessor {
    store: Arc<dyn GoldenRecordStore>,
    eid_system: String,
    conflict_policy: EidConflictPolicy,
}

impl GoldenRecordAccessor {
    /// Create an accessor over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn GoldenRecordStore>, config: &ResolutionConfig) -> Self {
        Self {
            store,
            eid_system: config.enterprise_eid_system.clone(),
            conflict_policy: config.eid_conflict_policy,
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn GoldenRecordStore> {
        &self.store
    }

    /// The enterprise identifier system URI.
    #[must_use]
    pub fn eid_system(&self) -> &str {
        &self.eid_system
    }

    /// Reads a golden record, failing if it does not exist.
    pub fn get(&self, pid: Pid) -> LinkResult<GoldenRecord> {
        self.store
            .get(pid)?
            .ok_or(LinkError::NotFound { golden_pid: pid })
    }

    /// Finds golden records labelled with an enterprise identifier value.
    pub fn find_by_enterprise_id(&self, value: &str) -> LinkResult<Vec<GoldenRecord>> {
        Ok(self.store.find_by_enterprise_id(&self.eid_system, value)?)
    }

    /// Mints and persists a golden record defined by `source`.
    ///
    /// Name and birth date are copied verbatim. The enterprise identifier is
    /// the source's explicit one when present, otherwise a generated one.
    /// The new record has no link references; attaching is the orchestrator's job.
    pub fn create_from_source(&self, source: &SourceRecord) -> LinkResult<GoldenRecord> {
        let mut golden = GoldenRecord::new();
        Self::copy_display_attributes(&mut golden, source);
        self.sync_enterprise_id(&mut golden, source)?;

        let created = self.store.create(golden)?;
        info!(
            golden_pid = ?created.pid,
            source = %source.resource_id,
            "created golden record"
        );
        Ok(created)
    }

    /// Attaches `source` to `golden` and synchronizes copied-down fields.
    ///
    /// Only a confirmed `MATCH` may touch the enterprise identifier; any
    /// other attaching result adds the reference and reports
    /// [`EidSync::Unchanged`].
    ///
    /// Mutates `golden` in place; call [`persist`](Self::persist) to save it.
    pub fn attach(
        &self,
        golden: &mut GoldenRecord,
        source: &SourceRecord,
        match_result: MatchResult,
        assurance: Option<AssuranceLevel>,
    ) -> LinkResult<EidSync> {
        let source_pid = source.pid.ok_or(LinkError::UnresolvedReference {
            role: RecordRole::Source,
        })?;

        golden.add_or_update_link(source_pid, assurance);
        Self::copy_display_attributes(golden, source);
        if match_result == MatchResult::Match {
            self.sync_enterprise_id(golden, source)
        } else {
            Ok(EidSync::Unchanged)
        }
    }

    /// Removes the reference to `source_pid` if present.
    pub fn detach(&self, golden: &mut GoldenRecord, source_pid: Pid) -> bool {
        golden.remove_link(source_pid)
    }

    /// Saves a golden record previously read from the store.
    pub fn persist(&self, golden: GoldenRecord) -> LinkResult<GoldenRecord> {
        Ok(self.store.update(golden)?)
    }

    /// Fills empty display fields of `golden` from `source`.
    ///
    /// Returns true if anything was copied.
    pub fn copy_display_attributes(golden: &mut GoldenRecord, source: &SourceRecord) -> bool {
        let mut copied = false;
        let golden_name_empty = golden.name.as_ref().map_or(true, |n| n.is_empty());
        if golden_name_empty {
            if let Some(name) = source.name.as_ref().filter(|n| !n.is_empty()) {
                golden.name = Some(name.clone());
                copied = true;
            }
        }
        if golden.birth_date.is_none() && source.birth_date.is_some() {
            golden.birth_date = source.birth_date;
            copied = true;
        }
        copied
    }

    /// Applies the enterprise identifier rules to `golden` for an incoming `source`.
    pub fn sync_enterprise_id(
        &self,
        golden: &mut GoldenRecord,
        source: &SourceRecord,
    ) -> LinkResult<EidSync> {
        let current = golden.enterprise_identifier(&self.eid_system).cloned();
        let Some(incoming) = source.identifier_in(&self.eid_system) else {
            if current.is_some() {
                return Ok(EidSync::Unchanged);
            }
            let identifier = self.generate_eid();
            golden.set_enterprise_identifier(identifier.clone());
            return Ok(EidSync::Assigned { identifier });
        };

        if current.as_ref().is_some_and(|c| c.value == incoming) {
            return Ok(EidSync::Unchanged);
        }

        if self.conflict_policy == EidConflictPolicy::KeepExisting {
            let held_by = self.external_holder(golden.pid, incoming)?;
            let human_vs_human = current
                .as_ref()
                .is_some_and(|c| c.origin == IdentifierOrigin::External);

            if held_by.is_some() || human_vs_human {
                warn!(
                    golden_pid = ?golden.pid,
                    source = %source.resource_id,
                    incoming,
                    ?held_by,
                    "enterprise identifier conflict, keeping existing value"
                );
                let kept = match current {
                    Some(c) => c.value,
                    None => {
                        // Never leave a golden record without an enterprise identifier.
                        let generated = self.generate_eid();
                        let value = generated.value.clone();
                        golden.set_enterprise_identifier(generated);
                        value
                    }
                };
                return Ok(EidSync::Conflict {
                    kept: Some(kept),
                    rejected: incoming.to_string(),
                    held_by,
                });
            }
        }

        golden.set_enterprise_identifier(Identifier::external(&self.eid_system, incoming));
        Ok(match current {
            None => EidSync::Assigned {
                identifier: Identifier::external(&self.eid_system, incoming),
            },
            Some(previous) => {
                info!(
                    golden_pid = ?golden.pid,
                    previous = %previous.value,
                    current = incoming,
                    "overwrote enterprise identifier"
                );
                EidSync::Overwritten {
                    previous: previous.value,
                    current: incoming.to_string(),
                }
            }
        })
    }

    /// Another golden record carrying `value` as a human-supplied enterprise identifier.
    fn external_holder(&self, own: Option<Pid>, value: &str) -> LinkResult<Option<Pid>> {
        let holders = self.store.find_by_enterprise_id(&self.eid_system, value)?;
        Ok(holders
            .into_iter()
            .filter(|g| g.pid != own)
            .find(|g| {
                g.enterprise_identifier(&self.eid_system)
                    .is_some_and(|id| id.value == value && id.origin == IdentifierOrigin::External)
            })
            .and_then(|g| g.pid))
    }

    fn generate_eid(&self) -> Identifier {
        Identifier::system_assigned(&self.eid_system, Uuid::new_v4().to_string())
    }
}

impl std::fmt::Debug for GoldenRecordAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoldenRecordAccessor")
            .field("eid_system", &self.eid_system)
            .field("conflict_policy", &self.conflict_policy)
            .finish_non_exhaustive()
    }
}
