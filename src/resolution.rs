//! Candidate resolution for incoming source records.
//!
//! For a newly created or updated source record, the resolver decides which
//! golden record it belongs to (or mints a new one) and hands the decision to
//! [`LinkService::update_link`] as an automatic link.
//!
//! Order of precedence:
//! 1. Records carrying the exclusion tag are skipped without side effects.
//! 2. A standing human `MATCH` or `POSSIBLE_MATCH` is left untouched.
//! 3. An enterprise identifier already labelling a golden record links there.
//! 4. The best comparator result among candidate golden records:
//!    `MATCH` beats `POSSIBLE_MATCH`; the record's current match wins ties,
//!    then the lowest pid.
//! 5. Otherwise a new golden record is minted from the record.
//!
//! Golden records the record has a manual `NO_MATCH` with are never
//! candidates, so the pair stays apart across re-resolution.
//!
//! A record keeps at most one `MATCH` link. When a record that is already
//! automatically matched would move to another golden record (or to a new
//! one), nothing is written and the move is reported as
//! [`ResolutionOutcome::ReviewRequired`].

use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::comparator::Comparator;
use crate::engine::{LinkService, LinkUpdate};
use crate::error::{LinkError, LinkResult, RecordRole};
use crate::golden::GoldenRecord;
use crate::link::Link;
use crate::match_result::{LinkSource, MatchResult};
use crate::record::{Pid, SourceRecord};

/// What resolving a record did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    /// The record opted out of identity resolution.
    Excluded,
    /// A human decision already attaches the record; nothing was changed.
    ManuallyLinked {
        /// Golden record of the manual decision.
        golden_pid: Pid,
        /// `MATCH` or `POSSIBLE_MATCH`.
        match_result: MatchResult,
    },
    /// The record was linked automatically.
    Linked {
        /// Golden record the record was linked to.
        golden_pid: Pid,
        /// Result of the link.
        match_result: MatchResult,
        /// True if the golden record was minted for this record.
        created_golden: bool,
    },
    /// The record no longer resolves to the golden record it is matched to.
    /// Its links are unchanged; moving it is left to a human.
    ReviewRequired {
        /// Golden record the record stays matched to.
        golden_pid: Pid,
        /// Where resolution would send it, or `None` for a new golden record.
        candidate: Option<Pid>,
    },
}

enum Choice {
    Existing(GoldenRecord, MatchResult),
    Mint,
}

/// The standing manual decision that attaches the record, `MATCH` first.
fn manual_attachment(links: &[Link]) -> Option<&Link> {
    let manual = |result: MatchResult| {
        links
            .iter()
            .find(move |l| l.link_source == LinkSource::Manual && l.match_result == result)
    };
    manual(MatchResult::Match).or_else(|| manual(MatchResult::PossibleMatch))
}

/// Resolves source records against candidate golden records.
#[derive(Clone)]
pub struct CandidateResolver {
    service: Arc<LinkService>,
    comparator: Arc<dyn Comparator>,
}

fn rank(result: MatchResult) -> u8 {
    match result {
        MatchResult::Match => 2,
        MatchResult::PossibleMatch => 1,
        MatchResult::NoMatch | MatchResult::PossibleDuplicate => 0,
    }
}

impl CandidateResolver {
    /// Create a resolver.
    #[must_use]
    pub fn new(service: Arc<LinkService>, comparator: Arc<dyn Comparator>) -> Self {
        Self { service, comparator }
    }

    /// The link service decisions are handed to.
    pub fn service(&self) -> &Arc<LinkService> {
        &self.service
    }

    /// Resolve `record` to a golden record.
    ///
    /// # Errors
    /// `UnresolvedReference` if the record has no pid, plus anything
    /// [`LinkService::update_link`] reports.
    pub fn resolve(&self, record: &SourceRecord) -> LinkResult<ResolutionOutcome> {
        if self.service.is_excluded(record) {
            debug!(source = %record.resource_id, "record excluded from identity resolution");
            return Ok(ResolutionOutcome::Excluded);
        }
        let source_pid = record.pid.ok_or(LinkError::UnresolvedReference {
            role: RecordRole::Source,
        })?;

        let existing = self.service.links_for_source(source_pid)?;
        if let Some(manual) = manual_attachment(&existing) {
            return Ok(ResolutionOutcome::ManuallyLinked {
                golden_pid: manual.golden_pid,
                match_result: manual.match_result,
            });
        }

        let blocked: HashSet<Pid> = existing
            .iter()
            .filter(|l| l.link_source == LinkSource::Manual)
            .map(|l| l.golden_pid)
            .collect();
        let current_match = existing
            .iter()
            .find(|l| l.match_result == MatchResult::Match)
            .map(|l| l.golden_pid);

        let choice = self.choose(record, &blocked, current_match)?;

        if let Some(current) = current_match {
            let candidate = match &choice {
                Choice::Existing(golden, _) => golden.pid,
                Choice::Mint => None,
            };
            if candidate != Some(current) {
                warn!(
                    %source_pid,
                    golden_pid = %current,
                    ?candidate,
                    "record no longer resolves to its matched golden record, keeping it for review"
                );
                return Ok(ResolutionOutcome::ReviewRequired {
                    golden_pid: current,
                    candidate,
                });
            }
        }

        match choice {
            Choice::Existing(golden, result) => self.link(record, &golden, result, false),
            Choice::Mint => {
                let golden = self.service.accessor().create_from_source(record)?;
                self.link(record, &golden, MatchResult::Match, true)
            }
        }
    }

    fn choose(
        &self,
        record: &SourceRecord,
        blocked: &HashSet<Pid>,
        current_match: Option<Pid>,
    ) -> LinkResult<Choice> {
        let is_candidate =
            |golden: &GoldenRecord| golden.pid.is_some_and(|pid| !blocked.contains(&pid));

        let accessor = self.service.accessor();
        if let Some(eid) = record.identifier_in(accessor.eid_system()) {
            let labelled = accessor.find_by_enterprise_id(eid)?;
            if let Some(golden) = labelled.into_iter().find(|g| is_candidate(g)) {
                debug!(
                    source = %record.resource_id,
                    golden_pid = ?golden.pid,
                    "candidate on enterprise identifier"
                );
                return Ok(Choice::Existing(golden, MatchResult::Match));
            }
        }

        let key = |result: MatchResult, golden: &GoldenRecord| {
            (rank(result), golden.pid == current_match, Reverse(golden.pid))
        };
        let mut best: Option<(MatchResult, GoldenRecord)> = None;
        for candidate in accessor.store().all()? {
            if !is_candidate(&candidate) {
                continue;
            }
            let result = self.comparator.evaluate(record, &candidate);
            if !result.is_attaching() {
                continue;
            }
            let better = best
                .as_ref()
                .map_or(true, |(r, g)| key(result, &candidate) > key(*r, g));
            if better {
                best = Some((result, candidate));
            }
        }

        Ok(match best {
            Some((result, golden)) => Choice::Existing(golden, result),
            None => Choice::Mint,
        })
    }

    fn link(
        &self,
        record: &SourceRecord,
        golden: &GoldenRecord,
        match_result: MatchResult,
        created_golden: bool,
    ) -> LinkResult<ResolutionOutcome> {
        let LinkUpdate { link, .. } =
            self.service
                .update_link(record, golden, match_result, LinkSource::Auto)?;
        debug!(
            comparator = self.comparator.name(),
            source_pid = %link.source_pid,
            golden_pid = %link.golden_pid,
            %match_result,
            created_golden,
            "resolved record"
        );
        Ok(ResolutionOutcome::Linked {
            golden_pid: link.golden_pid,
            match_result,
            created_golden,
        })
    }
}

impl std::fmt::Debug for CandidateResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandidateResolver")
            .field("service", &self.service)
            .field("comparator", &self.comparator.name())
            .finish()
    }
}
