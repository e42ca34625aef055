//! Record comparison contract.
//!
//! Scoring is an external concern; the linking core only consumes the
//! resulting [`MatchResult`]. [`NameBirthDateComparator`] is a small
//! deterministic implementation for embedded use and tests.

use crate::golden::GoldenRecord;
use crate::match_result::MatchResult;
use crate::record::{HumanName, SourceRecord};

/// Scores a source record against a candidate golden record.
///
/// Implementations must be deterministic and free of side effects.
pub trait Comparator: Send + Sync {
    /// Name of the comparator (for audit/debugging).
    fn name(&self) -> &str;

    /// Compare `record` with `candidate`.
    fn evaluate(&self, record: &SourceRecord, candidate: &GoldenRecord) -> MatchResult;
}

/// Exact comparison on normalized name and birth date.
///
/// - Same name and same birth date: `MATCH`.
/// - Same name, birth date missing on either side or different: `POSSIBLE_MATCH`.
/// - Anything else, including a missing name: `NO_MATCH`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NameBirthDateComparator;

fn normalize(part: &str) -> String {
    part.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn name_key(name: &HumanName) -> Option<(String, String)> {
    if name.is_empty() {
        return None;
    }
    let family = normalize(name.family.as_deref().unwrap_or_default());
    let given = normalize(&name.given_as_single_string());
    Some((family, given))
}

impl Comparator for NameBirthDateComparator {
    fn name(&self) -> &str {
        "name_birth_date"
    }

    fn evaluate(&self, record: &SourceRecord, candidate: &GoldenRecord) -> MatchResult {
        let record_key = record.name.as_ref().and_then(name_key);
        let candidate_key = candidate.name.as_ref().and_then(name_key);
        let (Some(record_key), Some(candidate_key)) = (record_key, candidate_key) else {
            return MatchResult::NoMatch;
        };
        if record_key != candidate_key {
            return MatchResult::NoMatch;
        }

        match (record.birth_date, candidate.birth_date) {
            (Some(a), Some(b)) if a == b => MatchResult::Match,
            _ => MatchResult::PossibleMatch,
        }
    }
}
