//! Assurance levels derived from match results.
//!
//! The mapping is an immutable table injected into the services, so each
//! deployment (or test) can supply its own without touching shared state.
//! `POSSIBLE_DUPLICATE` is deliberately absent from every table: a lookup for
//! it yields `None`, which callers treat as "no assurance claim".

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::match_result::{LinkSource, MatchResult};

/// Confidence ranking attached to a link. Higher is stronger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssuranceLevel {
    /// Little or no confidence the records describe one entity.
    Level1,
    /// Some confidence.
    Level2,
    /// High confidence.
    Level3,
    /// Human-confirmed.
    Level4,
}

impl AssuranceLevel {
    /// Stable wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Level1 => "level1",
            Self::Level2 => "level2",
            Self::Level3 => "level3",
            Self::Level4 => "level4",
        }
    }
}

impl fmt::Display for AssuranceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of an assurance table, as it appears in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssuranceEntry {
    /// Match result the row applies to.
    pub match_result: MatchResult,
    /// Provenance the row applies to.
    pub link_source: LinkSource,
    /// Resulting level.
    pub level: AssuranceLevel,
}

/// Maps `(MatchResult, LinkSource)` to an [`AssuranceLevel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssuranceMapper {
    table: HashMap<(MatchResult, LinkSource), AssuranceLevel>,
}

impl Default for AssuranceMapper {
    fn default() -> Self {
        use AssuranceLevel::{Level1, Level2, Level3, Level4};
        use LinkSource::{Auto, Manual};
        use MatchResult::{Match, NoMatch, PossibleMatch};

        let table = HashMap::from([
            ((NoMatch, Auto), Level1),
            ((PossibleMatch, Auto), Level2),
            ((Match, Auto), Level3),
            ((NoMatch, Manual), Level1),
            ((PossibleMatch, Manual), Level3),
            ((Match, Manual), Level4),
        ]);
        Self { table }
    }
}

impl AssuranceMapper {
    /// Builds a validated mapper from explicit rows.
    ///
    /// # Validation
    /// - `POSSIBLE_DUPLICATE` rows are rejected.
    /// - A `(result, source)` pair may appear once.
    /// - Per source, `NO_MATCH < POSSIBLE_MATCH < MATCH` where both rows exist.
    /// - Per result, `MANUAL >= AUTO` where both rows exist.
    pub fn from_entries(entries: &[AssuranceEntry]) -> Result<Self, ConfigError> {
        let mut table = HashMap::with_capacity(entries.len());
        for entry in entries {
            if entry.match_result == MatchResult::PossibleDuplicate {
                return Err(ConfigError::InvalidAssuranceTable {
                    reason: "POSSIBLE_DUPLICATE is unranked and cannot be mapped".to_string(),
                });
            }
            let key = (entry.match_result, entry.link_source);
            if table.insert(key, entry.level).is_some() {
                return Err(ConfigError::InvalidAssuranceTable {
                    reason: format!(
                        "duplicate row for {} / {}",
                        entry.match_result, entry.link_source
                    ),
                });
            }
        }

        let mapper = Self { table };
        mapper.check_ordering()?;
        Ok(mapper)
    }

    fn check_ordering(&self) -> Result<(), ConfigError> {
        const RANKED: [MatchResult; 3] = [
            MatchResult::NoMatch,
            MatchResult::PossibleMatch,
            MatchResult::Match,
        ];

        for source in [LinkSource::Auto, LinkSource::Manual] {
            let levels: Vec<(MatchResult, AssuranceLevel)> = RANKED
                .iter()
                .filter_map(|r| self.table.get(&(*r, source)).map(|l| (*r, *l)))
                .collect();
            for pair in levels.windows(2) {
                if pair[0].1 >= pair[1].1 {
                    return Err(ConfigError::InvalidAssuranceTable {
                        reason: format!(
                            "{source}: {} ({}) must rank below {} ({})",
                            pair[0].0, pair[0].1, pair[1].0, pair[1].1
                        ),
                    });
                }
            }
        }

        for result in RANKED {
            if let (Some(auto), Some(manual)) = (
                self.table.get(&(result, LinkSource::Auto)),
                self.table.get(&(result, LinkSource::Manual)),
            ) {
                if manual < auto {
                    return Err(ConfigError::InvalidAssuranceTable {
                        reason: format!("{result}: MANUAL ({manual}) ranks below AUTO ({auto})"),
                    });
                }
            }
        }
        Ok(())
    }

    /// Assurance for a decision, or `None` when the table makes no claim.
    #[must_use]
    pub fn level(&self, match_result: MatchResult, link_source: LinkSource) -> Option<AssuranceLevel> {
        self.table.get(&(match_result, link_source)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_matches_base_mapping() {
        let mapper = AssuranceMapper::default();
        assert_eq!(mapper.level(MatchResult::NoMatch, LinkSource::Auto), Some(AssuranceLevel::Level1));
        assert_eq!(
            mapper.level(MatchResult::PossibleMatch, LinkSource::Auto),
            Some(AssuranceLevel::Level2)
        );
        assert_eq!(mapper.level(MatchResult::Match, LinkSource::Auto), Some(AssuranceLevel::Level3));
    }

    #[test]
    fn possible_duplicate_is_unranked() {
        let mapper = AssuranceMapper::default();
        assert_eq!(mapper.level(MatchResult::PossibleDuplicate, LinkSource::Auto), None);
        assert_eq!(mapper.level(MatchResult::PossibleDuplicate, LinkSource::Manual), None);
    }

    #[test]
    fn manual_never_ranks_below_auto() {
        let mapper = AssuranceMapper::default();
        for result in [MatchResult::NoMatch, MatchResult::PossibleMatch, MatchResult::Match] {
            assert!(
                mapper.level(result, LinkSource::Manual) >= mapper.level(result, LinkSource::Auto),
                "{result}"
            );
        }
        assert!(mapper.check_ordering().is_ok());
    }

    #[test]
    fn custom_table_rejects_possible_duplicate_rows() {
        let err = AssuranceMapper::from_entries(&[AssuranceEntry {
            match_result: MatchResult::PossibleDuplicate,
            link_source: LinkSource::Auto,
            level: AssuranceLevel::Level1,
        }])
        .unwrap_err();
        assert!(err.to_string().contains("POSSIBLE_DUPLICATE"));
    }

    #[test]
    fn custom_table_rejects_inverted_rankings() {
        let inverted = [
            AssuranceEntry {
                match_result: MatchResult::PossibleMatch,
                link_source: LinkSource::Auto,
                level: AssuranceLevel::Level3,
            },
            AssuranceEntry {
                match_result: MatchResult::Match,
                link_source: LinkSource::Auto,
                level: AssuranceLevel::Level2,
            },
        ];
        assert!(AssuranceMapper::from_entries(&inverted).is_err());

        let manual_below_auto = [
            AssuranceEntry {
                match_result: MatchResult::Match,
                link_source: LinkSource::Auto,
                level: AssuranceLevel::Level3,
            },
            AssuranceEntry {
                match_result: MatchResult::Match,
                link_source: LinkSource::Manual,
                level: AssuranceLevel::Level2,
            },
        ];
        assert!(AssuranceMapper::from_entries(&manual_below_auto).is_err());
    }

    #[test]
    fn custom_table_is_used_verbatim() {
        let mapper = AssuranceMapper::from_entries(&[AssuranceEntry {
            match_result: MatchResult::Match,
            link_source: LinkSource::Auto,
            level: AssuranceLevel::Level4,
        }])
        .unwrap();
        assert_eq!(mapper.level(MatchResult::Match, LinkSource::Auto), Some(AssuranceLevel::Level4));
        assert_eq!(mapper.level(MatchResult::PossibleMatch, LinkSource::Auto), None);
    }
}
