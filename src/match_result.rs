//! Match outcomes and link provenance.
//!
//! A [`MatchResult`] is what a comparison between a source record and a
//! golden record produced. A [`LinkSource`] says who made that decision:
//! the matching algorithm or a human.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of comparing a source record to a golden record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchResult {
    /// The records describe different entities.
    NoMatch,
    /// The records may describe the same entity; needs adjudication.
    PossibleMatch,
    /// The records describe the same entity.
    Match,
    /// Two golden records are probably the same entity.
    PossibleDuplicate,
}

impl MatchResult {
    /// All variants, in declaration order.
    pub const ALL: [Self; 4] = [
        Self::NoMatch,
        Self::PossibleMatch,
        Self::Match,
        Self::PossibleDuplicate,
    ];

    /// Stable wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoMatch => "NO_MATCH",
            Self::PossibleMatch => "POSSIBLE_MATCH",
            Self::Match => "MATCH",
            Self::PossibleDuplicate => "POSSIBLE_DUPLICATE",
        }
    }

    /// Parses a wire name, case-insensitively.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str().eq_ignore_ascii_case(value))
    }

    /// Returns true when this result attaches the source record to the golden record.
    #[must_use]
    pub const fn is_attaching(self) -> bool {
        matches!(self, Self::Match | Self::PossibleMatch)
    }
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance of a match decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkSource {
    /// Produced by automated matching.
    Auto,
    /// Curated by a human.
    Manual,
}

impl LinkSource {
    /// Stable wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "AUTO",
            Self::Manual => "MANUAL",
        }
    }

    /// Parses a wire name, case-insensitively.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("AUTO") {
            Some(Self::Auto)
        } else if value.eq_ignore_ascii_case("MANUAL") {
            Some(Self::Manual)
        } else {
            None
        }
    }

    /// Returns true for human-curated decisions.
    #[must_use]
    pub const fn is_manual(self) -> bool {
        matches!(self, Self::Manual)
    }
}

impl fmt::Display for LinkSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
