//! Rules governing which link mutations are legal.
//!
//! Each rule is an independent named predicate over a [`LinkRequest`].
//! The engine evaluates them in order and reports the first violation.
//! Rules never perform I/O, so validation can run before any write.

use std::fmt;

use tracing::debug;

use crate::error::RuleViolation;
use crate::link::Link;
use crate::match_result::{LinkSource, MatchResult};

/// A requested link mutation, as seen by the rules.
#[derive(Debug, Clone, Copy)]
pub struct LinkRequest<'a> {
    /// The link currently stored for the pair, if any.
    pub existing: Option<&'a Link>,
    /// Requested match result.
    pub match_result: MatchResult,
    /// Requested provenance.
    pub link_source: LinkSource,
}

/// A single linking rule.
pub trait LinkRule: Send + Sync {
    /// Stable rule name (for audit/debugging).
    fn name(&self) -> &str;

    /// Returns a violation if the request is illegal under this rule.
    fn check(&self, request: &LinkRequest<'_>) -> Result<(), RuleViolation>;
}

/// Automated matching may never mutate a human decision.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManualPrecedence;

impl LinkRule for ManualPrecedence {
    fn name(&self) -> &str {
        "manual_precedence"
    }

    fn check(&self, request: &LinkRequest<'_>) -> Result<(), RuleViolation> {
        let existing_manual = request
            .existing
            .is_some_and(|link| link.link_source == LinkSource::Manual);
        if existing_manual && request.link_source == LinkSource::Auto {
            return Err(RuleViolation::ManualOverrideDenied);
        }
        Ok(())
    }
}

/// Declaring two records unrelated is reserved for a human.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAutomaticNoMatch;

impl LinkRule for NoAutomaticNoMatch {
    fn name(&self) -> &str {
        "no_automatic_no_match"
    }

    fn check(&self, request: &LinkRequest<'_>) -> Result<(), RuleViolation> {
        if request.link_source == LinkSource::Auto && request.match_result == MatchResult::NoMatch {
            return Err(RuleViolation::AutoNoMatchDenied);
        }
        Ok(())
    }
}

/// Ordered list of rules.
pub struct LinkRuleEngine {
    rules: Vec<Box<dyn LinkRule>>,
}

impl LinkRuleEngine {
    /// An engine with no rules. Every request is legal.
    #[must_use]
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// The standard rule set: manual precedence, then no automatic `NO_MATCH`.
    #[must_use]
    pub fn standard() -> Self {
        Self::empty()
            .with_rule(ManualPrecedence)
            .with_rule(NoAutomaticNoMatch)
    }

    /// Appends a rule, evaluated after the existing ones.
    #[must_use]
    pub fn with_rule(mut self, rule: impl LinkRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Names of the configured rules, in evaluation order.
    #[must_use]
    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Validates a requested mutation against every rule, in order.
    ///
    /// # Errors
    /// The first [`RuleViolation`] encountered.
    pub fn validate(
        &self,
        existing: Option<&Link>,
        match_result: MatchResult,
        link_source: LinkSource,
    ) -> Result<(), RuleViolation> {
        let request = LinkRequest {
            existing,
            match_result,
            link_source,
        };
        for rule in &self.rules {
            if let Err(violation) = rule.check(&request) {
                debug!(rule = rule.name(), code = violation.code(), "link rule rejected request");
                return Err(violation);
            }
        }
        Ok(())
    }
}

impl Default for LinkRuleEngine {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for LinkRuleEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkRuleEngine")
            .field("rules", &self.rule_names())
            .finish()
    }
}
