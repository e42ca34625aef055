//! # identity-link - Golden record linking core
//!
//! Maintains the association between source records (records as received
//! from an originating system) and golden records (the surviving
//! enterprise-level identity representing one real-world person).
//!
//! ## Core Concepts
//!
//! - **Link**: A persisted, typed association between one source record and one golden record
//! - **Match result**: How strongly the pair is believed to be the same person
//! - **Link source**: Whether the decision was made by an automated matcher or a human
//! - **Assurance level**: Ordered confidence grade derived from result and source
//! - **Rule engine**: Gatekeeper protecting human decisions from automated overrides
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use identity_link::{
//!     CandidateResolver, InMemoryStores, LinkService, NameBirthDateComparator,
//!     ResolutionConfig, SourceRecord, Pid, HumanName,
//! };
//!
//! let stores = InMemoryStores::new();
//! let service = LinkService::new(
//!     Arc::new(stores.links),
//!     Arc::new(stores.golden_records),
//!     &ResolutionConfig::default(),
//! )?;
//! let resolver = CandidateResolver::new(Arc::new(service), Arc::new(NameBirthDateComparator));
//!
//! let jane = SourceRecord::new("Patient/1")
//!     .with_pid(Pid::new(1))
//!     .with_name(HumanName::new("Doe", ["Jane"]));
//! resolver.resolve(&jane)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod error;
pub mod golden;
pub mod link;
pub mod match_result;
pub mod record;

// Policy
pub mod assurance;
pub mod config;
pub mod rules;

// Storage and orchestration
pub mod accessor;
pub mod comparator;
pub mod engine;
pub mod resolution;
pub mod storage;

// Re-export primary types at crate root for convenience
pub use accessor::{EidSync, GoldenRecordAccessor};
pub use assurance::{AssuranceEntry, AssuranceLevel, AssuranceMapper};
pub use comparator::{Comparator, NameBirthDateComparator};
pub use config::{EidConflictPolicy, ResolutionConfig};
pub use engine::{LinkService, LinkUpdate};
pub use error::{ConfigError, LinkError, LinkResult, RecordRole, RuleViolation};
pub use golden::{GoldenRecord, LinkedRecordRef};
pub use link::{Link, LinkId};
pub use match_result::{LinkSource, MatchResult};
pub use record::{HumanName, Identifier, IdentifierOrigin, Pid, SourceRecord, Tag};
pub use resolution::{CandidateResolver, ResolutionOutcome};
pub use rules::{LinkRequest, LinkRule, LinkRuleEngine, ManualPrecedence, NoAutomaticNoMatch};
pub use storage::{
    GoldenRecordStore, InMemoryGoldenRecordStore, InMemoryLinkStore, InMemoryStores, LinkStore,
    StorageError,
};
