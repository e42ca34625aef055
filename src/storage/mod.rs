//! Storage contracts and backends.
//!
//! The traits define the abstract interface the linking core consumes. The
//! in-memory backend is thread-safe and serves embedded use and tests.

pub mod memory;
mod traits;

pub use memory::{InMemoryGoldenRecordStore, InMemoryLinkStore, InMemoryStores};
pub use traits::{GoldenRecordStore, LinkStore, StorageError};
