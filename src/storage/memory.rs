//! In-memory storage backend.
//!
//! This module provides thread-safe in-memory implementations of the storage traits.
//! It is intended for embedded usage, tests, and as a reference implementation.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;

use crate::golden::GoldenRecord;
use crate::link::Link;
use crate::match_result::MatchResult;
use crate::record::Pid;
use crate::storage::traits::{GoldenRecordStore, LinkStore, StorageError};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("poisoned lock: {context}"))
}

fn next_version(current: u64, key: &str) -> Result<u64, StorageError> {
    current
        .checked_add(1)
        .ok_or_else(|| StorageError::BackendError(format!("version overflow on {key}")))
}

#[derive(Debug, Default)]
struct LinkState {
    by_key: HashMap<(Pid, Pid), Link>,
    by_source: HashMap<Pid, BTreeSet<Pid>>,
    by_golden: HashMap<Pid, BTreeSet<Pid>>,
}

impl LinkState {
    fn collect(&self, keys: impl Iterator<Item = (Pid, Pid)>) -> Vec<Link> {
        keys.filter_map(|k| self.by_key.get(&k).cloned()).collect()
    }
}

/// Thread-safe in-memory link store.
///
/// The `(source_pid, golden_pid)` map key is the uniqueness constraint.
#[derive(Debug, Default)]
pub struct InMemoryLinkStore {
    state: RwLock<LinkState>,
}

impl InMemoryLinkStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LinkStore for InMemoryLinkStore {
    fn find_link(&self, source_pid: Pid, golden_pid: Pid) -> Result<Option<Link>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("link.find_link"))?;
        Ok(state.by_key.get(&(source_pid, golden_pid)).cloned())
    }

    fn find_matched_link(&self, source_pid: Pid) -> Result<Option<Link>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("link.find_matched_link"))?;
        let Some(goldens) = state.by_source.get(&source_pid) else {
            return Ok(None);
        };
        Ok(goldens
            .iter()
            .filter_map(|g| state.by_key.get(&(source_pid, *g)))
            .find(|l| l.match_result == MatchResult::Match)
            .cloned())
    }

    fn find_by_source(&self, source_pid: Pid) -> Result<Vec<Link>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("link.find_by_source"))?;
        let Some(goldens) = state.by_source.get(&source_pid) else {
            return Ok(Vec::new());
        };
        Ok(state.collect(goldens.iter().map(|g| (source_pid, *g))))
    }

    fn find_by_golden(&self, golden_pid: Pid) -> Result<Vec<Link>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("link.find_by_golden"))?;
        let Some(sources) = state.by_golden.get(&golden_pid) else {
            return Ok(Vec::new());
        };
        Ok(state.collect(sources.iter().map(|s| (*s, golden_pid))))
    }

    fn find_by_match_result(&self, match_result: MatchResult) -> Result<Vec<Link>, StorageError> {
        let state = self
            .state
            .read()
            .map_err(|_| lock_err("link.find_by_match_result"))?;
        let mut links: Vec<Link> = state
            .by_key
            .values()
            .filter(|l| l.match_result == match_result)
            .cloned()
            .collect();
        links.sort_by_key(Link::key);
        Ok(links)
    }

    fn insert(&self, mut link: Link) -> Result<Link, StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("link.insert"))?;
        let key = link.key();
        if state.by_key.contains_key(&key) {
            return Err(StorageError::DuplicateKey(format!(
                "link {} -> {}",
                key.0, key.1
            )));
        }

        link.version = 1;
        state.by_source.entry(key.0).or_default().insert(key.1);
        state.by_golden.entry(key.1).or_default().insert(key.0);
        state.by_key.insert(key, link.clone());
        Ok(link)
    }

    fn update(&self, mut link: Link) -> Result<Link, StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("link.update"))?;
        let key = link.key();
        let stored = state.by_key.get(&key).ok_or(StorageError::LinkNotFound {
            source_pid: key.0,
            golden_pid: key.1,
        })?;

        let key_str = format!("link {} -> {}", key.0, key.1);
        if stored.version != link.version {
            return Err(StorageError::VersionConflict {
                key: key_str,
                expected: link.version,
                actual: stored.version,
            });
        }

        // Row identity and creation time belong to the stored row.
        link.id = stored.id;
        link.created_at = stored.created_at;
        link.version = next_version(stored.version, &key_str)?;
        state.by_key.insert(key, link.clone());
        Ok(link)
    }

    fn count(&self) -> Result<usize, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("link.count"))?;
        Ok(state.by_key.len())
    }
}

#[derive(Debug, Default)]
struct GoldenState {
    by_pid: BTreeMap<Pid, GoldenRecord>,
    last_pid: u64,
}

/// Thread-safe in-memory golden record store.
///
/// Pids are assigned sequentially starting at 1.
#[derive(Debug, Default)]
pub struct InMemoryGoldenRecordStore {
    state: RwLock<GoldenState>,
}

impl InMemoryGoldenRecordStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl GoldenRecordStore for InMemoryGoldenRecordStore {
    fn create(&self, mut golden: GoldenRecord) -> Result<GoldenRecord, StorageError> {
        if let Some(pid) = golden.pid {
            return Err(StorageError::DuplicateKey(format!("golden {pid}")));
        }

        let mut state = self.state.write().map_err(|_| lock_err("golden.create"))?;
        let raw = next_version(state.last_pid, "golden pid sequence")?;
        state.last_pid = raw;

        let pid = Pid::new(raw);
        golden.pid = Some(pid);
        golden.version = 1;
        state.by_pid.insert(pid, golden.clone());
        Ok(golden)
    }

    fn get(&self, pid: Pid) -> Result<Option<GoldenRecord>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("golden.get"))?;
        Ok(state.by_pid.get(&pid).cloned())
    }

    fn update(&self, mut golden: GoldenRecord) -> Result<GoldenRecord, StorageError> {
        let pid = golden.pid.ok_or_else(|| {
            StorageError::BackendError("cannot update a golden record that was never created".to_string())
        })?;

        let mut state = self.state.write().map_err(|_| lock_err("golden.update"))?;
        let stored = state
            .by_pid
            .get(&pid)
            .ok_or(StorageError::GoldenRecordNotFound(pid))?;

        let key = format!("golden {pid}");
        if stored.version != golden.version {
            return Err(StorageError::VersionConflict {
                key,
                expected: golden.version,
                actual: stored.version,
            });
        }

        golden.version = next_version(stored.version, &key)?;
        state.by_pid.insert(pid, golden.clone());
        Ok(golden)
    }

    fn find_by_enterprise_id(
        &self,
        system: &str,
        value: &str,
    ) -> Result<Vec<GoldenRecord>, StorageError> {
        let state = self
            .state
            .read()
            .map_err(|_| lock_err("golden.find_by_enterprise_id"))?;
        Ok(state
            .by_pid
            .values()
            .filter(|g| {
                g.identifiers
                    .iter()
                    .any(|id| id.is_in(system) && id.value == value)
            })
            .cloned()
            .collect())
    }

    fn all(&self) -> Result<Vec<GoldenRecord>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("golden.all"))?;
        Ok(state.by_pid.values().cloned().collect())
    }

    fn count(&self) -> Result<usize, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("golden.count"))?;
        Ok(state.by_pid.len())
    }
}

/// Convenience bundle of in-memory stores.
#[derive(Debug, Default)]
pub struct InMemoryStores {
    /// Link store.
    pub links: InMemoryLinkStore,
    /// Golden record store.
    pub golden_records: InMemoryGoldenRecordStore,
}

impl InMemoryStores {
    /// Create a new bundle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
