//! Per-key serialization points.
//!
//! A golden record and its links form one consistency unit. Every link
//! update runs while holding the lock for its golden record's pid, so two
//! updates touching the same golden record never interleave. Slots are
//! created on demand and dropped once nobody waits on them.
//! The locks guard no data; a poisoned lock is simply taken over.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::LinkResult;
use crate::record::Pid;

type Slots = HashMap<Pid, Arc<Mutex<()>>>;

#[derive(Debug, Default)]
pub(crate) struct KeyedLocks {
    slots: Mutex<Slots>,
}

/// Releases the slot on every exit path, unwinding included.
struct SlotRelease<'a> {
    locks: &'a KeyedLocks,
    key: Pid,
    slot: Arc<Mutex<()>>,
}

impl Drop for SlotRelease<'_> {
    fn drop(&mut self) {
        let mut slots = self.locks.table();
        // One reference in the table plus ours: nobody else is waiting.
        if Arc::strong_count(&self.slot) == 2 {
            slots.remove(&self.key);
        }
    }
}

impl KeyedLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` while holding the lock for `key`.
    pub(crate) fn with_lock<T>(&self, key: Pid, f: impl FnOnce() -> LinkResult<T>) -> LinkResult<T> {
        let release = SlotRelease {
            locks: self,
            key,
            slot: Arc::clone(self.table().entry(key).or_default()),
        };

        let _guard = release.slot.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }

    #[cfg(test)]
    fn live_slots(&self) -> usize {
        self.table().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::error::LinkError;

    #[test]
    fn same_key_is_serialized() {
        let locks = KeyedLocks::new();
        let inside = AtomicUsize::new(0);
        let max_inside = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    locks
                        .with_lock(Pid::new(1), || {
                            let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                            max_inside.fetch_max(now, Ordering::SeqCst);
                            std::thread::yield_now();
                            inside.fetch_sub(1, Ordering::SeqCst);
                            Ok(())
                        })
                        .unwrap();
                });
            }
        });

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(locks.live_slots(), 0);
    }

    #[test]
    fn errors_pass_through_and_release_the_slot() {
        let locks = KeyedLocks::new();
        let result: LinkResult<()> = locks.with_lock(Pid::new(3), || Err(LinkError::internal("boom")));
        assert!(matches!(result, Err(LinkError::Internal { .. })));
        assert_eq!(locks.live_slots(), 0);
        assert_eq!(locks.with_lock(Pid::new(3), || Ok(7)).unwrap(), 7);
    }

    #[test]
    fn panic_inside_the_lock_does_not_wedge_the_key() {
        let locks = KeyedLocks::new();

        let panicked = catch_unwind(AssertUnwindSafe(|| {
            locks.with_lock(Pid::new(5), || -> LinkResult<()> { panic!("writer crashed") })
        }));

        assert!(panicked.is_err());
        assert_eq!(locks.live_slots(), 0);
        assert_eq!(locks.with_lock(Pid::new(5), || Ok("still usable")).unwrap(), "still usable");
    }
}
