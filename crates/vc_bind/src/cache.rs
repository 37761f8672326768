//! Copy-on-write lookup tables.
//!
//! Every converter, descriptor and annotated type is built once and then
//! read by any number of threads. A [`SnapshotTable`] keeps the published
//! entries in an immutable map behind an [`ArcSwap`]: lookups load the
//! current snapshot without locking, while insertions serialize on a mutex
//! and only mark the snapshot stale. The first lookup that misses a stale
//! snapshot rebuilds it, so a burst of insertions costs one copy.

use alloc::sync::Arc;
use core::hash::Hash;
use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use arc_swap::ArcSwap;
use log::trace;

use crate::hash::HashMap;

/// A map with lock-free reads and first-writer-wins insertion.
pub struct SnapshotTable<K, V> {
    name: &'static str,
    shared: Mutex<HashMap<K, V>>,
    snapshot: ArcSwap<HashMap<K, V>>,
    /// Set when `shared` holds entries the snapshot lacks.
    stale: AtomicBool,
}

impl<K, V> SnapshotTable<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            shared: Mutex::new(HashMap::default()),
            snapshot: ArcSwap::from_pointee(HashMap::default()),
            stale: AtomicBool::new(false),
        }
    }

    /// Looks `key` up in the current snapshot.
    ///
    /// A hit never locks. A miss while the snapshot is stale republishes it
    /// and retries once.
    pub fn get(&self, key: &K) -> Option<V> {
        if let Some(value) = self.snapshot.load().get(key) {
            return Some(value.clone());
        }
        if self.stale.load(Ordering::Acquire) {
            self.publish();
            return self.snapshot.load().get(key).cloned();
        }
        None
    }

    /// Inserts `value` unless `key` is already present.
    ///
    /// Returns the stored value, which is the earlier one if another thread
    /// won the race.
    pub fn insert(&self, key: K, value: V) -> V {
        let stored = {
            let mut shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
            shared.entry(key).or_insert(value).clone()
        };
        self.stale.store(true, Ordering::Release);
        stored
    }

    /// Removes every entry.
    pub fn clear(&self) {
        let mut shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        shared.clear();
        self.snapshot.store(Arc::new(HashMap::default()));
        self.stale.store(false, Ordering::Release);
    }

    /// The number of entries, publishing pending insertions first.
    pub fn len(&self) -> usize {
        if self.stale.load(Ordering::Acquire) {
            self.publish();
        }
        self.snapshot.load().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn publish(&self) {
        let shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        if self.stale.swap(false, Ordering::AcqRel) {
            trace!("publishing {} snapshot with {} entries", self.name, shared.len());
            self.snapshot.store(Arc::new(shared.clone()));
        }
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn first_insert_wins() {
        let table = SnapshotTable::new("test");
        assert_eq!(table.get(&1), None);
        assert_eq!(table.insert(1, "a"), "a");
        assert_eq!(table.insert(1, "b"), "a");
        assert_eq!(table.get(&1), Some("a"));
        assert_eq!(table.len(), 1);

        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.insert(1, "b"), "b");
    }

    #[test]
    fn insert_defers_the_snapshot() {
        let table = SnapshotTable::new("test");
        table.insert(1, "a");
        table.insert(2, "b");
        assert!(table.snapshot.load().is_empty());
        assert!(table.stale.load(Ordering::Acquire));

        assert_eq!(table.get(&2), Some("b"));
        assert_eq!(table.snapshot.load().len(), 2);
        assert!(!table.stale.load(Ordering::Acquire));
    }

    #[test]
    fn hits_do_not_lock() {
        let table = SnapshotTable::new("test");
        table.insert(1, "a");
        assert_eq!(table.get(&1), Some("a"));

        // Lookups of published keys succeed while a writer holds the lock.
        let _guard = table.shared.lock().unwrap();
        assert_eq!(table.get(&1), Some("a"));
        assert_eq!(table.get(&1), Some("a"));
    }

    #[test]
    fn concurrent_inserts_agree() {
        let table = Arc::new(SnapshotTable::<u32, u32>::new("test"));
        let handles: alloc::vec::Vec<_> = (0..8)
            .map(|id| {
                let table = table.clone();
                thread::spawn(move || {
                    for key in 0..64 {
                        table.insert(key, id);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(table.len(), 64);
        let first = table.get(&0).unwrap();
        assert!(first < 8);
    }
}
