//! Per-hash mutual exclusion for chunk writes.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of per-hash async locks.
///
/// Entries exist only while some request holds or waits on them.
#[derive(Debug, Clone, Default)]
pub struct ChunkLocks {
    inner: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl ChunkLocks {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `hash`.
    ///
    /// The returned guard owns the entry from before the wait starts, so a
    /// waiter that is cancelled still removes an entry nobody else uses.
    pub async fn acquire(&self, hash: &str) -> ChunkGuard {
        let mut entry = ChunkGuard {
            guard: None,
            hash: hash.to_string(),
            locks: Arc::clone(&self.inner),
        };
        let pending = Arc::clone(
            self.inner
                .entry(hash.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
        .lock_owned();
        entry.guard = Some(pending.await);
        entry
    }

    /// Number of hashes with a live lock entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether no lock entries are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Exclusive access to one hash; released on drop.
#[derive(Debug)]
pub struct ChunkGuard {
    guard: Option<OwnedMutexGuard<()>>,
    hash: String,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl Drop for ChunkGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Remove the entry unless another request still references it.
        self.locks
            .remove_if(&self.hash, |_, lock| Arc::strong_count(lock) == 1);
    }
}
