//! Per-feed mutual exclusion.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// Keyed async mutex: at most one holder per feed id within the process.
///
/// Entries are created on demand and removed when the last holder or
/// waiter goes away.
#[derive(Clone, Default)]
pub struct FeedLocks {
    locks: LockMap,
}

/// Held while a feed is being synced. Releases on drop.
pub struct FeedLockGuard {
    feed_id: String,
    locks: LockMap,
    guard: Option<OwnedMutexGuard<()>>,
}

impl FeedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, feed_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(feed_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Wait until no one else holds `feed_id`, then hold it.
    pub async fn acquire(&self, feed_id: &str) -> FeedLockGuard {
        let guard = self.entry(feed_id).lock_owned().await;
        FeedLockGuard {
            feed_id: feed_id.to_string(),
            locks: self.locks.clone(),
            guard: Some(guard),
        }
    }

    /// Number of feed ids currently tracked.
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for FeedLockGuard {
    fn drop(&mut self) {
        self.guard.take();
        prune(&self.locks, &self.feed_id);
    }
}

/// Drop the entry for `feed_id` if only the map still references it.
fn prune(locks: &LockMap, feed_id: &str) {
    let mut locks = locks.lock().unwrap_or_else(|e| e.into_inner());
    if locks
        .get(feed_id)
        .is_some_and(|lock| Arc::strong_count(lock) == 1)
    {
        locks.remove(feed_id);
    }
}
