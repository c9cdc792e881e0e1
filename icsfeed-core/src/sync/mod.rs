//! Feed reconciliation: diffing, locking and applying syncs.

mod diff;
mod lock;
mod reconciler;
mod result;

pub use diff::{DiffKind, EventDiff, FeedDiff};
pub use lock::{FeedLockGuard, FeedLocks};
pub use reconciler::FeedReconciler;
pub use result::{BatchSyncResult, SyncResult};
