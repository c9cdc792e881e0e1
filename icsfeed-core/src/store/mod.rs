//! Persistence trait and implementations for feeds and their events.

mod memory;
mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::date_range::DateRange;
use crate::error::CoreResult;
use crate::event::{EventKey, EventRow, StoredEvent};
use crate::feed::{CalendarFeed, NewFeed, SyncOutcome};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Filter for listing a user's stored events.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub user_id: String,
    /// Only events starting at or after this instant.
    pub from: Option<DateTime<Utc>>,
    /// Only events ending at or before this instant.
    pub to: Option<DateTime<Utc>>,
    /// Only events of these feeds (empty means all feeds).
    pub feed_ids: Vec<String>,
}

impl EventQuery {
    pub fn for_user(user_id: &str) -> Self {
        EventQuery {
            user_id: user_id.to_string(),
            ..Default::default()
        }
    }

    pub fn in_range(mut self, range: &DateRange) -> Self {
        self.from = range.from;
        self.to = range.to;
        self
    }

    pub fn in_feeds(mut self, feed_ids: Vec<String>) -> Self {
        self.feed_ids = feed_ids;
        self
    }

    pub fn matches(&self, event: &StoredEvent) -> bool {
        event.user_id == self.user_id
            && self.from.is_none_or(|from| event.start_time >= from)
            && self.to.is_none_or(|to| event.end_time <= to)
            && (self.feed_ids.is_empty() || self.feed_ids.contains(&event.feed_id))
    }
}

/// Record store backing feeds and events.
///
/// The reconciler only uses `event_keys`, `upsert_event`, `delete_events`,
/// `record_sync_outcome` and `feeds_for_user`/`feed`; the rest serves the CLI.
#[async_trait]
pub trait CalendarStore: Send + Sync {
    /// Register a feed. Fails with `DuplicateFeed` if the user already has the URL.
    async fn create_feed(&self, feed: NewFeed) -> CoreResult<CalendarFeed>;

    /// Look up one feed owned by `user_id`. Fails with `FeedNotFound`.
    async fn feed(&self, user_id: &str, feed_id: &str) -> CoreResult<CalendarFeed>;

    /// All feeds of a user, oldest first.
    async fn feeds_for_user(&self, user_id: &str) -> CoreResult<Vec<CalendarFeed>>;

    /// Delete a feed and, with it, all of its events.
    async fn delete_feed(&self, user_id: &str, feed_id: &str) -> CoreResult<()>;

    /// Write the result of a sync attempt to the feed record.
    async fn record_sync_outcome(&self, feed_id: &str, outcome: &SyncOutcome) -> CoreResult<()>;

    /// `(id, uid)` pairs currently stored for a feed.
    async fn event_keys(&self, feed_id: &str) -> CoreResult<Vec<EventKey>>;

    /// Insert or overwrite the event keyed by `(row.feed_id, row.uid)`.
    async fn upsert_event(&self, row: &EventRow) -> CoreResult<()>;

    /// Delete the feed's events whose uid is in `uids`, as one batch.
    async fn delete_events(&self, feed_id: &str, uids: &[String]) -> CoreResult<()>;

    /// Stored events matching `query`, ordered by start time.
    async fn events(&self, query: &EventQuery) -> CoreResult<Vec<StoredEvent>>;
}
