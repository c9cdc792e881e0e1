//! In-memory store for tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{CoreError, CoreResult};
use crate::event::{EventKey, EventRow, StoredEvent};
use crate::feed::{CalendarFeed, NewFeed, SyncOutcome};
use crate::store::{CalendarStore, EventQuery};

/// In-memory store backed by `HashMap`. No persistence.
///
/// Write failures can be injected to exercise partial-failure paths.
#[derive(Default)]
pub struct MemoryStore {
    feeds: Mutex<Vec<CalendarFeed>>,
    events: Mutex<HashMap<(String, String), StoredEvent>>,
    failing_uids: Mutex<HashSet<String>>,
    fail_deletes: AtomicBool,
    fail_event_keys: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every upsert of `uid` fail.
    pub fn fail_upserts_of(&self, uid: &str) {
        let mut failing = self.failing_uids.lock().unwrap_or_else(|e| e.into_inner());
        failing.insert(uid.to_string());
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_event_keys(&self, fail: bool) {
        self.fail_event_keys.store(fail, Ordering::SeqCst);
    }

    /// Uids stored for a feed, sorted.
    pub fn uids(&self, feed_id: &str) -> Vec<String> {
        let events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        let mut uids: Vec<String> = events
            .keys()
            .filter(|(f, _)| f == feed_id)
            .map(|(_, uid)| uid.clone())
            .collect();
        uids.sort();
        uids
    }

    pub fn event(&self, feed_id: &str, uid: &str) -> Option<StoredEvent> {
        let events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.get(&(feed_id.to_string(), uid.to_string())).cloned()
    }
}

#[async_trait]
impl CalendarStore for MemoryStore {
    async fn create_feed(&self, feed: NewFeed) -> CoreResult<CalendarFeed> {
        let feed = feed.into_feed(Utc::now())?;
        let mut feeds = self.feeds.lock().unwrap_or_else(|e| e.into_inner());
        if feeds
            .iter()
            .any(|f| f.user_id == feed.user_id && f.ics_url == feed.ics_url)
        {
            return Err(CoreError::DuplicateFeed(feed.ics_url));
        }
        feeds.push(feed.clone());
        Ok(feed)
    }

    async fn feed(&self, user_id: &str, feed_id: &str) -> CoreResult<CalendarFeed> {
        let feeds = self.feeds.lock().unwrap_or_else(|e| e.into_inner());
        feeds
            .iter()
            .find(|f| f.id == feed_id && f.user_id == user_id)
            .cloned()
            .ok_or_else(|| CoreError::FeedNotFound(feed_id.to_string()))
    }

    async fn feeds_for_user(&self, user_id: &str) -> CoreResult<Vec<CalendarFeed>> {
        let feeds = self.feeds.lock().unwrap_or_else(|e| e.into_inner());
        let mut owned: Vec<CalendarFeed> = feeds
            .iter()
            .filter(|f| f.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by_key(|f| f.created_at);
        Ok(owned)
    }

    async fn delete_feed(&self, user_id: &str, feed_id: &str) -> CoreResult<()> {
        {
            let mut feeds = self.feeds.lock().unwrap_or_else(|e| e.into_inner());
            let before = feeds.len();
            feeds.retain(|f| !(f.id == feed_id && f.user_id == user_id));
            if feeds.len() == before {
                return Err(CoreError::FeedNotFound(feed_id.to_string()));
            }
        }

        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.retain(|(f, _), _| f != feed_id);
        Ok(())
    }

    async fn record_sync_outcome(&self, feed_id: &str, outcome: &SyncOutcome) -> CoreResult<()> {
        let mut feeds = self.feeds.lock().unwrap_or_else(|e| e.into_inner());
        let feed = feeds
            .iter_mut()
            .find(|f| f.id == feed_id)
            .ok_or_else(|| CoreError::FeedNotFound(feed_id.to_string()))?;
        feed.apply_outcome(outcome);
        Ok(())
    }

    async fn event_keys(&self, feed_id: &str) -> CoreResult<Vec<EventKey>> {
        if self.fail_event_keys.load(Ordering::SeqCst) {
            return Err(CoreError::Persistence("event lookup unavailable".to_string()));
        }
        let events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        Ok(events
            .values()
            .filter(|e| e.feed_id == feed_id)
            .map(StoredEvent::key)
            .collect())
    }

    async fn upsert_event(&self, row: &EventRow) -> CoreResult<()> {
        {
            let failing = self.failing_uids.lock().unwrap_or_else(|e| e.into_inner());
            if failing.contains(&row.uid) {
                return Err(CoreError::Persistence(format!(
                    "rejected upsert of '{}'",
                    row.uid
                )));
            }
        }

        let now = Utc::now();
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events
            .entry((row.feed_id.clone(), row.uid.clone()))
            .and_modify(|existing| existing.apply_row(row, now))
            .or_insert_with(|| StoredEvent::from_row(row, now));
        Ok(())
    }

    async fn delete_events(&self, feed_id: &str, uids: &[String]) -> CoreResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(CoreError::BatchDelete("delete rejected".to_string()));
        }
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.retain(|(f, uid), _| !(f == feed_id && uids.contains(uid)));
        Ok(())
    }

    async fn events(&self, query: &EventQuery) -> CoreResult<Vec<StoredEvent>> {
        let events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        let mut matching: Vec<StoredEvent> = events
            .values()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.uid.cmp(&b.uid)));
        Ok(matching)
    }
}
