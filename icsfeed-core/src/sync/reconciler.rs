//! Reconciles stored events with the current contents of each feed.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, instrument, warn};

use crate::error::CoreResult;
use crate::event::EventKey;
use crate::feed::{CalendarFeed, SyncOutcome};
use crate::ics::{IcsFetcher, fetch_and_parse_ics};
use crate::store::CalendarStore;
use crate::sync::{BatchSyncResult, DiffKind, FeedDiff, FeedLocks, SyncResult};

/// Fetches feeds and applies full-replace diffs to the store.
#[derive(Clone)]
pub struct FeedReconciler {
    store: Arc<dyn CalendarStore>,
    fetcher: Arc<dyn IcsFetcher>,
    locks: FeedLocks,
}

impl FeedReconciler {
    pub fn new(store: Arc<dyn CalendarStore>, fetcher: Arc<dyn IcsFetcher>) -> Self {
        FeedReconciler {
            store,
            fetcher,
            locks: FeedLocks::new(),
        }
    }

    pub fn locks(&self) -> &FeedLocks {
        &self.locks
    }

    /// Sync one feed. Never fails: errors are returned in the result and
    /// recorded on the feed.
    #[instrument(skip_all, fields(feed_id = %feed.id, feed = %feed.name))]
    pub async fn sync_feed(&self, feed: &CalendarFeed) -> SyncResult {
        let _guard = self.locks.acquire(&feed.id).await;
        info!(url = %feed.ics_url, "syncing feed");

        let diff = match self.plan(feed).await {
            Ok(diff) => diff,
            Err(e) => {
                let message = e.to_string();
                self.record(feed, SyncOutcome::Failed { error: message.clone() })
                    .await;
                return SyncResult::failed(message);
            }
        };

        let mut result = SyncResult {
            success: true,
            ..Default::default()
        };

        for event_diff in &diff.to_upsert {
            match self.store.upsert_event(&event_diff.row).await {
                Ok(()) => match event_diff.kind {
                    DiffKind::Create => result.events_added += 1,
                    _ => result.events_updated += 1,
                },
                Err(e) => {
                    warn!(uid = %event_diff.row.uid, error = %e, "skipping event");
                    result.events_failed += 1;
                }
            }
        }

        if !diff.to_remove.is_empty() {
            match self.store.delete_events(&feed.id, &diff.to_remove).await {
                Ok(()) => result.events_removed = diff.to_remove.len(),
                Err(e) => {
                    warn!(count = diff.to_remove.len(), error = %e, "failed to remove stale events");
                }
            }
        }

        self.record(feed, SyncOutcome::Succeeded { at: Utc::now() })
            .await;

        info!(
            added = result.events_added,
            updated = result.events_updated,
            removed = result.events_removed,
            failed = result.events_failed,
            "feed synced"
        );
        result
    }

    /// Sync every feed of a user, one after another.
    #[instrument(skip(self))]
    pub async fn sync_all_feeds(&self, user_id: &str) -> BatchSyncResult {
        let feeds = match self.store.feeds_for_user(user_id).await {
            Ok(feeds) => feeds,
            Err(e) => {
                error!(error = %e, "failed to load feeds");
                return BatchSyncResult::default();
            }
        };

        let mut results = Vec::with_capacity(feeds.len());
        for feed in &feeds {
            results.push(self.sync_feed(feed).await);
        }

        let batch = BatchSyncResult::from_results(results);
        info!(
            feeds = feeds.len(),
            failed = batch.failed_count(),
            total_events = batch.total_events,
            "batch sync finished"
        );
        batch
    }

    /// Sync a single feed owned by `user_id`.
    pub async fn sync_feed_by_id(&self, user_id: &str, feed_id: &str) -> CoreResult<SyncResult> {
        let feed = self.store.feed(user_id, feed_id).await?;
        Ok(self.sync_feed(&feed).await)
    }

    /// Fetch, parse and diff against the stored keys.
    async fn plan(&self, feed: &CalendarFeed) -> CoreResult<FeedDiff> {
        let parsed = fetch_and_parse_ics(self.fetcher.as_ref(), &feed.ics_url).await?;
        let existing: Vec<EventKey> = self.store.event_keys(&feed.id).await.inspect_err(|e| {
            error!(error = %e, "failed to load stored events");
        })?;
        Ok(FeedDiff::compute(feed, &existing, &parsed))
    }

    async fn record(&self, feed: &CalendarFeed, outcome: SyncOutcome) {
        if let Err(e) = self.store.record_sync_outcome(&feed.id, &outcome).await {
            error!(error = %e, "failed to record sync outcome");
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::error::CoreError;
    use crate::feed::NewFeed;
    use crate::store::MemoryStore;

    /// Serves canned bodies per URL; unknown URLs return 404.
    #[derive(Default)]
    struct StubFetcher {
        bodies: Mutex<HashMap<String, String>>,
    }

    impl StubFetcher {
        fn serve(&self, url: &str, body: String) {
            self.bodies.lock().unwrap().insert(url.to_string(), body);
        }
    }

    #[async_trait]
    impl IcsFetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> CoreResult<String> {
            self.bodies
                .lock()
                .unwrap()
                .get(url)
                .cloned()
                .ok_or(CoreError::Fetch {
                    status: 404,
                    status_text: "Not Found".to_string(),
                })
        }
    }

    fn calendar(uids: &[&str]) -> String {
        let mut body = String::from("BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//test//EN\r\n");
        for uid in uids {
            body.push_str(&format!(
                "BEGIN:VEVENT\r\nUID:{uid}\r\nSUMMARY:Event {uid}\r\nDTSTART:20240304T090000Z\r\nDTEND:20240304T100000Z\r\nEND:VEVENT\r\n"
            ));
        }
        body.push_str("END:VCALENDAR\r\n");
        body
    }

    async fn setup() -> (Arc<MemoryStore>, Arc<StubFetcher>, FeedReconciler, CalendarFeed) {
        let store = Arc::new(MemoryStore::new());
        let fetcher = Arc::new(StubFetcher::default());
        let reconciler = FeedReconciler::new(store.clone(), fetcher.clone());
        let feed = store
            .create_feed(NewFeed::new("u1", "Work", "https://example.com/work.ics"))
            .await
            .unwrap();
        (store, fetcher, reconciler, feed)
    }

    #[tokio::test]
    async fn test_first_sync_adds_then_updates() {
        let (store, fetcher, reconciler, feed) = setup().await;
        fetcher.serve(&feed.ics_url, calendar(&["a", "b"]));

        let first = reconciler.sync_feed(&feed).await;
        assert!(first.success);
        assert_eq!((first.events_added, first.events_updated), (2, 0));

        let second = reconciler.sync_feed(&feed).await;
        assert_eq!((second.events_added, second.events_updated), (0, 2));
        assert_eq!(store.uids(&feed.id), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_prunes_missing_uids() {
        let (store, fetcher, reconciler, feed) = setup().await;
        fetcher.serve(&feed.ics_url, calendar(&["a", "b", "c"]));
        reconciler.sync_feed(&feed).await;

        fetcher.serve(&feed.ics_url, calendar(&["a", "c"]));
        let result = reconciler.sync_feed(&feed).await;
        assert_eq!(result.events_removed, 1);
        assert_eq!(store.uids(&feed.id), vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_events_and_records_error() {
        let (store, fetcher, reconciler, feed) = setup().await;
        fetcher.serve(&feed.ics_url, calendar(&["a"]));
        reconciler.sync_feed(&feed).await;
        let synced_at = store.feed("u1", &feed.id).await.unwrap().last_synced_at;

        fetcher.bodies.lock().unwrap().clear();
        let result = reconciler.sync_feed(&feed).await;
        assert_eq!(
            result,
            SyncResult::failed("Failed to fetch calendar: 404 Not Found")
        );

        let stored = store.feed("u1", &feed.id).await.unwrap();
        assert_eq!(
            stored.last_sync_error.as_deref(),
            Some("Failed to fetch calendar: 404 Not Found")
        );
        assert_eq!(stored.last_synced_at, synced_at);
        assert_eq!(store.uids(&feed.id), vec!["a"]);
    }

    #[tokio::test]
    async fn test_parse_failure_is_reported() {
        let (_store, fetcher, reconciler, feed) = setup().await;
        fetcher.serve(&feed.ics_url, "<html>not a calendar</html>".to_string());

        let result = reconciler.sync_feed(&feed).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Failed to parse calendar data"));
    }

    #[tokio::test]
    async fn test_upsert_failure_is_skipped() {
        let (store, fetcher, reconciler, feed) = setup().await;
        fetcher.serve(&feed.ics_url, calendar(&["a", "b", "c"]));
        store.fail_upserts_of("b");

        let result = reconciler.sync_feed(&feed).await;
        assert!(result.success);
        assert_eq!(result.events_added, 2);
        assert_eq!(result.events_failed, 1);
        assert_eq!(store.uids(&feed.id), vec!["a", "c"]);

        let stored = store.feed("u1", &feed.id).await.unwrap();
        assert!(stored.last_sync_error.is_none());
        assert!(stored.last_synced_at.is_some());
    }

    #[tokio::test]
    async fn test_failed_delete_reports_zero_removed() {
        let (store, fetcher, reconciler, feed) = setup().await;
        fetcher.serve(&feed.ics_url, calendar(&["a", "b"]));
        reconciler.sync_feed(&feed).await;

        store.set_fail_deletes(true);
        fetcher.serve(&feed.ics_url, calendar(&["a"]));
        let result = reconciler.sync_feed(&feed).await;
        assert!(result.success);
        assert_eq!(result.events_removed, 0);
        assert_eq!(store.uids(&feed.id), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_key_lookup_failure_fails_the_feed() {
        let (store, fetcher, reconciler, feed) = setup().await;
        fetcher.serve(&feed.ics_url, calendar(&["a"]));
        store.set_fail_event_keys(true);

        let result = reconciler.sync_feed(&feed).await;
        assert!(!result.success);
        assert!(store.uids(&feed.id).is_empty());
        assert!(store
            .feed("u1", &feed.id)
            .await
            .unwrap()
            .last_sync_error
            .is_some());
    }

    #[tokio::test]
    async fn test_sync_feed_by_id_checks_owner() {
        let (_store, fetcher, reconciler, feed) = setup().await;
        fetcher.serve(&feed.ics_url, calendar(&["a"]));

        let result = reconciler.sync_feed_by_id("u1", &feed.id).await.unwrap();
        assert_eq!(result.events_added, 1);

        assert!(matches!(
            reconciler.sync_feed_by_id("u2", &feed.id).await,
            Err(CoreError::FeedNotFound(_))
        ));
    }
}
