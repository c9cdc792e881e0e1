pub mod config;
pub mod events;
pub mod feeds;
pub mod sync;

use std::sync::Arc;

use anyhow::{Context as _, Result};
use icsfeed_core::{CalendarFeed, CalendarStore, FeedReconciler, HttpFetcher, SqliteStore};
use tracing::debug;

use crate::config::IcsfeedConfig;

/// Common context for feed operations, opened once per invocation.
pub struct Context {
    pub user_id: String,
    pub store: Arc<dyn CalendarStore>,
    pub reconciler: FeedReconciler,
}

impl Context {
    pub async fn open(config: &IcsfeedConfig) -> Result<Self> {
        let db_path = config.database_path();
        debug!(path = %db_path.display(), user_id = %config.user_id, "opening store");
        let store = SqliteStore::open(&db_path)
            .await
            .with_context(|| format!("Could not open database at {}", db_path.display()))?;

        let fetcher = HttpFetcher::new(config.fetch_timeout()?, &config.user_agent)?;

        let store: Arc<dyn CalendarStore> = Arc::new(store);
        Ok(Self::with_parts(&config.user_id, store, Arc::new(fetcher)))
    }

    pub fn with_parts(
        user_id: &str,
        store: Arc<dyn CalendarStore>,
        fetcher: Arc<dyn icsfeed_core::IcsFetcher>,
    ) -> Self {
        Context {
            user_id: user_id.to_string(),
            reconciler: FeedReconciler::new(store.clone(), fetcher),
            store,
        }
    }

    pub async fn feeds(&self) -> Result<Vec<CalendarFeed>> {
        Ok(self.store.feeds_for_user(&self.user_id).await?)
    }
}

/// Shared error message for an empty feed list
pub fn require_feeds(feeds: &[CalendarFeed]) -> Result<()> {
    if feeds.is_empty() {
        anyhow::bail!(
            "No feeds found.\n\n\
            Subscribe to your first calendar with:\n  \
            icsfeed feeds add <name> <url>"
        );
    }
    Ok(())
}
