//! Calendar feed records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::DEFAULT_FEED_COLOR;
use crate::error::{CoreError, CoreResult};

/// A user's subscription to one ICS URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarFeed {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub ics_url: String,
    pub color: String,
    pub is_visible: bool,
    /// Time of the last successful sync. Only the reconciler writes this.
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Message of the last failed sync, cleared on success.
    pub last_sync_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CalendarFeed {
    /// Apply a sync outcome to this in-memory record the same way a store does.
    pub fn apply_outcome(&mut self, outcome: &SyncOutcome) {
        match outcome {
            SyncOutcome::Succeeded { at } => {
                self.last_synced_at = Some(*at);
                self.last_sync_error = None;
                self.updated_at = *at;
            }
            SyncOutcome::Failed { error } => {
                self.last_sync_error = Some(error.clone());
                self.updated_at = Utc::now();
            }
        }
    }
}

impl fmt::Display for CalendarFeed {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// The result of one sync attempt, as recorded on the feed.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// Stamps `last_synced_at` and clears `last_sync_error`.
    Succeeded { at: DateTime<Utc> },
    /// Sets `last_sync_error`; `last_synced_at` is left as it was.
    Failed { error: String },
}

/// A feed registration request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFeed {
    pub user_id: String,
    pub name: String,
    pub ics_url: String,
    pub color: Option<String>,
}

impl NewFeed {
    pub fn new(user_id: &str, name: &str, ics_url: &str) -> Self {
        NewFeed {
            user_id: user_id.to_string(),
            name: name.to_string(),
            ics_url: ics_url.to_string(),
            color: None,
        }
    }

    pub fn with_color(mut self, color: Option<String>) -> Self {
        self.color = color;
        self
    }

    /// Check the request and build the record to insert.
    pub fn into_feed(self, now: DateTime<Utc>) -> CoreResult<CalendarFeed> {
        let name = self.name.trim();
        let ics_url = self.ics_url.trim();

        if name.is_empty() || ics_url.is_empty() {
            return Err(CoreError::InvalidFeed(
                "Name and ICS URL are required".to_string(),
            ));
        }

        let url = Url::parse(ics_url)
            .map_err(|_| CoreError::InvalidFeed("Invalid URL format".to_string()))?;
        if !matches!(url.scheme(), "http" | "https" | "webcal" | "webcals") {
            return Err(CoreError::InvalidFeed(format!(
                "Unsupported URL scheme '{}'",
                url.scheme()
            )));
        }

        let color = self
            .color
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FEED_COLOR.to_string());

        Ok(CalendarFeed {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: self.user_id,
            name: name.to_string(),
            ics_url: ics_url.to_string(),
            color,
            is_visible: true,
            last_synced_at: None,
            last_sync_error: None,
            created_at: now,
            updated_at: now,
        })
    }
}
