//! Sync result types returned to callers.

use serde::{Deserialize, Serialize};

/// Result of syncing one feed.
///
/// Serializes as `{success, eventsAdded, eventsUpdated, eventsRemoved, error?}`;
/// `eventsFailed` appears only when some upserts were skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub success: bool,
    pub events_added: usize,
    pub events_updated: usize,
    pub events_removed: usize,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub events_failed: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl SyncResult {
    /// A failed sync: all counts zero.
    pub fn failed(error: impl Into<String>) -> Self {
        SyncResult {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Events written by this sync (added + updated).
    pub fn total_events(&self) -> usize {
        self.events_added + self.events_updated
    }
}

/// Result of syncing every feed of a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSyncResult {
    pub results: Vec<SyncResult>,
    /// Sum of added + updated across feeds. Removals are not counted.
    pub total_events: usize,
}

impl BatchSyncResult {
    pub fn from_results(results: Vec<SyncResult>) -> Self {
        let total_events = results.iter().map(SyncResult::total_events).sum();
        BatchSyncResult {
            results,
            total_events,
        }
    }

    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }
}
