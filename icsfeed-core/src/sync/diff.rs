//! Diff between a feed's stored events and a freshly parsed document.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::event::{EventKey, EventRow, ParsedEvent};
use crate::feed::CalendarFeed;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffKind {
    Create,
    Update,
}

impl fmt::Display for DiffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffKind::Create => write!(f, "+"),
            DiffKind::Update => write!(f, "~"),
        }
    }
}

/// One upsert, classified by whether its uid was stored before the sync.
#[derive(Debug, Clone)]
pub struct EventDiff {
    pub kind: DiffKind,
    pub row: EventRow,
}

impl fmt::Display for EventDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.row.title)
    }
}

/// Full-replace plan for one feed: every parsed event is upserted and
/// every stored uid missing from the document is removed.
#[derive(Debug, Clone)]
pub struct FeedDiff {
    pub to_upsert: Vec<EventDiff>,
    /// Uids to delete, sorted.
    pub to_remove: Vec<String>,
}

impl FeedDiff {
    /// Classification is by pre-sync membership only. An unchanged event
    /// still counts as an update.
    pub fn compute(feed: &CalendarFeed, existing: &[EventKey], parsed: &[ParsedEvent]) -> Self {
        let existing_uids: HashSet<&str> = existing.iter().map(|k| k.uid.as_str()).collect();
        let new_uids: HashSet<&str> = parsed.iter().map(|e| e.uid.as_str()).collect();

        let to_upsert = parsed
            .iter()
            .map(|event| EventDiff {
                kind: if existing_uids.contains(event.uid.as_str()) {
                    DiffKind::Update
                } else {
                    DiffKind::Create
                },
                row: EventRow::new(feed, event),
            })
            .collect();

        let mut to_remove: Vec<String> = existing_uids
            .difference(&new_uids)
            .map(|uid| uid.to_string())
            .collect();
        to_remove.sort();

        FeedDiff {
            to_upsert,
            to_remove,
        }
    }
}
