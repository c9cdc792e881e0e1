//! Core library for icsfeed.
//!
//! Parses iCalendar feeds into a normalized event model and keeps a record
//! store in step with each feed:
//! - `ics` fetches and parses feed bodies
//! - `store` persists feeds and events (SQLite or in memory)
//! - `sync` reconciles stored events against a freshly parsed feed

pub mod constants;
pub mod date_range;
pub mod error;
pub mod event;
pub mod feed;
pub mod ics;
pub mod store;
pub mod sync;

pub use date_range::DateRange;
pub use error::{CoreError, CoreResult};
pub use event::{EventKey, EventRow, EventStatus, ParsedEvent, StoredEvent};
pub use feed::{CalendarFeed, NewFeed, SyncOutcome};
pub use ics::{HttpFetcher, IcsFetcher, fetch_and_parse_ics, parse_ics};
pub use store::{CalendarStore, EventQuery, MemoryStore, SqliteStore};
pub use sync::{BatchSyncResult, FeedLocks, FeedReconciler, SyncResult};
