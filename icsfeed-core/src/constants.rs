use std::time::Duration;

/// Title given to events whose source has no SUMMARY.
pub const UNTITLED_EVENT: &str = "Untitled Event";

/// Colour assigned to feeds registered without one.
pub const DEFAULT_FEED_COLOR: &str = "#3b82f6";

/// Media type requested when fetching a feed.
pub const ICS_MEDIA_TYPE: &str = "text/calendar";

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Number of days shown in each direction when listing events without a range.
pub const DEFAULT_LIST_DAYS: i64 = 30;
