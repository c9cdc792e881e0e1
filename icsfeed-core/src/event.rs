//! Event types.
//!
//! A `ParsedEvent` is what the ICS parser produces from one VEVENT. It is
//! turned into an `EventRow` when written to the store, and read back as a
//! `StoredEvent`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::feed::CalendarFeed;

/// Event status, as carried by the VEVENT STATUS property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Confirmed,
    Tentative,
    Cancelled,
}

impl EventStatus {
    /// Match a STATUS value case-insensitively. Anything else yields `None`.
    pub fn from_ics_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "confirmed" => Some(EventStatus::Confirmed),
            "tentative" => Some(EventStatus::Tentative),
            "cancelled" => Some(EventStatus::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Confirmed => "confirmed",
            EventStatus::Tentative => "tentative",
            EventStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized event parsed from a feed. Never persisted directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedEvent {
    pub uid: String,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub all_day: bool,
    pub status: Option<EventStatus>,
    pub recurrence_rule: Option<String>,
}

/// Stored identity of an event: store-assigned id plus the feed's uid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventKey {
    pub id: String,
    pub uid: String,
}

/// The write shape of one upsert, keyed by `(feed_id, uid)`.
///
/// Timestamps serialize in the canonical wire format and absent optional
/// fields serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRow {
    pub feed_id: String,
    pub user_id: String,
    pub uid: String,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    #[serde(with = "wire_time")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "wire_time")]
    pub end_time: DateTime<Utc>,
    pub all_day: bool,
    pub status: Option<EventStatus>,
    pub recurrence_rule: Option<String>,
}

impl EventRow {
    pub fn new(feed: &CalendarFeed, event: &ParsedEvent) -> Self {
        EventRow {
            feed_id: feed.id.clone(),
            user_id: feed.user_id.clone(),
            uid: event.uid.clone(),
            title: event.title.clone(),
            description: event.description.clone(),
            location: event.location.clone(),
            start_time: event.start_time,
            end_time: event.end_time,
            all_day: event.all_day,
            status: event.status,
            recurrence_rule: event.recurrence_rule.clone(),
        }
    }
}

/// A persisted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub id: String,
    pub feed_id: String,
    pub user_id: String,
    pub uid: String,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    #[serde(with = "wire_time")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "wire_time")]
    pub end_time: DateTime<Utc>,
    pub all_day: bool,
    pub status: Option<EventStatus>,
    pub recurrence_rule: Option<String>,
    #[serde(with = "wire_time")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "wire_time")]
    pub updated_at: DateTime<Utc>,
}

impl StoredEvent {
    /// Build a fresh row from an upsert, assigning a new id.
    pub fn from_row(row: &EventRow, now: DateTime<Utc>) -> Self {
        StoredEvent {
            id: uuid::Uuid::new_v4().to_string(),
            feed_id: row.feed_id.clone(),
            user_id: row.user_id.clone(),
            uid: row.uid.clone(),
            title: row.title.clone(),
            description: row.description.clone(),
            location: row.location.clone(),
            start_time: row.start_time,
            end_time: row.end_time,
            all_day: row.all_day,
            status: row.status,
            recurrence_rule: row.recurrence_rule.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite the mutable fields from an upsert. Identity and ownership
    /// (`id`, `feed_id`, `user_id`, `created_at`) are kept.
    pub fn apply_row(&mut self, row: &EventRow, now: DateTime<Utc>) {
        self.title = row.title.clone();
        self.description = row.description.clone();
        self.location = row.location.clone();
        self.start_time = row.start_time;
        self.end_time = row.end_time;
        self.all_day = row.all_day;
        self.status = row.status;
        self.recurrence_rule = row.recurrence_rule.clone();
        self.updated_at = now;
    }

    pub fn key(&self) -> EventKey {
        EventKey {
            id: self.id.clone(),
            uid: self.uid.clone(),
        }
    }
}

impl fmt::Display for StoredEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title)
    }
}

/// Canonical wire format for timestamps: RFC 3339, UTC, millisecond precision.
pub mod wire_time {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn parse(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn feed() -> CalendarFeed {
        CalendarFeed {
            id: "feed-1".to_string(),
            user_id: "user-1".to_string(),
            name: "Work".to_string(),
            ics_url: "https://example.com/work.ics".to_string(),
            color: "#3b82f6".to_string(),
            is_visible: true,
            last_synced_at: None,
            last_sync_error: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_matches_case_insensitively() {
        assert_eq!(EventStatus::from_ics_str("CONFIRMED"), Some(EventStatus::Confirmed));
        assert_eq!(EventStatus::from_ics_str("Tentative"), Some(EventStatus::Tentative));
        assert_eq!(EventStatus::from_ics_str("cancelled"), Some(EventStatus::Cancelled));
        assert_eq!(EventStatus::from_ics_str("CANCELED"), None);
        assert_eq!(EventStatus::from_ics_str("NEEDS-ACTION"), None);
    }

    #[test]
    fn test_event_row_wire_format() {
        let event = ParsedEvent {
            uid: "abc@example.com".to_string(),
            title: "Standup".to_string(),
            description: None,
            location: Some("Room 1".to_string()),
            start_time: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 0).unwrap(),
            all_day: false,
            status: Some(EventStatus::Confirmed),
            recurrence_rule: None,
        };

        let row = EventRow::new(&feed(), &event);
        let json = serde_json::to_value(&row).unwrap();

        assert_eq!(json["feed_id"], "feed-1");
        assert_eq!(json["user_id"], "user-1");
        assert_eq!(json["start_time"], "2024-03-01T10:00:00.000Z");
        assert_eq!(json["end_time"], "2024-03-01T10:15:00.000Z");
        assert_eq!(json["status"], "confirmed");
        assert!(json["description"].is_null());
        assert!(json["recurrence_rule"].is_null());
    }

    #[test]
    fn test_apply_row_keeps_identity() {
        let event = ParsedEvent {
            uid: "abc".to_string(),
            title: "Before".to_string(),
            description: None,
            location: None,
            start_time: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2024, 3, 1, 11, 0, 0).unwrap(),
            all_day: false,
            status: None,
            recurrence_rule: None,
        };
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut stored = StoredEvent::from_row(&EventRow::new(&feed(), &event), created);
        let id = stored.id.clone();

        let mut changed = EventRow::new(&feed(), &event);
        changed.title = "After".to_string();
        stored.apply_row(&changed, Utc::now());

        assert_eq!(stored.id, id);
        assert_eq!(stored.created_at, created);
        assert_eq!(stored.title, "After");
    }
}
