//! TUI rendering traits for icsfeed types.
//!
//! Extension traits that add colored terminal rendering to icsfeed-core
//! types using owo_colors.

use chrono::{DateTime, Local, NaiveDate, Utc};
use icsfeed_core::{BatchSyncResult, CalendarFeed, StoredEvent, SyncResult};
use owo_colors::OwoColorize;

/// Extension trait for TUI rendering with colors.
pub trait Render {
    fn render(&self) -> String;
}

/// Parse "#rrggbb" into its components.
fn hex_rgb(color: &str) -> Option<(u8, u8, u8)> {
    let hex = color.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

/// A bullet in the feed's own colour.
fn swatch(color: &str) -> String {
    match hex_rgb(color) {
        Some((r, g, b)) => "●".truecolor(r, g, b).to_string(),
        None => "●".to_string(),
    }
}

/// "just now", "5m ago", "2h ago"
fn ago(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - at).num_seconds().max(0) as u64;
    if secs < 60 {
        return "just now".to_string();
    }
    let rounded = match secs {
        s if s < 3600 => s - s % 60,
        s if s < 86400 => s - s % 3600,
        s => s - s % 86400,
    };
    format!(
        "{} ago",
        humantime::format_duration(std::time::Duration::from_secs(rounded))
    )
}

impl Render for CalendarFeed {
    fn render(&self) -> String {
        let sync_state = match (&self.last_sync_error, self.last_synced_at) {
            (Some(error), _) => error.red().to_string(),
            (None, Some(at)) => format!("synced {}", ago(at, Utc::now()))
                .dimmed()
                .to_string(),
            (None, None) => "never synced".dimmed().to_string(),
        };

        format!(
            "{} {} {}\n   {}\n   {}",
            swatch(&self.color),
            self.name.bold(),
            format!("({})", self.id).dimmed(),
            self.ics_url,
            sync_state
        )
    }
}

fn pluralize(count: usize) -> &'static str {
    if count == 1 { "event" } else { "events" }
}

impl Render for SyncResult {
    fn render(&self) -> String {
        if !self.success {
            let error = self.error.as_deref().unwrap_or("Sync failed");
            return format!("   {}", error.red());
        }

        let mut parts = Vec::new();
        if self.events_added > 0 {
            parts.push(format!("+{} new", self.events_added).green().to_string());
        }
        if self.events_updated > 0 {
            parts.push(format!("~{} updated", self.events_updated).yellow().to_string());
        }
        if self.events_removed > 0 {
            parts.push(format!("-{} removed", self.events_removed).red().to_string());
        }
        if self.events_failed > 0 {
            parts.push(
                format!("{} skipped {}", self.events_failed, pluralize(self.events_failed))
                    .red()
                    .to_string(),
            );
        }

        if parts.is_empty() {
            return format!("   {}", "No events".dimmed());
        }
        format!("   {}", parts.join(", "))
    }
}

impl Render for BatchSyncResult {
    fn render(&self) -> String {
        let mut summary = format!(
            "Synced {} {} across {} {}",
            self.total_events,
            pluralize(self.total_events),
            self.results.len(),
            if self.results.len() == 1 { "feed" } else { "feeds" }
        );
        let failed = self.failed_count();
        if failed > 0 {
            summary.push_str(&format!(" ({} failed)", failed).red().to_string());
        }
        summary
    }
}

/// Format a date as a human-readable label (e.g. "Today", "Tomorrow", "Wed Feb 25")
pub fn format_date_label(date: NaiveDate, today: NaiveDate) -> String {
    match (date - today).num_days() {
        0 => "Today".to_string(),
        1 => "Tomorrow".to_string(),
        -1 => "Yesterday".to_string(),
        _ => date.format("%a %b %-d").to_string(),
    }
}

/// Day an event is listed under. All-day events keep their UTC date.
pub fn event_date(event: &StoredEvent) -> NaiveDate {
    if event.all_day {
        event.start_time.date_naive()
    } else {
        event.start_time.with_timezone(&Local).date_naive()
    }
}

/// Format the time portion of an event (e.g. "15:00" or "all-day")
fn format_time(event: &StoredEvent) -> String {
    if event.all_day {
        "all-day".to_string()
    } else {
        format!("{:>7}", event.start_time.with_timezone(&Local).format("%H:%M"))
    }
}

impl Render for StoredEvent {
    fn render(&self) -> String {
        let mut line = format!("{} {}", format_time(self), self);
        if let Some(location) = &self.location {
            line.push_str(&format!(" @ {}", location).dimmed().to_string());
        }
        if self.status == Some(icsfeed_core::EventStatus::Cancelled) {
            line = line.strikethrough().to_string();
        }
        line
    }
}
