use std::collections::HashMap;

use anyhow::Result;
use chrono::{Local, NaiveDate};
use icsfeed_core::{DateRange, EventQuery, StoredEvent};
use owo_colors::OwoColorize;

use crate::commands::Context;
use crate::render::{Render, event_date, format_date_label};

pub async fn run(ctx: &Context, range: DateRange, feed_ids: Vec<String>) -> Result<()> {
    let feeds = ctx.feeds().await?;
    let feed_names: HashMap<&str, &str> = feeds
        .iter()
        .map(|f| (f.id.as_str(), f.name.as_str()))
        .collect();

    for id in &feed_ids {
        if !feed_names.contains_key(id.as_str()) {
            anyhow::bail!("Feed '{}' not found", id);
        }
    }

    let query = EventQuery::for_user(&ctx.user_id)
        .in_range(&range)
        .in_feeds(feed_ids);
    let events = ctx.store.events(&query).await?;

    if events.is_empty() {
        println!("{}", "No events found".dimmed());
        return Ok(());
    }

    let today = Local::now().date_naive();
    for (i, (date, day)) in group_by_day(&events).into_iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("{}", format_date_label(date, today).bold());

        for event in day {
            let feed_tag = format!("[{}]", feed_names.get(event.feed_id.as_str()).unwrap_or(&"?"));
            println!("  {} {}", event.render(), feed_tag.dimmed());
        }
    }

    Ok(())
}

/// Consecutive runs of events sharing a listing date. Input is start-ordered.
fn group_by_day(events: &[StoredEvent]) -> Vec<(NaiveDate, Vec<&StoredEvent>)> {
    let mut days: Vec<(NaiveDate, Vec<&StoredEvent>)> = Vec::new();
    for event in events {
        let date = event_date(event);
        match days.last_mut() {
            Some((day, group)) if *day == date => group.push(event),
            _ => days.push((date, vec![event])),
        }
    }
    days
}
