use anyhow::Result;
use dialoguer::Confirm;
use icsfeed_core::{CoreError, NewFeed};
use owo_colors::OwoColorize;

use crate::commands::{Context, require_feeds};
use crate::render::Render;
use crate::utils::tui;

/// Subscribe to a feed and sync it right away.
pub async fn add(ctx: &Context, name: &str, url: &str, color: Option<String>) -> Result<()> {
    let request = NewFeed::new(&ctx.user_id, name, url).with_color(color);

    let feed = match ctx.store.create_feed(request).await {
        Ok(feed) => feed,
        Err(CoreError::DuplicateFeed(_)) => anyhow::bail!("This calendar URL is already added"),
        Err(e) => return Err(e.into()),
    };

    println!("{} Added {}", "✓".green(), feed.name.bold());

    let spinner = tui::create_spinner(format!("Syncing {}", feed.name));
    let result = ctx.reconciler.sync_feed(&feed).await;
    spinner.finish_and_clear();

    println!("{}", result.render());
    Ok(())
}

pub async fn list(ctx: &Context) -> Result<()> {
    let feeds = ctx.feeds().await?;
    require_feeds(&feeds)?;

    for (i, feed) in feeds.iter().enumerate() {
        println!("{}", feed.render());
        if i < feeds.len() - 1 {
            println!();
        }
    }

    Ok(())
}

/// Delete a feed and all of its events.
pub async fn remove(ctx: &Context, feed_id: &str, yes: bool) -> Result<()> {
    let feed = ctx.store.feed(&ctx.user_id, feed_id).await?;

    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Remove {} and all of its events?",
                feed.name.bold()
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("{}", "Cancelled".dimmed());
            return Ok(());
        }
    }

    ctx.store.delete_feed(&ctx.user_id, &feed.id).await?;
    println!("{} Removed {}", "✓".green(), feed.name.bold());
    Ok(())
}
