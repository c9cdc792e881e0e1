use anyhow::Result;
use icsfeed_core::BatchSyncResult;
use owo_colors::OwoColorize;

use crate::commands::{Context, require_feeds};
use crate::render::Render;
use crate::utils::tui;

pub async fn run(ctx: &Context, feed_id: Option<&str>, json: bool) -> Result<()> {
    if let Some(feed_id) = feed_id {
        return run_one(ctx, feed_id, json).await;
    }

    if json {
        let batch = ctx.reconciler.sync_all_feeds(&ctx.user_id).await;
        println!("{}", serde_json::to_string_pretty(&batch)?);
        return Ok(());
    }

    let feeds = ctx.feeds().await?;
    require_feeds(&feeds)?;

    let mut results = Vec::with_capacity(feeds.len());
    for (i, feed) in feeds.iter().enumerate() {
        let spinner = tui::create_spinner(feed.name.bold().to_string());
        let result = ctx.reconciler.sync_feed(feed).await;
        spinner.finish_and_clear();

        println!("{}", feed.name.bold());
        println!("{}", result.render());
        if i < feeds.len() - 1 {
            println!();
        }
        results.push(result);
    }

    println!("\n{}", BatchSyncResult::from_results(results).render());
    Ok(())
}

async fn run_one(ctx: &Context, feed_id: &str, json: bool) -> Result<()> {
    let feed = ctx.store.feed(&ctx.user_id, feed_id).await?;

    let spinner = (!json).then(|| tui::create_spinner(feed.name.bold().to_string()));
    let result = ctx.reconciler.sync_feed(&feed).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", feed.name.bold());
        println!("{}", result.render());
    }

    if !result.success {
        anyhow::bail!("Sync failed");
    }
    Ok(())
}
