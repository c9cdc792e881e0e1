mod commands;
mod config;
mod render;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use icsfeed_core::DateRange;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::Context;
use crate::config::IcsfeedConfig;

#[derive(Parser)]
#[command(name = "icsfeed")]
#[command(about = "Subscribe to ICS calendar feeds and keep a local copy of their events")]
#[command(version)]
struct Cli {
    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage feed subscriptions
    Feeds {
        #[command(subcommand)]
        command: FeedsCommand,
    },
    /// Fetch feeds and update stored events
    Sync {
        /// Only sync this feed (by id)
        #[arg(short, long)]
        feed: Option<String>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// List stored events
    Events {
        /// Show events from this date (YYYY-MM-DD, or "start" for all past events)
        #[arg(long)]
        from: Option<String>,

        /// Show events until this date (YYYY-MM-DD, or "end" for all future events)
        #[arg(long)]
        to: Option<String>,

        /// Only show events of these feeds (by id)
        #[arg(short, long)]
        feed: Vec<String>,
    },
    /// Show paths and effective configuration
    Config,
}

#[derive(Subcommand)]
enum FeedsCommand {
    /// Subscribe to a feed and sync it
    Add {
        name: String,
        url: String,

        /// Display colour, e.g. "#10b981"
        #[arg(long)]
        color: Option<String>,
    },
    /// List feeds and their sync state
    List,
    /// Remove a feed and its events
    Remove {
        id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

fn init_telemetry(cli: &Cli, config: &IcsfeedConfig) {
    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = IcsfeedConfig::load()?;
    init_telemetry(&cli, &config);

    match cli.command {
        Commands::Config => commands::config::run(&config),
        Commands::Feeds { command } => {
            let ctx = Context::open(&config).await?;
            match command {
                FeedsCommand::Add { name, url, color } => {
                    commands::feeds::add(&ctx, &name, &url, color).await
                }
                FeedsCommand::List => commands::feeds::list(&ctx).await,
                FeedsCommand::Remove { id, yes } => commands::feeds::remove(&ctx, &id, yes).await,
            }
        }
        Commands::Sync { feed, json } => {
            let ctx = Context::open(&config).await?;
            commands::sync::run(&ctx, feed.as_deref(), json).await
        }
        Commands::Events { from, to, feed } => {
            let ctx = Context::open(&config).await?;
            let range = DateRange::from_args(from.as_deref(), to.as_deref())
                .map_err(|e| anyhow::anyhow!(e))?;
            commands::events::run(&ctx, range, feed).await
        }
    }
}
