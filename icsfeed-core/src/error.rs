//! Error types for icsfeed.

use thiserror::Error;

/// Errors that can occur while fetching, parsing or reconciling feeds.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Failed to fetch calendar: {status} {status_text}")]
    Fetch { status: u16, status_text: String },

    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Parse(String),

    #[error("Failed to store event: {0}")]
    Persistence(String),

    #[error("Failed to remove events: {0}")]
    BatchDelete(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Feed not found: {0}")]
    FeedNotFound(String),

    #[error("This calendar URL is already added: {0}")]
    DuplicateFeed(String),

    #[error("Invalid feed: {0}")]
    InvalidFeed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for icsfeed operations.
pub type CoreResult<T> = Result<T, CoreError>;
