//! Configuration at ~/.config/icsfeed/config.toml, overridable with
//! `ICSFEED_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use icsfeed_core::constants::DEFAULT_FETCH_TIMEOUT;
use serde::Deserialize;

static DEFAULT_DATABASE_PATH: &str = "~/.local/share/icsfeed/icsfeed.db";
static DEFAULT_USER_ID: &str = "local";
static DEFAULT_LOG_LEVEL: &str = "warn";

fn default_database_path() -> PathBuf {
    PathBuf::from(DEFAULT_DATABASE_PATH)
}

fn default_user_id() -> String {
    DEFAULT_USER_ID.to_string()
}

fn default_fetch_timeout() -> String {
    humantime::format_duration(DEFAULT_FETCH_TIMEOUT).to_string()
}

fn default_user_agent() -> String {
    concat!("icsfeed/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IcsfeedConfig {
    /// SQLite database file. `~` is expanded.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Owner of the feeds managed from this machine.
    #[serde(default = "default_user_id")]
    pub user_id: String,

    /// How long a single feed fetch may take, e.g. "30s" or "1m".
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Default tracing filter when RUST_LOG is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl IcsfeedConfig {
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("icsfeed");

        Ok(config_dir.join("config.toml"))
    }

    /// Load the config file, creating a commented default on first run.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let config: IcsfeedConfig = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix("ICSFEED"))
            .build()
            .context("Could not read config")?
            .try_deserialize()
            .context("Invalid config")?;

        config.fetch_timeout()?;
        Ok(config)
    }

    pub fn database_path(&self) -> PathBuf {
        let full_path_str =
            shellexpand::tilde(&self.database_path.to_string_lossy()).into_owned();

        PathBuf::from(full_path_str)
    }

    pub fn fetch_timeout(&self) -> Result<Duration> {
        humantime::parse_duration(&self.fetch_timeout)
            .with_context(|| format!("Invalid fetch_timeout '{}'", self.fetch_timeout))
    }

    /// Create a default config file with all options commented out.
    pub fn create_default_config(path: &Path) -> Result<()> {
        let contents = format!(
            "\
# icsfeed configuration

# Where feeds and events are stored:
# database_path = \"{}\"

# Owner of the feeds managed from this machine:
# user_id = \"{}\"

# How long a single feed fetch may take:
# fetch_timeout = \"{}\"

# Log level when RUST_LOG is unset (error, warn, info, debug, trace):
# log_level = \"{}\"
",
            DEFAULT_DATABASE_PATH,
            DEFAULT_USER_ID,
            default_fetch_timeout(),
            DEFAULT_LOG_LEVEL
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Could not create config directory")?;
        }

        std::fs::write(path, contents).context("Could not write config file")?;

        Ok(())
    }
}
