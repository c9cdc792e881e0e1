use anyhow::Result;
use owo_colors::OwoColorize;

use crate::config::IcsfeedConfig;

pub fn run(config: &IcsfeedConfig) -> Result<()> {
    let config_path = IcsfeedConfig::config_path()?;

    println!("{}", "Paths".bold());
    println!("  Config:    {}", config_path.display());
    println!("  Database:  {}", config.database_path().display());

    println!("\n{}", "Settings".bold());
    println!("  User:           {}", config.user_id);
    println!(
        "  Fetch timeout:  {}",
        humantime::format_duration(config.fetch_timeout()?)
    );
    println!("  User agent:     {}", config.user_agent);
    println!("  Log level:      {}", config.log_level);

    Ok(())
}
