//! Config command - print the effective configuration

use anyhow::{Context, Result};
use console::style;
use mcpany_inspector::config::{self, Config};

pub fn show(config: &Config) -> Result<()> {
    let path = config::config_file();
    let source = if path.exists() { "" } else { " (not found, using defaults)" };
    println!(
        "{} {}{}",
        style("Config file:").dim(),
        style(path.display()).cyan(),
        style(source).dim()
    );
    println!();

    let yaml = serde_yaml::to_string(&redacted(config)).context("Failed to serialize config")?;
    print!("{}", yaml);

    if let Err(e) = config.validate() {
        println!();
        println!("{} {}", style("!").yellow().bold(), style(e).yellow());
    }

    Ok(())
}

/// Copy of `config` safe to print
fn redacted(config: &Config) -> Config {
    let mut shown = config.clone();
    if shown.api_key.is_some() {
        shown.api_key = Some("********".to_string());
    }
    shown
}
