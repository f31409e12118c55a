//! MCP Any trace inspector CLI
//!
//! Usage:
//!   mcpany-inspect watch              Watch live traffic in a terminal UI
//!   mcpany-inspect watch --plain      Print one line per event instead
//!   mcpany-inspect get <ID>           Fetch one event's full detail
//!   mcpany-inspect config             Show the effective configuration

mod commands;
mod tui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mcpany_inspector::config::{self, Config};
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "mcpany-inspect")]
#[command(author = "MCP Any Authors")]
#[command(version)]
#[command(about = "Inspect live MCP Any gateway traffic", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Backend URL (overrides config file and MCPANY_SERVER_URL)
    #[arg(long, global = true)]
    server: Option<String>,

    /// API key sent as X-API-Key
    #[arg(long, global = true)]
    api_key: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch live traffic
    Watch {
        /// Connect to this WebSocket feed URL
        #[arg(long, conflicts_with = "poll")]
        ws: Option<String>,

        /// Poll the event list instead of streaming (optionally from this server URL)
        #[arg(long, num_args = 0..=1, default_missing_value = "")]
        poll: Option<String>,

        /// Print events as plain lines instead of the terminal UI
        #[arg(long)]
        plain: bool,

        /// Initial search query
        #[arg(short, long)]
        query: Option<String>,
    },

    /// Fetch and print one event's full detail
    Get {
        /// Event ID
        id: String,

        /// Print the backend response without normalizing it
        #[arg(long)]
        raw: bool,
    },

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // The terminal UI owns stdout, so its logs go to a file
    let tui_mode = matches!(cli.command, Commands::Watch { plain: false, .. });
    init_logging(cli.verbose, tui_mode)?;

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(server) = cli.server {
        config.server_url = server;
    }
    if let Some(key) = cli.api_key {
        config.api_key = Some(key);
    }

    match cli.command {
        Commands::Watch {
            ws,
            poll,
            plain,
            query,
        } => {
            let opts = commands::watch::WatchOptions {
                ws,
                poll,
                plain,
                query,
            };
            commands::watch::run(config, opts).await?;
        }

        Commands::Get { id, raw } => {
            commands::get::run(&config, &id, raw).await?;
        }

        Commands::Config => {
            commands::config::show(&config)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool, to_file: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_directives(verbose).into());

    if to_file {
        let file_appender = log_appender(&config::config_dir())?;
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(file_appender),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().without_time())
            .init();
    }

    Ok(())
}

/// Filter used when RUST_LOG is unset; covers this binary and both libraries
fn default_directives(verbose: bool) -> String {
    let (log_level, crate_level) = if verbose {
        ("debug", "debug")
    } else {
        ("warn", "info")
    };
    format!(
        "{},mcpany_inspect={},mcpany_inspector={},mcpany_common={}",
        log_level, crate_level, crate_level, crate_level
    )
}

fn log_appender(log_dir: &Path) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(config::LOG_FILE_NAME)
        .build(log_dir)
        .with_context(|| format!("Failed to open log file in {}", log_dir.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_directives_cover_binary_modules() {
        let directives = default_directives(false);
        assert!(directives.starts_with("warn,"));
        assert!(directives.contains("mcpany_inspect=info"));
        assert!(directives.contains("mcpany_inspector=info"));
        assert!(default_directives(true).contains("mcpany_inspect=debug"));

        let filter = tracing_subscriber::EnvFilter::try_new(directives).unwrap();
        assert_eq!(
            filter.max_level_hint(),
            Some(tracing_subscriber::filter::LevelFilter::INFO)
        );
    }

    #[test]
    fn test_log_appender_writes_into_log_dir() {
        let dir = std::env::temp_dir().join(format!("mcpany-inspect-logs-{}", std::process::id()));
        let mut appender = log_appender(&dir).unwrap();
        appender.write_all(b"Live feed paused\n").unwrap();
        appender.flush().unwrap();

        let written = std::fs::read_to_string(dir.join(config::LOG_FILE_NAME)).unwrap();
        assert!(written.contains("Live feed paused"));
        std::fs::remove_dir_all(&dir).ok();
    }
}
