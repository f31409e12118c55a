//! Get command - fetch one event's full detail

use anyhow::{Context, Result};
use mcpany_inspector::client::ApiClient;
use mcpany_inspector::config::Config;
use mcpany_inspector::pipeline::normalize_detail;

pub async fn run(config: &Config, id: &str, raw: bool) -> Result<()> {
    config.validate()?;
    let client = ApiClient::new(config)?;

    let body = client
        .fetch_event(id)
        .await
        .with_context(|| format!("Failed to fetch event {}", id))?;

    let output = if raw {
        serde_json::to_string_pretty(&body)?
    } else {
        let event = normalize_detail(id, body)
            .with_context(|| format!("Backend returned an unreadable record for {}", id))?;
        serde_json::to_string_pretty(&event)?
    };
    println!("{}", output);

    Ok(())
}
