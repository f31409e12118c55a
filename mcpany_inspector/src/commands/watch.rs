//! Watch command - stream live traffic into the terminal

use crate::tui::{self, HeaderInfo};
use anyhow::Result;
use console::style;
use mcpany_common::{Event, EventStatus};
use mcpany_inspector::client::ApiClient;
use mcpany_inspector::config::{Config, TransportKind};
use mcpany_inspector::pipeline::{Pipeline, PipelineOptions, PipelineUpdate, SearchQuery};
use mcpany_inspector::transport::{ConnectionStatus, PollTransport, TransportMode, WsTransport};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// Options for the watch command
pub struct WatchOptions {
    pub ws: Option<String>,
    /// `Some("")` means poll the configured server
    pub poll: Option<String>,
    pub plain: bool,
    pub query: Option<String>,
}

pub async fn run(mut config: Config, opts: WatchOptions) -> Result<()> {
    if let Some(url) = opts.poll.as_deref() {
        config.transport = TransportKind::Poll;
        if !url.is_empty() {
            config.server_url = url.to_string();
        }
    }
    if opts.ws.is_some() {
        config.transport = TransportKind::Websocket;
    }
    config.validate()?;

    let client = ApiClient::new(&config)?;
    let (mode, endpoint) = transport_mode(&config, &client, opts.ws.clone());

    let pipeline = Pipeline::new(
        PipelineOptions {
            capacity: config.capacity,
            ordering: config.ordering,
        },
        Arc::new(client.clone()),
    );
    if let Some(query) = opts.query.as_deref() {
        pipeline.set_query(query).await;
    }
    pipeline.start(mode);

    let result = if opts.plain {
        if let Err(e) = client.health().await {
            tracing::warn!("Backend health check failed: {}", e);
        }
        run_plain(&pipeline, &endpoint).await
    } else {
        let info = HeaderInfo {
            endpoint,
            transport: match config.transport {
                TransportKind::Websocket => "websocket",
                TransportKind::Poll => "poll",
            },
            capacity: config.capacity,
            version: env!("CARGO_PKG_VERSION").to_string(),
        };
        tui::run(&pipeline, info).await
    };

    pipeline.dispose();
    result
}

fn transport_mode(
    config: &Config,
    client: &ApiClient,
    ws_override: Option<String>,
) -> (TransportMode, String) {
    match config.transport {
        TransportKind::Websocket => {
            let url = ws_override.unwrap_or_else(|| config.websocket_url());
            let transport = WsTransport::new(url.clone())
                .with_api_key(config.api_key.clone())
                .with_backoff(config.backoff())
                .with_source_filter(config.source_filter.clone());
            (TransportMode::WebSocket(transport), url)
        }
        TransportKind::Poll => {
            let transport =
                PollTransport::new(client.clone(), config.poll_interval(), config.capacity)
                    .with_summary(config.summary_list);
            let url = format!("{}{}", client.base_url(), config.list_path);
            (TransportMode::Poll(transport), url)
        }
    }
}

/// Print one line per new event until Ctrl+C
async fn run_plain(pipeline: &Pipeline, endpoint: &str) -> Result<()> {
    println!(
        "{} {}",
        style(" mcpany ").on_cyan().black(),
        style(format!("Watching {}", endpoint)).dim()
    );

    let query = SearchQuery::new(pipeline.query().await);
    let mut updates = pipeline.subscribe();
    let mut status = pipeline.watch_status();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,

            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *status.borrow_and_update();
                println!("  {} {}", style("◆").dim(), status_styled(current));
            }

            update = updates.recv() => match update {
                Ok(PipelineUpdate::Ingested { id }) => {
                    if let Some(event) = pipeline.get(&id).await {
                        if query.matches(&event) {
                            print_event(&event);
                        }
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Output fell behind, skipped {} updates", skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    Ok(())
}

fn status_styled(status: ConnectionStatus) -> console::StyledObject<&'static str> {
    let text = status.as_str();
    match status {
        ConnectionStatus::Connected => style(text).green(),
        ConnectionStatus::Connecting | ConnectionStatus::Reconnecting => style(text).yellow(),
        ConnectionStatus::Suspended => style(text).dim(),
        ConnectionStatus::Disconnected => style(text).red(),
    }
}

/// Pretty print an event line
fn print_event(event: &Event) {
    let timestamp = style(event.timestamp.format("%H:%M:%S").to_string()).dim();

    let arrow = match event.direction {
        Some(direction) => direction.as_str(),
        None => "",
    };
    let direction_styled = style(format!("{:>8}", arrow)).magenta();

    let target_styled = style(truncate(&event.target(), 60)).white().bold();

    let status_styled = match event.status() {
        EventStatus::Success => style(format!("{:>7}", event.status().as_str())).green(),
        EventStatus::Error => style(format!("{:>7}", event.status().as_str())).red().bold(),
    };

    let duration_styled = match event.duration_ms {
        Some(ms) if ms > 1000.0 => style(format!("{:>9.1}ms", ms)).red(),
        Some(ms) if ms > 500.0 => style(format!("{:>9.1}ms", ms)).yellow(),
        Some(ms) => style(format!("{:>9.1}ms", ms)).green(),
        None => style(format!("{:>11}", "-")).dim(),
    };

    println!(
        "  {} {} {} {} {}",
        timestamp, direction_styled, status_styled, duration_styled, target_styled,
    );
    if let Some(error) = &event.error {
        println!("           {}", style(truncate(error, 100)).red());
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        s.to_string()
    }
}
