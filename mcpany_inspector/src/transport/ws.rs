//! Reconnecting WebSocket feed

use super::{Backoff, ConnectionStatus, FeedItem, TransportContext};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, client::IntoClientRequest, http::HeaderValue, Message},
    MaybeTlsStream, WebSocketStream,
};

type FeedSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket feed settings
#[derive(Debug, Clone)]
pub struct WsTransport {
    pub url: String,
    pub api_key: Option<String>,
    pub backoff: Backoff,
    /// Frames whose `source` differs are ignored
    pub source_filter: Option<String>,
}

impl WsTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: None,
            backoff: Backoff::default(),
            source_filter: None,
        }
    }

    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_source_filter(mut self, source: Option<String>) -> Self {
        self.source_filter = source;
        self
    }

    async fn connect(&self) -> Result<FeedSocket, tungstenite::Error> {
        let mut request = self.url.as_str().into_client_request()?;
        if let Some(key) = &self.api_key {
            let value = HeaderValue::from_str(key)
                .map_err(|e| tungstenite::Error::HttpFormat(e.into()))?;
            request.headers_mut().insert("X-API-Key", value);
        }
        let (stream, _) = connect_async(request).await?;
        Ok(stream)
    }
}

/// Why a connected session ended
enum SessionEnd {
    /// Server closed or the socket failed; reconnect after backoff
    Dropped,
    /// View went hidden; reconnect as soon as it is visible again
    Hidden,
    /// Manual refresh; reconnect now, even while hidden
    Refresh,
    /// The pipeline stopped listening
    Shutdown,
}

/// Run the socket loop until the pipeline goes away.
///
/// Retries are unlimited; each failed or closed connection waits
/// `backoff.delay(attempt)` unless a manual refresh cuts the wait short.
/// A refresh also connects while the view is hidden.
pub async fn run_websocket(cfg: WsTransport, ctx: TransportContext) {
    let mut visible = ctx.visible.clone();
    let mut attempt: u32 = 0;
    let mut forced = false;

    loop {
        let shown = *visible.borrow_and_update();
        if !shown && !forced {
            ctx.set_status(ConnectionStatus::Suspended);
            tracing::debug!("Feed hidden, deferring connection");
            tokio::select! {
                alive = async { visible.wait_for(|v| *v).await.is_ok() } => {
                    if !alive {
                        return;
                    }
                }
                _ = ctx.refresh.notified() => {
                    tracing::debug!("Manual refresh while hidden, connecting");
                }
            }
        }
        forced = false;

        ctx.set_status(if attempt == 0 {
            ConnectionStatus::Connecting
        } else {
            ConnectionStatus::Reconnecting
        });

        match cfg.connect().await {
            Ok(socket) => {
                tracing::info!("Connected to event feed at {}", cfg.url);
                attempt = 0;
                ctx.set_status(ConnectionStatus::Connected);

                match pump(socket, &cfg, &ctx, &mut visible).await {
                    SessionEnd::Dropped => {}
                    SessionEnd::Hidden => continue,
                    SessionEnd::Refresh => {
                        forced = true;
                        continue;
                    }
                    SessionEnd::Shutdown => {
                        ctx.set_status(ConnectionStatus::Disconnected);
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Failed to connect to event feed at {}: {}", cfg.url, e);
            }
        }

        ctx.set_status(ConnectionStatus::Disconnected);
        let delay = cfg.backoff.delay(attempt);
        attempt = attempt.saturating_add(1);
        tracing::debug!("Reconnecting in {:?} (attempt {})", delay, attempt);

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = ctx.refresh.notified() => {
                tracing::debug!("Manual refresh, reconnecting now");
                forced = true;
            }
        }
    }
}

async fn pump(
    socket: FeedSocket,
    cfg: &WsTransport,
    ctx: &TransportContext,
    visible: &mut tokio::sync::watch::Receiver<bool>,
) -> SessionEnd {
    let (mut write, mut read) = socket.split();

    loop {
        tokio::select! {
            msg = read.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text.as_str().to_string(),
                    Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                        Ok(text) => text,
                        Err(_) => {
                            tracing::warn!("Dropping non-UTF-8 binary frame ({} bytes)", data.len());
                            continue;
                        }
                    },
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!("Event feed closed by server: {:?}", frame);
                        return SessionEnd::Dropped;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::warn!("Event feed error: {}", e);
                        return SessionEnd::Dropped;
                    }
                    None => {
                        tracing::info!("Event feed ended");
                        return SessionEnd::Dropped;
                    }
                };

                if !forward_text(&text, cfg, ctx).await {
                    let _ = write.send(Message::Close(None)).await;
                    return SessionEnd::Shutdown;
                }
            }
            _ = ctx.refresh.notified() => {
                tracing::info!("Manual refresh, reopening event feed");
                let _ = write.send(Message::Close(None)).await;
                return SessionEnd::Refresh;
            }
            changed = visible.changed() => {
                let hidden = changed.is_err() || !*visible.borrow_and_update();
                if hidden {
                    let _ = write.send(Message::Close(None)).await;
                    return if changed.is_err() {
                        SessionEnd::Shutdown
                    } else {
                        SessionEnd::Hidden
                    };
                }
            }
        }
    }
}

/// Returns false once the pipeline has stopped receiving
async fn forward_text(text: &str, cfg: &WsTransport, ctx: &TransportContext) -> bool {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Dropping malformed feed frame: {}", e);
            return ctx.feed.send(FeedItem::Malformed(e.to_string())).await.is_ok();
        }
    };

    let records = match value {
        Value::Array(items) => items,
        single => vec![single],
    };

    for record in records {
        if !source_matches(&record, cfg.source_filter.as_deref()) {
            tracing::trace!("Ignoring frame from another source");
            continue;
        }
        if ctx.feed.send(FeedItem::Record(record)).await.is_err() {
            return false;
        }
    }
    true
}

fn source_matches(record: &Value, filter: Option<&str>) -> bool {
    match filter {
        None => true,
        Some(want) => record.get("source").and_then(Value::as_str) == Some(want),
    }
}
