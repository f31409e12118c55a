//! Live feed transports: a reconnecting WebSocket or an interval poller
//!
//! Both produce [`FeedItem`]s on an mpsc channel for the pipeline's ingest
//! task and publish [`ConnectionStatus`] over a watch channel.

mod backoff;
mod poll;
mod ws;

pub use backoff::Backoff;
pub use poll::{run_polling, PollTransport};
pub use ws::{run_websocket, WsTransport};

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;

/// Connection state shown to the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Reconnecting,
    Disconnected,
    /// Network activity deferred while the view is not visible
    Suspended,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Reconnecting => "reconnecting",
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Suspended => "suspended",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

/// Raw output of a transport
#[derive(Debug, Clone)]
pub enum FeedItem {
    /// One record pushed by the live socket
    Record(Value),
    /// One poll response
    Batch {
        records: Vec<Value>,
        /// Records were requested in summary mode
        summary: bool,
        /// Produced by a manual refresh; bypasses the pause gate
        forced: bool,
    },
    /// A frame that was not valid JSON
    Malformed(String),
}

/// Which transport to run
#[derive(Clone)]
pub enum TransportMode {
    WebSocket(WsTransport),
    Poll(PollTransport),
}

/// Channels shared between a transport task and the pipeline
#[derive(Clone)]
pub struct TransportContext {
    pub feed: mpsc::Sender<FeedItem>,
    pub status: Arc<watch::Sender<ConnectionStatus>>,
    pub visible: watch::Receiver<bool>,
    pub refresh: Arc<Notify>,
}

impl TransportContext {
    pub fn set_status(&self, status: ConnectionStatus) {
        let previous = self.status.send_replace(status);
        if previous != status {
            tracing::debug!("Feed status: {} -> {}", previous.as_str(), status.as_str());
        }
    }

    pub fn is_visible(&self) -> bool {
        *self.visible.borrow()
    }
}

/// Spawn the transport loop for `mode`
pub fn spawn(mode: TransportMode, ctx: TransportContext) -> JoinHandle<()> {
    match mode {
        TransportMode::WebSocket(cfg) => tokio::spawn(run_websocket(cfg, ctx)),
        TransportMode::Poll(cfg) => tokio::spawn(run_polling(cfg, ctx)),
    }
}
