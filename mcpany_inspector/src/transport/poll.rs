//! Interval polling of the backend's event list

use super::{ConnectionStatus, FeedItem, TransportContext};
use crate::client::ApiClient;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Polling feed settings
#[derive(Clone)]
pub struct PollTransport {
    pub client: ApiClient,
    pub interval: Duration,
    /// `limit` sent with each list request
    pub limit: usize,
    /// Ask for lightweight records
    pub summary: bool,
}

impl PollTransport {
    pub fn new(client: ApiClient, interval: Duration, limit: usize) -> Self {
        Self {
            client,
            interval,
            limit,
            summary: false,
        }
    }

    pub fn with_summary(mut self, summary: bool) -> Self {
        self.summary = summary;
        self
    }
}

/// Poll until the pipeline goes away.
///
/// A failed request keeps the previous view and simply waits for the next
/// tick. Ticks are skipped while the view is hidden; becoming visible or a
/// manual refresh polls immediately.
pub async fn run_polling(cfg: PollTransport, ctx: TransportContext) {
    let mut interval = tokio::time::interval(cfg.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut visible = ctx.visible.clone();
    visible.borrow_and_update();

    ctx.set_status(ConnectionStatus::Connecting);

    loop {
        let forced = tokio::select! {
            _ = interval.tick() => false,
            _ = ctx.refresh.notified() => true,
            changed = visible.changed() => {
                if changed.is_err() {
                    return;
                }
                if !*visible.borrow_and_update() {
                    ctx.set_status(ConnectionStatus::Suspended);
                    tracing::debug!("Feed hidden, pausing polls");
                    continue;
                }
                interval.reset();
                false
            }
        };

        if !forced && !ctx.is_visible() {
            ctx.set_status(ConnectionStatus::Suspended);
            continue;
        }

        match cfg.client.list_events(cfg.limit, cfg.summary).await {
            Ok(records) => {
                ctx.set_status(ConnectionStatus::Connected);
                let item = FeedItem::Batch {
                    records,
                    summary: cfg.summary,
                    forced,
                };
                if ctx.feed.send(item).await.is_err() {
                    return;
                }
            }
            Err(e) => {
                tracing::debug!("Poll of {} failed: {}", cfg.client.base_url(), e);
                ctx.set_status(ConnectionStatus::Disconnected);
            }
        }
    }
}
