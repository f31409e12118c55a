//! Live trace pipeline
//!
//! A transport feeds raw records to an ingest task, which normalizes them
//! and commits them to a bounded [`EventStore`]. Search, selection with lazy
//! detail fetches, and a pause gate sit on top. All store mutation goes
//! through the store lock, so commits are serialized; state that can change
//! across an await (pause flag, store contents) is checked again at commit.

mod filter;
mod pause;
mod selection;
mod store;

pub use filter::{filter, SearchQuery};
pub use pause::PauseGate;
pub use selection::{DetailSource, DetailState, DetailView, Selection};
pub use store::{chronological, EventStore, InsertOutcome, StoreOrdering, DEFAULT_CAPACITY};

use crate::client::ApiError;
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::transport::{self, ConnectionStatus, FeedItem, TransportContext, TransportMode};
use mcpany_common::{normalize, normalize_summary, Event, NormalizeError};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, mpsc, watch, Notify, RwLock};
use tokio::task::{AbortHandle, JoinHandle};

/// Depth of the transport -> ingest channel
const FEED_BUFFER: usize = 256;

/// Changes broadcast to render-layer subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineUpdate {
    Ingested { id: String },
    Merged { id: String },
    Evicted { ids: Vec<String> },
    Cleared,
    DetailLoaded { id: String },
    DetailFailed { id: String, error: String },
}

/// Store sizing for a pipeline instance
#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    pub capacity: usize,
    pub ordering: StoreOrdering,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            ordering: StoreOrdering::default(),
        }
    }
}

struct Shared {
    store: RwLock<EventStore>,
    selection: RwLock<Selection>,
    query: RwLock<SearchQuery>,
    pause: PauseGate,
    metrics: Metrics,
    status: Arc<watch::Sender<ConnectionStatus>>,
    visible: watch::Sender<bool>,
    refresh: Arc<Notify>,
    updates: broadcast::Sender<PipelineUpdate>,
    detail_source: Arc<dyn DetailSource>,
    /// In-flight detail fetches by event id
    detail_tasks: Mutex<HashMap<String, AbortHandle>>,
}

/// One inspector pipeline: owns the store, the connection, and the flags
pub struct Pipeline {
    shared: Arc<Shared>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Pipeline {
    pub fn new(options: PipelineOptions, detail_source: Arc<dyn DetailSource>) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);
        let (visible, _) = watch::channel(true);
        let (updates, _) = broadcast::channel(256);

        Self {
            shared: Arc::new(Shared {
                store: RwLock::new(EventStore::new(options.capacity, options.ordering)),
                selection: RwLock::new(Selection::default()),
                query: RwLock::new(SearchQuery::default()),
                pause: PauseGate::new(),
                metrics: Metrics::new(),
                status: Arc::new(status),
                visible,
                refresh: Arc::new(Notify::new()),
                updates,
                detail_source,
                detail_tasks: Mutex::new(HashMap::new()),
            }),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the transport and the ingest task. Restarting replaces the
    /// previous transport.
    pub fn start(&self, mode: TransportMode) {
        self.stop_tasks();

        let (feed_tx, mut feed_rx) = mpsc::channel(FEED_BUFFER);
        let ctx = TransportContext {
            feed: feed_tx,
            status: Arc::clone(&self.shared.status),
            visible: self.shared.visible.subscribe(),
            refresh: Arc::clone(&self.shared.refresh),
        };

        let shared = Arc::clone(&self.shared);
        let ingest = tokio::spawn(async move {
            while let Some(item) = feed_rx.recv().await {
                shared.ingest(item).await;
            }
        });
        let feed = transport::spawn(mode, ctx);

        let mut tasks = lock(&self.tasks);
        tasks.push(feed);
        tasks.push(ingest);
    }

    /// Stop the transport, the ingest task and every in-flight detail fetch
    pub fn dispose(&self) {
        self.stop_tasks();
        let aborted: Vec<String> = lock(&self.shared.detail_tasks)
            .drain()
            .map(|(id, handle)| {
                handle.abort();
                id
            })
            .collect();
        // Best effort; select() refetches anything left marked Loading
        if let Ok(mut selection) = self.shared.selection.try_write() {
            selection.forget(&aborted);
        }
        self.shared.status.send_replace(ConnectionStatus::Disconnected);
    }

    fn stop_tasks(&self) {
        for task in lock(&self.tasks).drain(..) {
            task.abort();
        }
    }

    /// Feed one transport item through normalization into the store
    pub async fn ingest(&self, item: FeedItem) {
        self.shared.ingest(item).await;
    }

    pub async fn clear(&self) {
        self.shared.store.write().await.clear();
        self.shared.selection.write().await.reset();
        tracing::info!("Cleared captured events");
        let _ = self.shared.updates.send(PipelineUpdate::Cleared);
    }

    pub fn set_paused(&self, paused: bool) {
        self.shared.pause.set_paused(paused);
    }

    pub fn toggle_pause(&self) -> bool {
        self.shared.pause.toggle()
    }

    pub fn is_paused(&self) -> bool {
        self.shared.pause.is_paused()
    }

    /// Report whether the view is visible; hidden views defer network activity
    pub fn set_visible(&self, visible: bool) {
        self.shared.visible.send_replace(visible);
    }

    /// Poll or reconnect now, regardless of pause and visibility
    pub fn refresh(&self) {
        tracing::debug!("Manual refresh requested");
        self.shared.refresh.notify_one();
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.shared.status.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.status.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineUpdate> {
        self.shared.updates.subscribe()
    }

    pub async fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot().await
    }

    pub async fn len(&self) -> usize {
        self.shared.store.read().await.len()
    }

    pub async fn capacity(&self) -> usize {
        self.shared.store.read().await.capacity()
    }

    pub async fn get(&self, id: &str) -> Option<Event> {
        self.shared.store.read().await.get(id).cloned()
    }

    /// Every stored event, in store order
    pub async fn snapshot(&self) -> Vec<Event> {
        self.shared.store.read().await.snapshot()
    }

    pub async fn set_query(&self, query: &str) {
        *self.shared.query.write().await = SearchQuery::new(query);
    }

    pub async fn query(&self) -> String {
        self.shared.query.read().await.as_str().to_string()
    }

    /// Stored events matching the current query
    pub async fn visible_events(&self) -> Vec<Event> {
        let query = self.shared.query.read().await.clone();
        let store = self.shared.store.read().await;
        store.iter().filter(|e| query.matches(e)).cloned().collect()
    }

    /// Stored events matching an ad-hoc query, without changing the current one
    pub async fn search(&self, query: &str) -> Vec<Event> {
        let store = self.shared.store.read().await;
        filter(store.iter(), query).into_iter().cloned().collect()
    }

    /// Select an event; summaries trigger a background detail fetch
    pub async fn select(&self, id: &str) {
        let needs_detail = self
            .shared
            .store
            .read()
            .await
            .get(id)
            .is_some_and(|e| e.is_summary);

        let mut selection = self.shared.selection.write().await;
        selection.select(id);
        let in_flight = selection.state(id) == Some(&DetailState::Loading)
            && lock(&self.shared.detail_tasks)
                .get(id)
                .is_some_and(|t| !t.is_finished());
        if needs_detail && !in_flight {
            selection.set_state(id, DetailState::Loading);
            drop(selection);
            self.spawn_detail_fetch(id);
        }
    }

    pub async fn clear_selection(&self) {
        self.shared.selection.write().await.clear();
    }

    pub async fn selected_id(&self) -> Option<String> {
        self.shared
            .selection
            .read()
            .await
            .selected()
            .map(str::to_string)
    }

    pub async fn selected_detail(&self) -> DetailView {
        let store = self.shared.store.read().await;
        self.shared.selection.read().await.resolve(&store)
    }

    fn spawn_detail_fetch(&self, id: &str) {
        tracing::debug!("Fetching detail for {}", id);
        let shared = Arc::clone(&self.shared);
        let id = id.to_string();
        let id_key = id.clone();
        let handle = tokio::spawn(async move {
            let fetched = shared.detail_source.fetch_detail(&id).await;
            shared.complete_detail(&id, fetched).await;
        });

        let mut tasks = lock(&self.shared.detail_tasks);
        tasks.retain(|_, t| !t.is_finished());
        tasks.insert(id_key, handle.abort_handle());
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl Shared {
    async fn ingest(&self, item: FeedItem) {
        let (records, summary, forced) = match item {
            FeedItem::Record(raw) => (vec![raw], false, false),
            FeedItem::Batch {
                records,
                summary,
                forced,
            } => (records, summary, forced),
            FeedItem::Malformed(reason) => {
                tracing::debug!("Transport reported a malformed frame: {}", reason);
                self.metrics.record_malformed().await;
                return;
            }
        };

        if self.pause.is_paused() && !forced {
            self.metrics.record_paused_drop(records.len()).await;
            return;
        }

        let mut events = Vec::with_capacity(records.len());
        for raw in &records {
            let normalized = if summary {
                normalize_summary(raw)
            } else {
                normalize(raw)
            };
            match normalized {
                Ok(event) => events.push(event),
                Err(e) => {
                    tracing::warn!("Dropping malformed record: {}", e);
                    self.metrics.record_malformed().await;
                }
            }
        }

        self.commit(events, forced).await;
    }

    async fn commit(&self, events: Vec<Event>, forced: bool) {
        if events.is_empty() {
            return;
        }
        let events = chronological(events);
        let stats: Vec<(String, Option<f64>, bool)> = events
            .iter()
            .map(|e| (e.id.clone(), e.duration_ms, e.error.is_some()))
            .collect();

        let outcomes = {
            let mut store = self.store.write().await;
            // Pause may have been set while these records were being normalized
            if self.pause.is_paused() && !forced {
                drop(store);
                self.metrics.record_paused_drop(stats.len()).await;
                return;
            }
            events
                .into_iter()
                .map(|e| store.insert(e))
                .collect::<Vec<_>>()
        };

        let mut evicted_ids = Vec::new();
        for ((id, duration_ms, failed), outcome) in stats.into_iter().zip(outcomes) {
            match outcome {
                InsertOutcome::Inserted { evicted } => {
                    self.metrics.record_event(duration_ms, failed).await;
                    evicted_ids.extend(evicted);
                    let _ = self.updates.send(PipelineUpdate::Ingested { id });
                }
                InsertOutcome::Merged => {
                    self.metrics.record_merge().await;
                    let _ = self.updates.send(PipelineUpdate::Merged { id });
                }
            }
        }
        self.note_evictions(evicted_ids).await;
    }

    async fn note_evictions(&self, ids: Vec<String>) {
        if ids.is_empty() {
            return;
        }
        self.metrics.record_evictions(ids.len()).await;
        self.selection.write().await.forget(&ids);
        let _ = self.updates.send(PipelineUpdate::Evicted { ids });
    }

    /// Commit a finished detail fetch. Runs even while paused; keyed only by
    /// its own id, so a selection change in the meantime does not matter.
    async fn complete_detail(&self, id: &str, fetched: Result<Value, ApiError>) {
        let resolved = fetched.map_err(|e| e.to_string()).and_then(|raw| {
            normalize_detail(id, raw).map_err(|e| format!("Malformed detail: {}", e))
        });

        match resolved {
            Ok(event) => {
                let outcome = self.store.write().await.merge(event);
                self.selection
                    .write()
                    .await
                    .set_state(id, DetailState::Loaded);
                if let InsertOutcome::Inserted { evicted } = outcome {
                    self.note_evictions(evicted).await;
                }
                tracing::debug!("Loaded detail for {}", id);
                let _ = self
                    .updates
                    .send(PipelineUpdate::DetailLoaded { id: id.to_string() });
            }
            Err(error) => {
                tracing::warn!("Failed to load detail for {}: {}", id, error);
                self.selection
                    .write()
                    .await
                    .set_state(id, DetailState::Failed(error.clone()));
                let _ = self.updates.send(PipelineUpdate::DetailFailed {
                    id: id.to_string(),
                    error,
                });
            }
        }
    }
}

/// Normalize a detail response for `id` as a full record
pub fn normalize_detail(id: &str, mut raw: Value) -> Result<Event, NormalizeError> {
    if let Value::Object(map) = &mut raw {
        map.entry("id")
            .or_insert_with(|| Value::String(id.to_string()));
    }

    let mut event = normalize(&raw)?;
    if event.id != id {
        tracing::warn!("Detail for {} came back with id {}", id, event.id);
        event.id = id.to_string();
    }
    event.is_summary = false;
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiClient;
    use crate::transport::PollTransport;
    use axum::{extract::Path, routing::get, Json, Router};
    use futures_util::future::BoxFuture;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Detail source that answers with a fixed full record, optionally
    /// waiting for `gate` first
    struct FakeDetail {
        gate: Arc<Notify>,
        gated: bool,
        fail: bool,
        calls: AtomicUsize,
    }

    impl FakeDetail {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                gate: Arc::new(Notify::new()),
                gated: false,
                fail: false,
                calls: AtomicUsize::new(0),
            })
        }

        fn gated() -> Arc<Self> {
            Arc::new(Self {
                gate: Arc::new(Notify::new()),
                gated: true,
                fail: false,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                gate: Arc::new(Notify::new()),
                gated: false,
                fail: true,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl DetailSource for FakeDetail {
        fn fetch_detail<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Value, ApiError>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if self.gated {
                    self.gate.notified().await;
                }
                if self.fail {
                    return Err(ApiError::Status {
                        status: 500,
                        body: "boom".to_string(),
                    });
                }
                Ok(json!({
                    "method": "tools/call",
                    "request": {"city": "London"},
                    "result": {"temp": 14},
                    "id": id
                }))
            })
        }
    }

    fn pipeline(capacity: usize, source: Arc<FakeDetail>) -> Pipeline {
        Pipeline::new(
            PipelineOptions {
                capacity,
                ordering: StoreOrdering::NewestFirst,
            },
            source,
        )
    }

    fn summary(id: &str) -> FeedItem {
        FeedItem::Batch {
            records: vec![json!({"id": id, "method": "tools/call", "timestamp": "2025-06-01T10:00:00Z"})],
            summary: true,
            forced: false,
        }
    }

    fn record(id: &str) -> FeedItem {
        FeedItem::Record(json!({"id": id, "method": "tools/call", "request": {"n": id}}))
    }

    async fn wait_for_update<F>(rx: &mut broadcast::Receiver<PipelineUpdate>, mut pred: F) -> PipelineUpdate
    where
        F: FnMut(&PipelineUpdate) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match rx.recv().await {
                    Ok(update) if pred(&update) => return update,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(e) => panic!("update channel failed: {}", e),
                }
            }
        })
        .await
        .expect("timed out waiting for pipeline update")
    }

    async fn wait_for_calls(source: &FakeDetail, calls: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while source.calls.load(Ordering::SeqCst) < calls {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for detail fetch");
    }

    #[tokio::test]
    async fn test_overflow_eviction() {
        let p = pipeline(500, FakeDetail::new());
        for i in 1..=501 {
            p.ingest(record(&format!("e{}", i))).await;
            assert!(p.len().await <= 500);
        }

        assert_eq!(p.len().await, 500);
        assert!(p.get("e1").await.is_none());
        assert!(p.get("e501").await.is_some());
        assert_eq!(p.metrics().await.evicted, 1);
    }

    #[tokio::test]
    async fn test_malformed_record_is_dropped() {
        let p = pipeline(10, FakeDetail::new());
        p.ingest(record("e1")).await;

        p.ingest(FeedItem::Record(json!({"method": "tools/call"}))).await;
        p.ingest(FeedItem::Malformed("expected value".to_string())).await;

        assert_eq!(p.len().await, 1);
        assert_eq!(p.metrics().await.malformed, 2);
    }

    #[tokio::test]
    async fn test_pause_suppresses_ingestion() {
        let p = pipeline(10, FakeDetail::new());
        p.ingest(record("e1")).await;
        let before = p.snapshot().await;

        p.set_paused(true);
        p.ingest(record("e2")).await;
        p.ingest(summary("e3")).await;

        assert_eq!(p.snapshot().await, before);
        assert_eq!(p.metrics().await.dropped_paused, 2);

        // Clear still works while paused
        p.clear().await;
        assert_eq!(p.len().await, 0);
        assert!(p.is_paused());

        // Dropped, not queued
        p.set_paused(false);
        assert_eq!(p.len().await, 0);
    }

    #[tokio::test]
    async fn test_manual_refresh_bypasses_pause() {
        let p = pipeline(10, FakeDetail::new());
        p.set_paused(true);
        p.ingest(FeedItem::Batch {
            records: vec![json!({"id": "r1", "method": "tools/call"})],
            summary: false,
            forced: true,
        })
        .await;
        assert_eq!(p.len().await, 1);
    }

    #[tokio::test]
    async fn test_same_second_batch_keeps_list_order() {
        let p = pipeline(10, FakeDetail::new());
        // List endpoints answer newest first
        p.ingest(FeedItem::Batch {
            records: vec![
                json!({"id": "b", "method": "tools/call", "timestamp": "2025-06-01T10:00:00Z"}),
                json!({"id": "a", "method": "tools/call", "timestamp": "2025-06-01T10:00:00Z"}),
            ],
            summary: true,
            forced: false,
        })
        .await;

        let ids: Vec<String> = p.snapshot().await.into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_selecting_summary_fetches_detail() {
        let source = FakeDetail::new();
        let p = pipeline(10, source.clone());
        let mut updates = p.subscribe();

        p.ingest(summary("e1")).await;
        assert!(p.get("e1").await.unwrap().is_summary);

        p.select("e1").await;
        wait_for_update(&mut updates, |u| matches!(u, PipelineUpdate::DetailLoaded { .. })).await;

        let stored = p.get("e1").await.unwrap();
        assert!(!stored.is_summary);
        assert_eq!(stored.request, Some(json!({"city": "London"})));
        assert_eq!(stored.result, Some(json!({"temp": 14})));
        assert!(matches!(p.selected_detail().await, DetailView::Ready(_)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        // Later summary for the same id keeps the detail
        p.ingest(summary("e1")).await;
        assert!(!p.get("e1").await.unwrap().is_summary);

        // Full records need no fetch
        p.select("e1").await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reselect_after_dispose_refetches_detail() {
        let source = FakeDetail::gated();
        let p = pipeline(10, source.clone());
        p.ingest(summary("a")).await;

        p.select("a").await;
        wait_for_calls(&source, 1).await;
        p.dispose();
        source.gate.notify_waiters();

        p.select("a").await;
        wait_for_calls(&source, 2).await;
        assert!(matches!(p.selected_detail().await, DetailView::Loading(_)));

        let mut updates = p.subscribe();
        source.gate.notify_one();
        wait_for_update(&mut updates, |u| matches!(u, PipelineUpdate::DetailLoaded { .. })).await;
        assert!(matches!(p.selected_detail().await, DetailView::Ready(_)));
    }

    #[tokio::test]
    async fn test_detail_fetch_failure_keeps_summary() {
        let p = pipeline(10, FakeDetail::failing());
        let mut updates = p.subscribe();
        p.ingest(summary("e1")).await;

        p.select("e1").await;
        wait_for_update(&mut updates, |u| matches!(u, PipelineUpdate::DetailFailed { .. })).await;

        match p.selected_detail().await {
            DetailView::Failed { event, error } => {
                assert!(event.is_summary);
                assert!(error.contains("500"));
            }
            other => panic!("unexpected detail view: {:?}", other),
        }
        assert_eq!(p.selected_id().await.as_deref(), Some("e1"));
    }

    #[tokio::test]
    async fn test_stale_fetch_merges_without_moving_selection() {
        let source = FakeDetail::gated();
        let p = pipeline(10, source.clone());
        let mut updates = p.subscribe();
        p.ingest(summary("a")).await;
        p.ingest(record("b")).await;

        p.select("a").await;
        assert!(matches!(p.selected_detail().await, DetailView::Loading(_)));
        p.select("b").await;

        source.gate.notify_one();
        wait_for_update(&mut updates, |u| matches!(u, PipelineUpdate::DetailLoaded { .. })).await;

        assert!(!p.get("a").await.unwrap().is_summary);
        assert_eq!(p.selected_id().await.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_fetch_after_clear_readds_orphan() {
        let source = FakeDetail::gated();
        let p = pipeline(10, source.clone());
        let mut updates = p.subscribe();
        p.ingest(summary("a")).await;
        p.select("a").await;

        p.clear().await;
        assert_eq!(p.selected_detail().await, DetailView::None);

        source.gate.notify_one();
        wait_for_update(&mut updates, |u| matches!(u, PipelineUpdate::DetailLoaded { .. })).await;

        assert_eq!(p.len().await, 1);
        assert!(!p.get("a").await.unwrap().is_summary);
        assert_eq!(p.selected_id().await, None);
    }

    #[tokio::test]
    async fn test_evicted_selection_is_not_found() {
        let p = pipeline(2, FakeDetail::new());
        p.ingest(record("a")).await;
        p.select("a").await;
        p.ingest(record("b")).await;
        p.ingest(record("c")).await;

        assert_eq!(
            p.selected_detail().await,
            DetailView::NotFound { id: "a".to_string() }
        );
    }

    #[tokio::test]
    async fn test_query_filters_visible_events() {
        let p = pipeline(10, FakeDetail::new());
        p.ingest(FeedItem::Record(
            json!({"id": "e1", "method": "tool.run", "request": {"city": "London"}}),
        ))
        .await;
        p.ingest(record("e2")).await;

        assert_eq!(p.visible_events().await.len(), 2);
        p.set_query("LONDON").await;
        let visible = p.visible_events().await;
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, "e1");
        assert!(p.search("paris").await.is_empty());

        // Queries never touch the store
        assert_eq!(p.len().await, 2);
    }

    #[tokio::test]
    async fn test_polling_pipeline_end_to_end() {
        let app = Router::new()
            .route(
                "/api/v1/traces",
                get(|| async {
                    Json(json!([
                        {"id": "t2", "method": "tools/call", "timestamp": "2025-06-01T10:00:02Z", "status": "success"},
                        {"id": "t1", "method": "tools/list", "timestamp": "2025-06-01T10:00:01Z", "status": "success"}
                    ]))
                }),
            )
            .route(
                "/api/v1/traces/{id}",
                get(|Path(id): Path<String>| async move {
                    Json(json!({
                        "id": id,
                        "timestamp": "2025-06-01T10:00:02Z",
                        "totalDuration": 40,
                        "status": "success",
                        "rootSpan": {"name": "tools/call", "input": {"city": "Paris"}, "output": {"temp": 19}}
                    }))
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        let client = ApiClient::from_parts(
            &format!("http://{}", addr),
            "/api/v1/traces",
            "/api/v1/traces/{id}",
            None,
            Duration::from_secs(5),
        )
        .unwrap();
        let p = Pipeline::new(PipelineOptions::default(), Arc::new(client.clone()));
        let mut updates = p.subscribe();
        let mut status = p.watch_status();

        p.start(TransportMode::Poll(
            PollTransport::new(client, Duration::from_millis(50), 500).with_summary(true),
        ));

        wait_for_update(&mut updates, |u| matches!(u, PipelineUpdate::Ingested { id } if id == "t2")).await;
        tokio::time::timeout(Duration::from_secs(5), status.wait_for(|s| s.is_connected()))
            .await
            .unwrap()
            .unwrap();

        // Newest first, regardless of the order the list came in
        let ids: Vec<String> = p.snapshot().await.into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["t2", "t1"]);

        p.select("t2").await;
        wait_for_update(&mut updates, |u| matches!(u, PipelineUpdate::DetailLoaded { .. })).await;
        let stored = p.get("t2").await.unwrap();
        assert_eq!(stored.request, Some(json!({"city": "Paris"})));

        // Repeated polls merge instead of duplicating, and keep the detail
        wait_for_update(&mut updates, |u| matches!(u, PipelineUpdate::Merged { id } if id == "t2")).await;
        assert_eq!(p.len().await, 2);
        assert!(!p.get("t2").await.unwrap().is_summary);

        p.dispose();
        assert_eq!(p.status(), ConnectionStatus::Disconnected);
        p.dispose();
    }
}
