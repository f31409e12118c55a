//! Traffic metrics for the inspector
//!
//! Tracks ingestion counters, arrival rates (sliding windows), and duration percentiles.

use serde::Serialize;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Durations kept for percentile calculation
const DURATION_HISTORY: usize = 1000;

/// Metrics tracker with sliding window support
pub struct Metrics {
    inner: RwLock<MetricsInner>,
}

#[derive(Default)]
struct MetricsInner {
    ingested: u64,
    merged: u64,
    evicted: u64,
    malformed: u64,
    dropped_paused: u64,
    errors: u64,

    /// Arrival timestamps for rate calculation (keep last 15 minutes)
    arrivals: VecDeque<Instant>,

    durations: VecDeque<f64>,
}

/// Snapshot of current metrics
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub ingested: u64,
    pub merged: u64,
    pub evicted: u64,
    pub malformed: u64,
    pub dropped_paused: u64,
    pub errors: u64,
    pub events_per_minute_1m: f64,
    pub events_per_minute_5m: f64,
    pub events_per_minute_15m: f64,
    pub p50_duration_ms: f64,
    pub p90_duration_ms: f64,
    pub p95_duration_ms: f64,
    pub p99_duration_ms: f64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MetricsInner {
                arrivals: VecDeque::with_capacity(10000),
                durations: VecDeque::with_capacity(DURATION_HISTORY),
                ..Default::default()
            }),
        }
    }

    /// Record a newly stored event
    pub async fn record_event(&self, duration_ms: Option<f64>, failed: bool) {
        let mut inner = self.inner.write().await;
        let now = Instant::now();
        inner.ingested += 1;
        if failed {
            inner.errors += 1;
        }
        inner.arrivals.push_back(now);

        // Keep only last 15 minutes of arrivals
        if let Some(cutoff) = now.checked_sub(Duration::from_secs(15 * 60)) {
            while let Some(front) = inner.arrivals.front() {
                if *front < cutoff {
                    inner.arrivals.pop_front();
                } else {
                    break;
                }
            }
        }

        if let Some(ms) = duration_ms {
            inner.durations.push_back(ms);
            if inner.durations.len() > DURATION_HISTORY {
                inner.durations.pop_front();
            }
        }
    }

    pub async fn record_merge(&self) {
        self.inner.write().await.merged += 1;
    }

    pub async fn record_evictions(&self, count: usize) {
        self.inner.write().await.evicted += count as u64;
    }

    pub async fn record_malformed(&self) {
        self.inner.write().await.malformed += 1;
    }

    pub async fn record_paused_drop(&self, count: usize) {
        self.inner.write().await.dropped_paused += count as u64;
    }

    /// Get current metrics snapshot
    pub async fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.read().await;
        let now = Instant::now();

        let count_in_window = |minutes: u64| -> usize {
            match now.checked_sub(Duration::from_secs(minutes * 60)) {
                Some(cutoff) => inner.arrivals.iter().filter(|t| **t >= cutoff).count(),
                None => inner.arrivals.len(),
            }
        };

        let mut sorted: Vec<f64> = inner.durations.iter().copied().collect();
        sorted.sort_by(f64::total_cmp);

        let percentile = |p: f64| -> f64 {
            if sorted.is_empty() {
                return 0.0;
            }
            let idx = ((p / 100.0) * sorted.len() as f64) as usize;
            sorted[idx.min(sorted.len() - 1)]
        };

        MetricsSnapshot {
            ingested: inner.ingested,
            merged: inner.merged,
            evicted: inner.evicted,
            malformed: inner.malformed,
            dropped_paused: inner.dropped_paused,
            errors: inner.errors,
            events_per_minute_1m: count_in_window(1) as f64,
            events_per_minute_5m: count_in_window(5) as f64 / 5.0,
            events_per_minute_15m: count_in_window(15) as f64 / 15.0,
            p50_duration_ms: percentile(50.0),
            p90_duration_ms: percentile(90.0),
            p95_duration_ms: percentile(95.0),
            p99_duration_ms: percentile(99.0),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
