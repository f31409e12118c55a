//! Pause/resume gate for ingestion

use std::sync::atomic::{AtomicBool, Ordering};

/// While paused, incoming records are dropped rather than queued
#[derive(Debug, Default)]
pub struct PauseGate {
    paused: AtomicBool,
}

impl PauseGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_paused(&self, paused: bool) {
        let was = self.paused.swap(paused, Ordering::SeqCst);
        if was != paused {
            tracing::debug!(paused, "Ingestion gate toggled");
        }
    }

    /// Flip the gate and return the new state
    pub fn toggle(&self) -> bool {
        let paused = !self.paused.fetch_xor(true, Ordering::SeqCst);
        tracing::debug!(paused, "Ingestion gate toggled");
        paused
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}
