//! Selected event tracking and detail resolution state

use super::store::EventStore;
use crate::client::ApiError;
use futures_util::future::BoxFuture;
use mcpany_common::Event;
use serde_json::Value;
use std::collections::HashMap;

/// Something that can fetch the full record for an event id
pub trait DetailSource: Send + Sync {
    fn fetch_detail<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Value, ApiError>>;
}

/// Progress of a detail fetch for one id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailState {
    Loading,
    Loaded,
    Failed(String),
}

/// What the detail pane should show
#[derive(Debug, Clone, PartialEq)]
pub enum DetailView {
    /// Nothing selected
    None,
    /// The selected id is no longer in the store
    NotFound { id: String },
    /// Summary shown while full detail is fetched
    Loading(Event),
    Ready(Event),
    /// Detail fetch failed; the summary is still available
    Failed { event: Event, error: String },
}

/// At most one selected id, plus per-id detail fetch state
#[derive(Debug, Default)]
pub struct Selection {
    selected: Option<String>,
    details: HashMap<String, DetailState>,
}

impl Selection {
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn select(&mut self, id: &str) {
        self.selected = Some(id.to_string());
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }

    /// Forget the selection and every detail state
    pub fn reset(&mut self) {
        self.selected = None;
        self.details.clear();
    }

    pub fn state(&self, id: &str) -> Option<&DetailState> {
        self.details.get(id)
    }

    pub fn set_state(&mut self, id: &str, state: DetailState) {
        self.details.insert(id.to_string(), state);
    }

    /// Drop detail states, e.g. for ids that left the store
    pub fn forget(&mut self, ids: &[String]) {
        for id in ids {
            self.details.remove(id);
        }
    }

    /// Resolve the current selection against the store
    pub fn resolve(&self, store: &EventStore) -> DetailView {
        let Some(id) = self.selected.as_deref() else {
            return DetailView::None;
        };
        let Some(event) = store.get(id) else {
            return DetailView::NotFound { id: id.to_string() };
        };

        if !event.is_summary {
            return DetailView::Ready(event.clone());
        }
        match self.details.get(id) {
            Some(DetailState::Failed(error)) => DetailView::Failed {
                event: event.clone(),
                error: error.clone(),
            },
            _ => DetailView::Loading(event.clone()),
        }
    }
}
