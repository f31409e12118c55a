//! Bounded event storage for the inspector

use mcpany_common::Event;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of events kept in memory
pub const DEFAULT_CAPACITY: usize = 500;

/// Where new events go, and therefore which end is evicted on overflow
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreOrdering {
    /// Index 0 is the most recent event; overflow drops the tail
    #[default]
    NewestFirst,
    /// Index 0 is the oldest event; overflow drops the head
    OldestFirst,
}

/// Result of inserting one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new record was added; ids of any records evicted to make room
    Inserted { evicted: Vec<String> },
    /// An existing record with the same id was updated in place
    Merged,
}

/// Capacity-limited, id-unique collection of events
#[derive(Debug, Clone)]
pub struct EventStore {
    events: VecDeque<Event>,
    capacity: usize,
    ordering: StoreOrdering,
}

impl EventStore {
    pub fn new(capacity: usize, ordering: StoreOrdering) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            ordering,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ordering(&self) -> StoreOrdering {
        self.ordering
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Add an event, merging into an existing record with the same id
    pub fn insert(&mut self, event: Event) -> InsertOutcome {
        if let Some(existing) = self.events.iter_mut().find(|e| e.id == event.id) {
            existing.absorb(event);
            return InsertOutcome::Merged;
        }

        match self.ordering {
            StoreOrdering::NewestFirst => self.events.push_front(event),
            StoreOrdering::OldestFirst => self.events.push_back(event),
        }

        let mut evicted = Vec::new();
        while self.events.len() > self.capacity {
            let dropped = match self.ordering {
                StoreOrdering::NewestFirst => self.events.pop_back(),
                StoreOrdering::OldestFirst => self.events.pop_front(),
            };
            if let Some(dropped) = dropped {
                evicted.push(dropped.id);
            }
        }

        InsertOutcome::Inserted { evicted }
    }

    /// Insert one list response, given in the backend's newest-first order.
    ///
    /// Records go in oldest first (see [`chronological`]), so the most recent
    /// one ends up in the most-recent position. Outcomes follow that order.
    pub fn insert_batch(&mut self, events: Vec<Event>) -> Vec<InsertOutcome> {
        chronological(events)
            .into_iter()
            .map(|e| self.insert(e))
            .collect()
    }

    /// Upgrade a record in place with fetched detail.
    ///
    /// If the id is no longer present (evicted or cleared) the event is
    /// re-added as a new record.
    pub fn merge(&mut self, event: Event) -> InsertOutcome {
        self.insert(event)
    }

    pub fn get(&self, id: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Owned copy of the current contents, in store order
    pub fn snapshot(&self) -> Vec<Event> {
        self.events.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

/// Reorder a newest-first list oldest first.
///
/// Timestamps only have second resolution, so records sharing one keep
/// their relative list order reversed rather than their arrival order.
pub fn chronological(mut events: Vec<Event>) -> Vec<Event> {
    events.reverse();
    events.sort_by_key(|e| e.timestamp);
    events
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, StoreOrdering::default())
    }
}
