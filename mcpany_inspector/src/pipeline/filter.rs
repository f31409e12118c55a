//! Free-text search over captured events

use mcpany_common::Event;

/// A lowered, trimmed search needle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    raw: String,
    needle: String,
}

impl SearchQuery {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let needle = raw.trim().to_lowercase();
        Self { raw, needle }
    }

    /// The query as typed
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.needle.is_empty()
    }

    /// Case-insensitive match against method, path and the serialized event
    pub fn matches(&self, event: &Event) -> bool {
        if self.needle.is_empty() {
            return true;
        }

        if event.method.to_lowercase().contains(&self.needle) {
            return true;
        }
        if let Some(path) = &event.path {
            if path.to_lowercase().contains(&self.needle) {
                return true;
            }
        }

        // Payload values can be buried anywhere in request/result/error
        match serde_json::to_string(event) {
            Ok(serialized) => serialized.to_lowercase().contains(&self.needle),
            Err(_) => false,
        }
    }
}

/// Ordered subsequence of `events` matching `query`. A blank query keeps everything.
pub fn filter<'a, I>(events: I, query: &str) -> Vec<&'a Event>
where
    I: IntoIterator<Item = &'a Event>,
{
    let query = SearchQuery::new(query);
    events.into_iter().filter(|e| query.matches(e)).collect()
}
