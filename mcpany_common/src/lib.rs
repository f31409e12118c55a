//! MCP Any Common - Event model shared by the trace inspector
//!
//! This crate contains the canonical [`Event`] type and the normalizer that
//! turns the backend's various wire encodings into it. Nothing here performs
//! I/O; the inspector crate owns transport and storage.

mod duration;
mod normalize;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use duration::{parse_duration_ms, DurationParseError};
pub use normalize::{normalize, normalize_frame, normalize_summary, NormalizeError};

/// Direction of the traced call relative to the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Outcome of a traced call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Success,
    Error,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Success => "success",
            EventStatus::Error => "error",
        }
    }
}

/// One captured request/response trace record.
///
/// Instances are built by [`normalize`]; external JSON never becomes an
/// `Event` any other way. `error`, when present, is never empty, so
/// [`Event::status`] can be derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub is_summary: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Event {
    /// Derived status; an event is an error exactly when it carries an error message
    pub fn status(&self) -> EventStatus {
        if self.error.is_some() {
            EventStatus::Error
        } else {
            EventStatus::Success
        }
    }

    /// `method` plus `path` when the path adds information
    pub fn target(&self) -> String {
        match &self.path {
            Some(path) if path != &self.method => format!("{} {}", self.method, path),
            _ => self.method.clone(),
        }
    }

    /// Merge a newer record for the same id into this one.
    ///
    /// Non-detail fields are last-write-wins (an absent optional field keeps
    /// the current value). `request`/`result` are only replaced by a full
    /// record, or filled in when both sides are still summaries. A summary
    /// never turns a full record back into a summary.
    pub fn absorb(&mut self, incoming: Event) {
        debug_assert_eq!(self.id, incoming.id);

        let Event {
            id: _,
            timestamp,
            method,
            path,
            direction,
            duration_ms,
            http_status,
            request,
            result,
            error,
            is_summary,
            source,
        } = incoming;

        self.timestamp = timestamp;
        self.method = method;
        self.error = error;
        if path.is_some() {
            self.path = path;
        }
        if direction.is_some() {
            self.direction = direction;
        }
        if duration_ms.is_some() {
            self.duration_ms = duration_ms;
        }
        if http_status.is_some() {
            self.http_status = http_status;
        }
        if source.is_some() {
            self.source = source;
        }

        if !is_summary {
            self.request = request;
            self.result = result;
        } else if self.is_summary {
            if request.is_some() {
                self.request = request;
            }
            if result.is_some() {
                self.result = result;
            }
        }

        self.is_summary = self.is_summary && is_summary;
    }
}
