//! Normalizer from the backend's wire encodings to [`Event`]
//!
//! Four shapes are accepted:
//!
//! * structured events (`{id, timestamp, method, durationMs, status, request, result, error}`)
//! * traces (`{id, timestamp, totalDuration, status, rootSpan: {name, input, output, errorMessage}}`)
//! * debug entries (`{id, timestamp, method, path, status: 200, duration: <ns>, request_body, response_body}`)
//! * log envelopes (`{id, level, message, source}`) whose `message` holds one of the above as JSON text

use crate::duration::parse_duration_ms;
use crate::{Direction, Event};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

/// Reasons a raw record is dropped
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record is not a JSON object")]
    NotAnObject,

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Log envelope does not carry a JSON record: {0}")]
    Envelope(String),
}

/// Parse a text frame and normalize it
pub fn normalize_frame(text: &str) -> Result<Event, NormalizeError> {
    let raw: Value = serde_json::from_str(text)?;
    normalize(&raw)
}

/// Normalize a record that carries full detail unless it says otherwise
pub fn normalize(raw: &Value) -> Result<Event, NormalizeError> {
    normalize_record(raw, false, true)
}

/// Normalize a record fetched from a list endpoint in summary mode
pub fn normalize_summary(raw: &Value) -> Result<Event, NormalizeError> {
    normalize_record(raw, true, true)
}

fn normalize_record(
    raw: &Value,
    default_summary: bool,
    allow_envelope: bool,
) -> Result<Event, NormalizeError> {
    let obj = raw.as_object().ok_or(NormalizeError::NotAnObject)?;

    if is_log_envelope(obj) {
        if !allow_envelope {
            return Err(NormalizeError::Envelope("nested envelope".to_string()));
        }
        let message = obj.get("message").and_then(Value::as_str).unwrap_or_default();
        let inner: Value = serde_json::from_str(message)
            .map_err(|e| NormalizeError::Envelope(e.to_string()))?;
        let mut event = normalize_record(&inner, default_summary, false)?;
        if event.source.is_none() {
            event.source = string_field(obj, &["source"]);
        }
        return Ok(event);
    }

    let span = obj.get("rootSpan").and_then(Value::as_object);

    let id = id_field(obj).ok_or(NormalizeError::MissingField("id"))?;
    let method = string_field(obj, &["method", "name", "toolName"])
        .or_else(|| span.and_then(|s| string_field(s, &["name"])))
        .ok_or(NormalizeError::MissingField("method"))?;

    let timestamp = timestamp_field(obj.get("timestamp"))
        .or_else(|| span.and_then(|s| timestamp_field(s.get("startTime"))))
        .unwrap_or_else(Utc::now);

    let (failed, http_status) = status_field(obj);
    let mut error = error_field(obj, &["error", "errorMessage"])
        .or_else(|| span.and_then(|s| error_field(s, &["errorMessage", "error"])));
    if failed && error.is_none() {
        error = Some(match http_status {
            Some(code) => format!("HTTP {}", code),
            None => "unknown error".to_string(),
        });
    }

    let request = payload_field(obj, &["request", "input", "params", "arguments"])
        .or_else(|| span.and_then(|s| payload_field(s, &["input"])))
        .or_else(|| body_field(obj, "request_body"));
    let result = payload_field(obj, &["result", "response", "output"])
        .or_else(|| span.and_then(|s| payload_field(s, &["output"])))
        .or_else(|| body_field(obj, "response_body"));

    let is_summary = ["isSummary", "is_summary", "summary"]
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_bool))
        .unwrap_or(default_summary);

    Ok(Event {
        id,
        timestamp,
        method,
        path: string_field(obj, &["path", "target", "url"]),
        direction: obj
            .get("direction")
            .and_then(Value::as_str)
            .and_then(direction_from_str),
        duration_ms: duration_field(obj),
        http_status,
        request,
        result,
        error,
        is_summary,
        source: string_field(obj, &["source"]),
    })
}

fn is_log_envelope(obj: &Map<String, Value>) -> bool {
    obj.get("message").is_some_and(Value::is_string)
        && !obj.contains_key("method")
        && !obj.contains_key("rootSpan")
}

fn id_field(obj: &Map<String, Value>) -> Option<String> {
    match obj.get("id")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn string_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        obj.get(*key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

fn payload_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<Value> {
    keys.iter()
        .find_map(|key| obj.get(*key).filter(|v| !v.is_null()).cloned())
}

/// Captured bodies are strings; keep them structured when they hold JSON
fn body_field(obj: &Map<String, Value>, key: &str) -> Option<Value> {
    let body = obj.get(key)?.as_str()?;
    if body.is_empty() {
        return None;
    }
    Some(serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string())))
}

fn timestamp_field(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value? {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis),
        _ => None,
    }
}

fn duration_field(obj: &Map<String, Value>) -> Option<f64> {
    for key in ["durationMs", "duration_ms", "totalDuration"] {
        match obj.get(key) {
            Some(Value::Number(n)) => return n.as_f64(),
            Some(Value::String(s)) => return parse_duration_ms(s).ok(),
            _ => {}
        }
    }
    match obj.get("duration")? {
        // Go's time.Duration marshals as integer nanoseconds
        Value::Number(n) => n.as_f64().map(|ns| ns / 1_000_000.0),
        Value::String(s) => parse_duration_ms(s).ok(),
        _ => None,
    }
}

/// Returns (failed, http status code)
fn status_field(obj: &Map<String, Value>) -> (bool, Option<u16>) {
    let http_status = ["statusCode", "status"].iter().find_map(|key| {
        obj.get(*key)
            .and_then(Value::as_u64)
            .filter(|code| (100..=599).contains(code))
            .map(|code| code as u16)
    });

    let failed = match obj.get("status") {
        Some(Value::String(s)) => matches!(
            s.to_ascii_lowercase().as_str(),
            "error" | "failed" | "failure"
        ),
        Some(Value::Bool(ok)) => !ok,
        _ => http_status.is_some_and(|code| code >= 400),
    };

    (failed, http_status)
}

fn error_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match obj.get(*key)? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Object(inner) => string_field(inner, &["message", "error"])
            .or_else(|| Some(Value::Object(inner.clone()).to_string())),
        other => Some(other.to_string()),
    })
}

fn direction_from_str(s: &str) -> Option<Direction> {
    match s.to_ascii_lowercase().as_str() {
        "inbound" | "in" | "incoming" => Some(Direction::Inbound),
        "outbound" | "out" | "outgoing" => Some(Direction::Outbound),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EventStatus;
    use serde_json::json;

    #[test]
    fn test_structured_event() {
        let raw = json!({
            "id": "e1",
            "timestamp": "2025-06-01T10:00:00Z",
            "method": "tools/call",
            "direction": "inbound",
            "durationMs": "12.3ms",
            "status": "success",
            "request": {"city": "London"},
            "result": {"temp": 14}
        });

        let ev = normalize(&raw).unwrap();
        assert_eq!(ev.id, "e1");
        assert_eq!(ev.method, "tools/call");
        assert_eq!(ev.direction, Some(Direction::Inbound));
        assert_eq!(ev.duration_ms, Some(12.3));
        assert_eq!(ev.status(), EventStatus::Success);
        assert_eq!(ev.request, Some(json!({"city": "London"})));
        assert!(!ev.is_summary);
        assert_eq!(ev.timestamp.timestamp(), 1748772000);
    }

    #[test]
    fn test_trace_shape() {
        let raw = json!({
            "id": "abc",
            "timestamp": "2025-06-01T10:00:00Z",
            "totalDuration": 85,
            "status": "error",
            "trigger": "user",
            "rootSpan": {
                "id": "abc-0",
                "name": "weather.get_forecast",
                "type": "tool",
                "startTime": 1748772000000i64,
                "endTime": 1748772000085i64,
                "status": "error",
                "input": {"city": "Paris"},
                "errorMessage": "upstream timeout"
            }
        });

        let ev = normalize(&raw).unwrap();
        assert_eq!(ev.method, "weather.get_forecast");
        assert_eq!(ev.duration_ms, Some(85.0));
        assert_eq!(ev.request, Some(json!({"city": "Paris"})));
        assert_eq!(ev.error.as_deref(), Some("upstream timeout"));
        assert_eq!(ev.status(), EventStatus::Error);
    }

    #[test]
    fn test_debug_entry_shape() {
        let raw = json!({
            "id": "d1",
            "timestamp": "2025-06-01T10:00:00.5Z",
            "method": "POST",
            "path": "/mcp",
            "status": 502,
            "duration": 3_500_000,
            "request_body": "{\"jsonrpc\":\"2.0\"}",
            "response_body": "bad gateway"
        });

        let ev = normalize(&raw).unwrap();
        assert_eq!(ev.path.as_deref(), Some("/mcp"));
        assert_eq!(ev.http_status, Some(502));
        assert_eq!(ev.duration_ms, Some(3.5));
        assert_eq!(ev.request, Some(json!({"jsonrpc": "2.0"})));
        assert_eq!(ev.result, Some(json!("bad gateway")));
        assert_eq!(ev.error.as_deref(), Some("HTTP 502"));
    }

    #[test]
    fn test_log_envelope_is_parsed_twice() {
        let inner = json!({"id": "t9", "method": "tools/list", "status": "success"});
        let raw = json!({
            "id": "log-1",
            "level": "INFO",
            "message": inner.to_string(),
            "source": "traffic"
        });

        let ev = normalize(&raw).unwrap();
        assert_eq!(ev.id, "t9");
        assert_eq!(ev.source.as_deref(), Some("traffic"));
    }

    #[test]
    fn test_log_envelope_with_plain_text_is_dropped() {
        let raw = json!({"id": "log-2", "level": "INFO", "message": "server started"});
        assert!(matches!(normalize(&raw), Err(NormalizeError::Envelope(_))));
    }

    #[test]
    fn test_missing_id_is_rejected() {
        let raw = json!({"method": "tools/call"});
        assert!(matches!(
            normalize(&raw),
            Err(NormalizeError::MissingField("id"))
        ));
    }

    #[test]
    fn test_missing_method_is_rejected() {
        let raw = json!({"id": "x", "method": "  "});
        assert!(matches!(
            normalize(&raw),
            Err(NormalizeError::MissingField("method"))
        ));
    }

    #[test]
    fn test_invalid_frame() {
        assert!(matches!(
            normalize_frame("{not json"),
            Err(NormalizeError::Json(_))
        ));
        assert!(matches!(
            normalize_frame("[1, 2]"),
            Err(NormalizeError::NotAnObject)
        ));
    }

    #[test]
    fn test_summary_default_and_override() {
        let raw = json!({"id": 7, "method": "ping"});
        let ev = normalize_summary(&raw).unwrap();
        assert_eq!(ev.id, "7");
        assert!(ev.is_summary);

        let raw = json!({"id": 7, "method": "ping", "isSummary": false});
        assert!(!normalize_summary(&raw).unwrap().is_summary);
    }

    #[test]
    fn test_error_status_without_message() {
        let raw = json!({"id": "x", "method": "call", "status": "error"});
        let ev = normalize(&raw).unwrap();
        assert_eq!(ev.error.as_deref(), Some("unknown error"));

        let raw = json!({"id": "x", "method": "call", "error": {"code": -32000, "message": "denied"}});
        assert_eq!(normalize(&raw).unwrap().error.as_deref(), Some("denied"));
    }

    #[test]
    fn test_epoch_millis_timestamp() {
        let raw = json!({"id": "x", "method": "call", "timestamp": 1748772000000i64});
        assert_eq!(normalize(&raw).unwrap().timestamp.timestamp(), 1748772000);
    }
}
