//! REST client for the MCP Any backend's trace endpoints

use crate::config::Config;
use crate::pipeline::DetailSource;
use futures_util::future::BoxFuture;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Header carrying the gateway API key
const API_KEY_HEADER: &str = "X-API-Key";

/// Keys under which list endpoints wrap their arrays
const LIST_WRAPPER_KEYS: &[&str] = &["traces", "events", "items", "entries", "data"];

/// Errors talking to the backend
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected response: {0}")]
    Decode(String),
}

/// Client for the backend's list, detail and health endpoints
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    list_path: String,
    detail_path: String,
    api_key: Option<String>,
    client: Client,
}

impl ApiClient {
    /// Create a client from the inspector configuration
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        Self::from_parts(
            &config.server_url,
            &config.list_path,
            &config.detail_path,
            config.api_key.clone(),
            Duration::from_millis(config.request_timeout_ms),
        )
    }

    pub fn from_parts(
        base_url: &str,
        list_path: &str,
        detail_path: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            list_path: list_path.to_string(),
            detail_path: detail_path.to_string(),
            api_key,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let request = self.client.get(format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }

    /// Fetch the current event list, newest records first as the backend returns them
    pub async fn list_events(&self, limit: usize, summary: bool) -> Result<Vec<Value>, ApiError> {
        let mut query = vec![("limit", limit.to_string())];
        if summary {
            query.push(("summary", "true".to_string()));
        }

        let response = self.get(&self.list_path).query(&query).send().await?;
        let body: Value = check_status(response).await?.json().await?;
        extract_records(body)
    }

    /// Fetch one event with full request/response detail
    pub async fn fetch_event(&self, id: &str) -> Result<Value, ApiError> {
        let path = self.detail_path.replace("{id}", &urlencoding::encode(id));
        let response = self.get(&path).send().await?;
        let body: Value = check_status(response).await?.json().await?;

        if !body.is_object() {
            return Err(ApiError::Decode(format!(
                "detail for {} is not a JSON object",
                id
            )));
        }
        Ok(body)
    }

    /// Check that the backend is reachable
    pub async fn health(&self) -> Result<(), ApiError> {
        let response = self.get("/healthz").send().await?;
        check_status(response).await?;
        Ok(())
    }
}

impl DetailSource for ApiClient {
    fn fetch_detail<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Value, ApiError>> {
        Box::pin(self.fetch_event(id))
    }
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Accept either a bare array or an object wrapping one
fn extract_records(body: Value) -> Result<Vec<Value>, ApiError> {
    match body {
        Value::Array(records) => Ok(records),
        Value::Object(mut map) => LIST_WRAPPER_KEYS
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(records)) => Some(records),
                _ => None,
            })
            .ok_or_else(|| ApiError::Decode("no event array in response".to_string())),
        Value::Null => Ok(Vec::new()),
        other => Err(ApiError::Decode(format!(
            "expected an array, got {}",
            kind_of(&other)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Path, Query},
        http::{HeaderMap, StatusCode},
        routing::get,
        Json, Router,
    };
    use serde_json::json;
    use std::collections::HashMap;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        format!("http://{}", addr)
    }

    fn client(base: &str, key: Option<&str>) -> ApiClient {
        ApiClient::from_parts(
            base,
            "/api/v1/traces",
            "/api/v1/traces/{id}",
            key.map(str::to_string),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_extract_records_shapes() {
        assert_eq!(extract_records(json!([{"id": 1}])).unwrap().len(), 1);
        assert_eq!(
            extract_records(json!({"traces": [{"id": 1}, {"id": 2}]}))
                .unwrap()
                .len(),
            2
        );
        assert!(extract_records(Value::Null).unwrap().is_empty());
        assert!(matches!(
            extract_records(json!({"count": 3})),
            Err(ApiError::Decode(_))
        ));
        assert!(matches!(
            extract_records(json!("nope")),
            Err(ApiError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_list_events_sends_query_and_key() {
        let app = Router::new().route(
            "/api/v1/traces",
            get(
                |headers: HeaderMap, Query(q): Query<HashMap<String, String>>| async move {
                    let key = headers
                        .get(API_KEY_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    Json(json!({"items": [{
                        "id": "t1",
                        "method": "tools/call",
                        "limit": q.get("limit"),
                        "summary": q.get("summary").map(|s| s == "true"),
                        "key": key
                    }]}))
                },
            ),
        );
        let base = serve(app).await;

        let records = client(&base, Some("secret"))
            .list_events(25, true)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["limit"], "25");
        assert_eq!(records[0]["summary"], true);
        assert_eq!(records[0]["key"], "secret");
    }

    #[tokio::test]
    async fn test_fetch_event_and_errors() {
        let app = Router::new().route(
            "/api/v1/traces/{id}",
            get(|Path(id): Path<String>| async move {
                if id == "missing" {
                    Err((StatusCode::NOT_FOUND, "trace not found"))
                } else {
                    Ok(Json(json!({"id": id, "method": "tools/call"})))
                }
            }),
        );
        let base = serve(app).await;
        let api = client(&base, None);

        let detail = api.fetch_event("t 1").await.unwrap();
        assert_eq!(detail["id"], "t 1");

        // Ids stay a single path segment
        let detail = api.fetch_event("run/42?x=1").await.unwrap();
        assert_eq!(detail["id"], "run/42?x=1");

        match api.fetch_event("missing").await {
            Err(ApiError::Status { status, body }) => {
                assert_eq!(status, 404);
                assert_eq!(body, "trace not found");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let api = client(&format!("http://{}", addr), None);
        assert!(matches!(api.health().await, Err(ApiError::Request(_))));
    }
}
