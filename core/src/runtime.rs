use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::BackendSettings;
use crate::error::BackendError;

/// Wire shape of a dispatch call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub option: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_term: Option<String>,
}

/// One row of the service's own option menu.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteOption {
    pub id: u32,
    pub name: String,
}

/// The remote-execution boundary.
///
/// Implementations must return only once the whole call has finished; nested
/// or paginated lookups are the implementation's concern.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    async fn execute(&self, request: &ExecutionRequest) -> Result<Value, BackendError>;
}

/// Talks to the numeric-option service over HTTP.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(settings: &BackendSettings) -> Result<Self, BackendError> {
        Self::with_timeout(&settings.base_url, settings.timeout)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string() })
    }

    /// Fetches the service's option menu.
    pub async fn options(&self) -> Result<Vec<RemoteOption>, BackendError> {
        let url = format!("{}/options", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }
        response.json().await.map_err(|e| BackendError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ExecutionBackend for HttpBackend {
    async fn execute(&self, request: &ExecutionRequest) -> Result<Value, BackendError> {
        let url = format!("{}/interact", self.base_url);
        debug!(option = request.option, %url, "dispatching to backend");

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| BackendError::Transport(e.to_string()))?;

        if status != StatusCode::OK {
            warn!(option = request.option, status = status.as_u16(), "backend rejected call");
            return Err(BackendError::Status {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }

        let payload: Value =
            serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))?;
        if let Some(message) = reported_error(&payload) {
            return Err(BackendError::Reported(message));
        }
        Ok(payload)
    }
}

// Prefers the service's `{"error": ..}` body, then raw text, then the status line.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        if let Some(Value::String(message)) = map.get("error") {
            return message.clone();
        }
    }
    let text = body.trim();
    if text.is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_string()
    } else {
        text.chars().take(200).collect()
    }
}

// An object whose only key is `error` is a failure even under a 200.
fn reported_error(payload: &Value) -> Option<String> {
    let map = payload.as_object()?;
    if map.len() != 1 {
        return None;
    }
    map.get("error").map(|e| match e {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

/// Admits one call at a time into the wrapped backend.
pub struct Exclusive<B> {
    inner: B,
    gate: Mutex<()>,
}

impl<B> Exclusive<B> {
    pub fn new(inner: B) -> Self {
        Self { inner, gate: Mutex::new(()) }
    }
}

#[async_trait]
impl<B: ExecutionBackend> ExecutionBackend for Exclusive<B> {
    async fn execute(&self, request: &ExecutionRequest) -> Result<Value, BackendError> {
        let _held = self.gate.lock().await;
        self.inner.execute(request).await
    }
}
