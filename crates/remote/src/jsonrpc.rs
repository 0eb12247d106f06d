use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{RemoteError, RemoteResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: &str, params: Option<Value>) -> Self {
        Self { jsonrpc: "2.0".into(), id, method: method.into(), params }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Builds the shared HTTP client for one source.
pub(crate) fn http_client(timeout: Duration, endpoint: &str) -> RemoteResult<reqwest::Client> {
    reqwest::Client::builder().timeout(timeout).build().map_err(|error| RemoteError::Transport {
        endpoint: endpoint.to_string(),
        message: error.to_string(),
    })
}

/// JSON-RPC 2.0 over HTTP POST to a single endpoint, with monotonically increasing ids.
pub struct RpcChannel {
    http: reqwest::Client,
    endpoint: String,
    next_id: AtomicU64,
}

impl RpcChannel {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self { http, endpoint: endpoint.into(), next_id: AtomicU64::new(1) }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Sends one request and returns its `result` (JSON `null` when absent).
    pub async fn call(&self, method: &str, params: Option<Value>) -> RemoteResult<Value> {
        let request = JsonRpcRequest::new(self.next_id(), method, params);
        debug!(
            event_name = "remote.rpc.request",
            endpoint = %self.endpoint,
            method,
            request_id = request.id,
            "sending json-rpc request"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|error| self.transport_error(error))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::HttpStatus {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }

        let body: JsonRpcResponse = response.json().await.map_err(|error| RemoteError::Protocol {
            endpoint: self.endpoint.clone(),
            message: error.to_string(),
        })?;

        if let Some(error) = body.error {
            return Err(RemoteError::Rpc { code: error.code, message: error.message });
        }

        Ok(body.result.unwrap_or(Value::Null))
    }

    fn transport_error(&self, error: reqwest::Error) -> RemoteError {
        RemoteError::Transport { endpoint: self.endpoint.clone(), message: error.to_string() }
    }
}

/// Joins a base URL and an absolute path without doubling the slash.
pub(crate) fn join_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}
