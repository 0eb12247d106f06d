use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use concierge_core::{CapabilityDescriptor, SourceKind};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::jsonrpc::{http_client, join_url, RpcChannel};
use crate::source::CapabilitySource;
use crate::{RemoteError, RemoteResult};

pub const PROTOCOL_VERSION: &str = "2024-11-05";
const CLIENT_NAME: &str = "hotel-concierge";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct InitializeParams {
    protocol_version: &'static str,
    capabilities: Value,
    client_info: ClientInfo,
}

#[derive(Debug, Clone, Serialize)]
struct ClientInfo {
    name: &'static str,
    version: &'static str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolDefinition {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    input_schema: Option<Value>,
}

/// Client for the JSON-RPC tool protocol.
pub struct ToolProtocolClient {
    base_url: String,
    channel: RpcChannel,
    initialized: AtomicBool,
}

impl ToolProtocolClient {
    pub fn new(base_url: impl Into<String>, rpc_path: &str, timeout: Duration) -> RemoteResult<Self> {
        let base_url = base_url.into();
        let endpoint = join_url(&base_url, rpc_path);
        let http = http_client(timeout, &endpoint)?;
        Ok(Self { base_url, channel: RpcChannel::new(http, endpoint), initialized: AtomicBool::new(false) })
    }

    pub fn endpoint(&self) -> &str {
        self.channel.endpoint()
    }

    /// Protocol handshake. The result carries nothing the client depends on.
    pub async fn initialize(&self) -> RemoteResult<Value> {
        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION,
            capabilities: json!({}),
            client_info: ClientInfo { name: CLIENT_NAME, version: env!("CARGO_PKG_VERSION") },
        };
        let params = serde_json::to_value(params).map_err(|error| RemoteError::Protocol {
            endpoint: self.endpoint().to_string(),
            message: error.to_string(),
        })?;

        let result = self.channel.call("initialize", Some(params)).await?;
        self.initialized.store(true, Ordering::Release);
        info!(
            event_name = "remote.tool_protocol.initialized",
            endpoint = %self.endpoint(),
            "tool protocol handshake complete"
        );
        Ok(result)
    }

    pub async fn list_tools(&self) -> RemoteResult<Vec<CapabilityDescriptor>> {
        let result = self.channel.call("tools/list", None).await?;
        let tools = match result.get("tools") {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::Array(tools)) => tools,
            Some(_) => {
                return Err(RemoteError::Protocol {
                    endpoint: self.endpoint().to_string(),
                    message: "`tools` is not an array".to_string(),
                })
            }
        };

        let mut descriptors = Vec::with_capacity(tools.len());
        for entry in tools {
            let definition = match serde_json::from_value::<ToolDefinition>(entry.clone()) {
                Ok(definition) => definition,
                Err(error) => {
                    warn!(
                        event_name = "remote.tool_protocol.tool_skipped",
                        endpoint = %self.endpoint(),
                        error = %error,
                        "skipping malformed tool definition"
                    );
                    continue;
                }
            };

            let id = definition.name.unwrap_or_default();
            let mut descriptor = CapabilityDescriptor::new(id, SourceKind::Primary)
                .with_description(definition.description.unwrap_or_default());
            if let Some(schema) = definition.input_schema {
                descriptor = descriptor.with_input_schema(schema);
            }
            descriptors.push(descriptor);
        }

        debug!(
            event_name = "remote.tool_protocol.listed",
            endpoint = %self.endpoint(),
            count = descriptors.len(),
            "listed tools"
        );
        Ok(descriptors)
    }

    /// Invokes a tool and unwraps its first content item.
    ///
    /// Text content holding a JSON object is parsed; any other text is returned
    /// as `{"text": ...}`. A result flagged `isError` becomes
    /// [`RemoteError::ToolReported`].
    pub async fn call_tool(&self, name: &str, arguments: Value) -> RemoteResult<Value> {
        let params = json!({ "name": name, "arguments": arguments });
        let result = self.channel.call("tools/call", Some(params)).await?;
        let first = result.get("content").and_then(Value::as_array).and_then(|items| items.first());

        if result.get("isError").and_then(Value::as_bool).unwrap_or(false) {
            let message = first
                .and_then(|item| item.get("text"))
                .and_then(Value::as_str)
                .unwrap_or("tool reported an error");
            return Err(RemoteError::ToolReported(message.to_string()));
        }

        match first {
            Some(item) => Ok(unwrap_content_item(item)),
            None => Ok(result),
        }
    }
}

fn unwrap_content_item(item: &Value) -> Value {
    if item.get("type").and_then(Value::as_str) != Some("text") {
        return item.clone();
    }

    let text = item.get("text").and_then(Value::as_str).unwrap_or_default();
    match serde_json::from_str::<Value>(text) {
        Ok(parsed @ Value::Object(_)) => parsed,
        _ => json!({ "text": text }),
    }
}

#[async_trait]
impl CapabilitySource for ToolProtocolClient {
    fn kind(&self) -> SourceKind {
        SourceKind::Primary
    }

    fn address(&self) -> &str {
        &self.base_url
    }

    async fn discover(&self) -> RemoteResult<Vec<CapabilityDescriptor>> {
        if !self.initialized.load(Ordering::Acquire) {
            if let Err(error) = self.initialize().await {
                warn!(
                    event_name = "remote.tool_protocol.initialize_failed",
                    endpoint = %self.endpoint(),
                    error = %error,
                    "tool protocol handshake failed; listing tools anyway"
                );
            }
        }
        self.list_tools().await
    }

    async fn invoke(&self, capability_id: &str, args: Value) -> RemoteResult<Value> {
        self.call_tool(capability_id, args).await
    }

    fn reset(&self) {
        self.initialized.store(false, Ordering::Release);
    }
}
