use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use concierge_core::{CapabilityDescriptor, SourceKind};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::jsonrpc::{http_client, join_url, RpcChannel};
use crate::source::CapabilitySource;
use crate::{RemoteError, RemoteResult};

pub const AGENT_CARD_PATH: &str = "/.well-known/agent.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCard {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub provider: Option<CardProvider>,
    #[serde(default)]
    pub skills: Vec<SkillDescriptor>,
    #[serde(default)]
    pub default_input_modes: Vec<String>,
    #[serde(default)]
    pub default_output_modes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardProvider {
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillDescriptor {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub input_schema: Option<Value>,
    #[serde(default)]
    pub output_schema: Option<Value>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl SkillDescriptor {
    fn to_descriptor(&self) -> CapabilityDescriptor {
        let id = self.id.clone().unwrap_or_default();
        let name = self.name.clone().unwrap_or_else(|| id.clone());
        let mut descriptor = CapabilityDescriptor::new(id, SourceKind::Skill)
            .with_name(name)
            .with_description(self.description.clone().unwrap_or_default());
        if let Some(schema) = &self.input_schema {
            descriptor = descriptor.with_input_schema(schema.clone());
        }
        descriptor
    }
}

/// Client for the skill protocol: provider card discovery plus task RPCs.
pub struct SkillProtocolClient {
    base_url: String,
    card_url: String,
    http: reqwest::Client,
    channel: RpcChannel,
    card: RwLock<Option<AgentCard>>,
}

impl SkillProtocolClient {
    pub fn new(base_url: impl Into<String>, rpc_path: &str, timeout: Duration) -> RemoteResult<Self> {
        let base_url = base_url.into();
        let endpoint = join_url(&base_url, rpc_path);
        let http = http_client(timeout, &endpoint)?;
        Ok(Self {
            card_url: join_url(&base_url, AGENT_CARD_PATH),
            channel: RpcChannel::new(http.clone(), endpoint),
            http,
            base_url,
            card: RwLock::new(None),
        })
    }

    pub fn cached_card(&self) -> Option<AgentCard> {
        self.card.read().ok().and_then(|card| card.clone())
    }

    /// Returns the provider card, fetching it only when nothing is cached.
    pub async fn card(&self) -> RemoteResult<AgentCard> {
        if let Some(card) = self.cached_card() {
            return Ok(card);
        }
        self.fetch_card().await
    }

    /// Fetches the provider card and replaces the cache.
    pub async fn fetch_card(&self) -> RemoteResult<AgentCard> {
        let response = self.http.get(&self.card_url).send().await.map_err(|error| {
            RemoteError::Transport { endpoint: self.card_url.clone(), message: error.to_string() }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::HttpStatus {
                endpoint: self.card_url.clone(),
                status: status.as_u16(),
            });
        }

        let card: AgentCard = response.json().await.map_err(|error| RemoteError::Protocol {
            endpoint: self.card_url.clone(),
            message: error.to_string(),
        })?;

        info!(
            event_name = "remote.skill_protocol.card_fetched",
            endpoint = %self.card_url,
            agent = %card.name,
            skills = card.skills.len(),
            "fetched provider card"
        );

        if let Ok(mut cached) = self.card.write() {
            *cached = Some(card.clone());
        }
        Ok(card)
    }

    /// Sends a task to a skill and unwraps the first data artifact.
    pub async fn send_task(&self, skill_id: &str, data: Value) -> RemoteResult<Value> {
        let params = json!({
            "message": {
                "role": "user",
                "parts": [{"type": "data", "data": data, "mimeType": "application/json"}]
            },
            "skillId": skill_id
        });
        let result = self.channel.call("tasks/send", Some(params)).await?;
        let task_id = result.get("id").and_then(Value::as_str).unwrap_or("unknown");
        debug!(
            event_name = "remote.skill_protocol.task_completed",
            endpoint = %self.channel.endpoint(),
            skill_id,
            task_id,
            "skill task returned"
        );
        Ok(unwrap_artifact(result))
    }

    pub async fn get_task(&self, task_id: &str) -> RemoteResult<Value> {
        self.channel.call("tasks/get", Some(json!({ "id": task_id }))).await
    }

    pub async fn cancel_task(&self, task_id: &str) -> RemoteResult<Value> {
        self.channel.call("tasks/cancel", Some(json!({ "id": task_id }))).await
    }
}

/// `result.artifacts[0].parts[0].data` when that part is a data part, else the raw result.
fn unwrap_artifact(result: Value) -> Value {
    let data = result
        .get("artifacts")
        .and_then(Value::as_array)
        .and_then(|artifacts| artifacts.first())
        .and_then(|artifact| artifact.get("parts"))
        .and_then(Value::as_array)
        .and_then(|parts| parts.first())
        .filter(|part| part.get("type").and_then(Value::as_str) == Some("data"))
        .and_then(|part| part.get("data"))
        .cloned();

    data.unwrap_or(result)
}

#[async_trait]
impl CapabilitySource for SkillProtocolClient {
    fn kind(&self) -> SourceKind {
        SourceKind::Skill
    }

    fn address(&self) -> &str {
        &self.base_url
    }

    async fn discover(&self) -> RemoteResult<Vec<CapabilityDescriptor>> {
        let card = self.card().await?;
        Ok(card.skills.iter().map(SkillDescriptor::to_descriptor).collect())
    }

    async fn invoke(&self, capability_id: &str, args: Value) -> RemoteResult<Value> {
        self.send_task(capability_id, args).await
    }

    fn reset(&self) {
        if let Ok(mut cached) = self.card.write() {
            *cached = None;
        }
    }
}
