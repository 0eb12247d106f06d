use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::definition::AgentDefinition;

/// One conversational run against the current agent definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunRequest {
    pub app_name: String,
    pub user_id: String,
    /// Fresh per turn. Conversation memory lives in the session store, not the runtime.
    pub session_id: String,
    pub utterance: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum EventPart {
    ExecutableCode { language: String, code: String },
    CodeExecutionResult { outcome: String, output: String },
    FunctionCall { name: String, args: Value },
    FunctionResponse { name: String, response: Value },
    Text(String),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RuntimeEvent {
    pub parts: Vec<EventPart>,
    /// Last event of the run. Anything the runtime sends afterwards is ignored.
    pub is_final: bool,
}

impl RuntimeEvent {
    pub fn from_parts(parts: Vec<EventPart>) -> Self {
        Self { parts, is_final: false }
    }

    pub fn into_final(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::from_parts(vec![EventPart::Text(content.into())])
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("agent definition rejected: {0}")]
    Prepare(String),
    #[error("run could not start: {0}")]
    Start(String),
    #[error("event stream failed: {0}")]
    Stream(String),
}

pub type EventStream = mpsc::Receiver<Result<RuntimeEvent, RuntimeError>>;

/// Model-backed executor for agent runs. Tool calls happen inside the runtime;
/// the orchestrator only observes the resulting event stream.
#[async_trait]
pub trait ExecutionRuntime: Send + Sync {
    async fn prepare_agent(&self, definition: &AgentDefinition) -> Result<(), RuntimeError>;

    async fn start(
        &self,
        definition: Arc<AgentDefinition>,
        request: RunRequest,
    ) -> Result<EventStream, RuntimeError>;
}

/// Accepts every definition and refuses to run.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopExecutionRuntime;

#[async_trait]
impl ExecutionRuntime for NoopExecutionRuntime {
    async fn prepare_agent(&self, _definition: &AgentDefinition) -> Result<(), RuntimeError> {
        Ok(())
    }

    async fn start(
        &self,
        _definition: Arc<AgentDefinition>,
        _request: RunRequest,
    ) -> Result<EventStream, RuntimeError> {
        Err(RuntimeError::Start("no execution runtime is configured".to_string()))
    }
}
