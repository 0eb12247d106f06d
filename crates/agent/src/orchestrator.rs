use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use async_trait::async_trait;
use concierge_core::{ApplicationError, SourceId, Tool, TurnError};
use concierge_ui::{StatusLevel, UiBuilder, UiMessage};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::definition::{AgentDefinition, AgentProfile};
use crate::discovery::{DiscoveryCoordinator, DiscoveryListener};
use crate::fallback::synthesize;
use crate::runtime::{ExecutionRuntime, RunRequest, RuntimeError};
use crate::sessions::SharedSession;
use crate::tools::ToolSet;
use crate::turn::{TurnCompletion, TurnState};

const INITIALIZING_MESSAGE: &str = "**Agent Initialization In Progress**\n\n\
The AI agent is still being initialized. Please wait a moment and try again.\n\n\
This usually happens when the system is starting up.";

const START_FAILED_MESSAGE: &str = "I apologize, but I encountered an error starting the agent.";

const NO_RESPONSE_MESSAGE: &str = "I apologize, but the assistant did not generate a response. \
Please check the server logs for more details.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    SourcesUnavailable,
    Initializing,
    Narrated,
    ToolRendered,
    FallbackRendered,
    NoResponse,
}

impl TurnOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SourcesUnavailable => "sources_unavailable",
            Self::Initializing => "initializing",
            Self::Narrated => "narrated",
            Self::ToolRendered => "tool_rendered",
            Self::FallbackRendered => "fallback_rendered",
            Self::NoResponse => "no_response",
        }
    }
}

/// Keeps the agent definition in step with discovery and drives turns against it.
pub struct AgentOrchestrator {
    coordinator: Arc<DiscoveryCoordinator>,
    runtime: Arc<dyn ExecutionRuntime>,
    profile: AgentProfile,
    current: RwLock<Option<Arc<AgentDefinition>>>,
    rebuild_lock: tokio::sync::Mutex<()>,
    version: AtomicU64,
}

impl AgentOrchestrator {
    pub fn new(
        coordinator: Arc<DiscoveryCoordinator>,
        runtime: Arc<dyn ExecutionRuntime>,
        profile: AgentProfile,
    ) -> Arc<Self> {
        Arc::new(Self {
            coordinator,
            runtime,
            profile,
            current: RwLock::new(None),
            rebuild_lock: tokio::sync::Mutex::new(()),
            version: AtomicU64::new(0),
        })
    }

    /// Subscribes to discovery and builds the first (possibly tool-less) definition.
    pub async fn attach(self: &Arc<Self>) {
        self.coordinator
            .add_listener(Arc::new(RebuildOnDiscovery { orchestrator: Arc::downgrade(self) }));
        if let Err(error) = self.rebuild().await {
            warn!(error = %error, "initial agent definition could not be prepared");
        }
    }

    pub fn coordinator(&self) -> &Arc<DiscoveryCoordinator> {
        &self.coordinator
    }

    pub fn current_definition(&self) -> Option<Arc<AgentDefinition>> {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Builds a fresh definition from every discovered tool and swaps it in.
    /// A definition the runtime rejects never replaces the current one.
    pub async fn rebuild(&self) -> Result<Arc<AgentDefinition>, RuntimeError> {
        let _rebuilding = self.rebuild_lock.lock().await;

        let mut tools = ToolSet::new();
        for tool in self.coordinator.all_tools() {
            if tool.declaration().is_none() {
                warn!(tool = tool.name(), "tool has no usable declaration; not offered to the agent");
                continue;
            }
            if let Err(duplicate) = tools.register(tool) {
                warn!(error = %duplicate, "duplicate tool name; keeping the first registration");
            }
        }

        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        let definition = AgentDefinition::build(version, &self.profile, tools);
        if let Err(error) = self.runtime.prepare_agent(&definition).await {
            warn!(
                event_name = "orchestrator.rebuild.failed",
                version,
                error = %error,
                "agent definition rejected; keeping previous definition"
            );
            return Err(error);
        }

        let definition = Arc::new(definition);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&definition));
        info!(
            event_name = "orchestrator.rebuild.completed",
            version,
            tool_count = definition.tools.len(),
            tools = ?definition.tool_names(),
            "agent definition swapped"
        );
        Ok(definition)
    }

    /// Runs one turn. UI output goes to `sink`; the return value reports how the turn ended.
    pub async fn process_turn(
        &self,
        session: &SharedSession,
        user_text: &str,
        sink: &mpsc::Sender<UiMessage>,
    ) -> Result<TurnOutcome, TurnError> {
        let mut session = session.lock().await;
        let session_id = session.session_id.clone();

        if !self.coordinator.all_available() {
            warn!(
                event_name = "orchestrator.turn.sources_unavailable",
                session_id = %session_id,
                "capability sources unavailable; answering with status"
            );
            let message = self.coordinator.friendly_unavailable_message(user_text);
            emit(sink, UiMessage::text(message)).await;
            return Ok(TurnOutcome::SourcesUnavailable);
        }

        let Some(definition) = self.current_definition() else {
            emit(sink, UiMessage::text(INITIALIZING_MESSAGE)).await;
            return Ok(TurnOutcome::Initializing);
        };

        session.push_user(user_text);
        let request = RunRequest {
            app_name: session.app_id.clone(),
            user_id: session.user_id.clone(),
            session_id: uuid::Uuid::new_v4().to_string(),
            utterance: user_text.to_string(),
        };
        let run_id = request.session_id.clone();
        let mut state = TurnState::new(user_text, definition.tool_names());
        info!(
            event_name = "orchestrator.turn.started",
            session_id = %session_id,
            run_id = %run_id,
            definition_version = definition.version,
            json_requested = state.json_requested(),
            "turn started"
        );

        let mut events = match self.runtime.start(Arc::clone(&definition), request).await {
            Ok(events) => events,
            Err(error) => {
                state.fail();
                warn!(
                    event_name = "orchestrator.turn.start_failed",
                    session_id = %session_id,
                    run_id = %run_id,
                    error = %error,
                    "execution runtime failed to start"
                );
                emit(sink, status_message(START_FAILED_MESSAGE)).await;
                return Err(TurnError::RuntimeStart(error.to_string()));
            }
        };

        while let Some(event) = events.recv().await {
            match event {
                Ok(event) => {
                    let is_final = event.is_final;
                    for part in event.parts {
                        if let Some(message) = state.observe(part) {
                            emit(sink, message).await;
                        }
                    }
                    if is_final {
                        break;
                    }
                }
                Err(error) => {
                    state.fail();
                    let failure = TurnError::RuntimeStream(error.to_string());
                    let interface =
                        ApplicationError::from(failure.clone()).into_interface(run_id.as_str());
                    warn!(
                        event_name = "orchestrator.turn.stream_failed",
                        session_id = %session_id,
                        correlation_id = interface.correlation_id(),
                        error = %error,
                        "execution runtime stream failed"
                    );
                    emit(sink, status_message(interface.user_message())).await;
                    return Err(failure);
                }
            }
        }

        let outcome = match state.complete() {
            TurnCompletion::Narrated(text) => {
                session.push_agent(text);
                TurnOutcome::Narrated
            }
            TurnCompletion::AlreadyRendered => TurnOutcome::ToolRendered,
            TurnCompletion::Fallback(result) => {
                warn!(
                    session_id = %session_id,
                    tool = %result.name,
                    "runtime produced no text; rendering tool result directly"
                );
                emit(sink, UiMessage::Rendered(synthesize(&result.name, &result.payload))).await;
                TurnOutcome::FallbackRendered
            }
            TurnCompletion::NoResponse => {
                warn!(session_id = %session_id, "turn completed without any response");
                emit(sink, status_message(NO_RESPONSE_MESSAGE)).await;
                TurnOutcome::NoResponse
            }
        };

        info!(
            event_name = "orchestrator.turn.completed",
            session_id = %session_id,
            run_id = %run_id,
            outcome = outcome.as_str(),
            "turn completed"
        );
        Ok(outcome)
    }
}

fn status_message(message: &str) -> UiMessage {
    UiMessage::Rendered(UiBuilder::new().status(message, StatusLevel::Error).build())
}

async fn emit(sink: &mpsc::Sender<UiMessage>, message: UiMessage) {
    if sink.send(message).await.is_err() {
        debug!("ui receiver dropped; discarding message");
    }
}

struct RebuildOnDiscovery {
    orchestrator: Weak<AgentOrchestrator>,
}

#[async_trait]
impl DiscoveryListener for RebuildOnDiscovery {
    async fn on_capabilities_discovered(
        &self,
        source: &SourceId,
        tools: &[Arc<dyn Tool>],
    ) -> anyhow::Result<()> {
        let Some(orchestrator) = self.orchestrator.upgrade() else {
            return Ok(());
        };
        debug!(source = %source, tool_count = tools.len(), "rebuilding agent after discovery");
        orchestrator.rebuild().await?;
        Ok(())
    }
}
