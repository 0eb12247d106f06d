use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use concierge_agent::{AgentOrchestrator, DiscoveryCoordinator, SessionStore, SourceSnapshot};
use concierge_core::{ApplicationError, InterfaceError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::bootstrap::Application;
use crate::health;

const SINK_CAPACITY: usize = 32;
const DEFAULT_USER_ID: &str = "anonymous";

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<DiscoveryCoordinator>,
    pub orchestrator: Arc<AgentOrchestrator>,
    pub sessions: Arc<SessionStore>,
    pub default_app_id: String,
}

impl AppState {
    pub fn from_application(app: &Application) -> Self {
        Self {
            coordinator: Arc::clone(&app.coordinator),
            orchestrator: Arc::clone(&app.orchestrator),
            sessions: Arc::clone(&app.sessions),
            default_app_id: app.config.agent.app_name.clone(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/chat", post(chat))
        .route("/api/discovery/refresh", post(refresh_discovery))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub session_id: String,
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    pub content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub status: &'static str,
    pub messages: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub correlation_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub error: String,
    pub correlation_id: String,
}

impl From<InterfaceError> for ApiError {
    fn from(error: InterfaceError) -> Self {
        Self { error: error.user_message().to_string(), correlation_id: error.correlation_id().to_string() }
    }
}

fn interface_status(error: &InterfaceError) -> StatusCode {
    match error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(error: ApplicationError, correlation_id: &str) -> (StatusCode, Json<ApiError>) {
    let interface = error.into_interface(correlation_id);
    (interface_status(&interface), Json(ApiError::from(interface)))
}

async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> Result<(StatusCode, Json<ChatResponse>), (StatusCode, Json<ApiError>)> {
    let correlation_id = uuid::Uuid::new_v4().to_string();
    let session_id = body.session_id.trim();
    let content = body.content.trim().to_string();
    if session_id.is_empty() || content.is_empty() {
        return Err(reject(
            ApplicationError::InvalidRequest("sessionId and content are required".to_string()),
            &correlation_id,
        ));
    }

    let app_id = body.app_id.as_deref().unwrap_or(&state.default_app_id);
    let user_id = body.user_id.as_deref().unwrap_or(DEFAULT_USER_ID);
    let session = state.sessions.get_or_create(session_id, app_id, user_id);

    let (tx, mut rx) = mpsc::channel(SINK_CAPACITY);
    let orchestrator = Arc::clone(&state.orchestrator);
    let turn = tokio::spawn(async move { orchestrator.process_turn(&session, &content, &tx).await });

    let mut messages = Vec::new();
    while let Some(message) = rx.recv().await {
        messages.push(message.to_value());
    }

    match turn.await {
        Ok(Ok(outcome)) => {
            info!(
                event_name = "api.chat.completed",
                correlation_id = %correlation_id,
                session_id = %session_id,
                outcome = outcome.as_str(),
                "chat turn completed"
            );
            Ok((
                StatusCode::OK,
                Json(ChatResponse { status: outcome.as_str(), messages, error: None, correlation_id }),
            ))
        }
        Ok(Err(turn_error)) => {
            let interface = ApplicationError::from(turn_error).into_interface(correlation_id.as_str());
            warn!(
                event_name = "api.chat.failed",
                correlation_id = %correlation_id,
                session_id = %session_id,
                error = %interface,
                "chat turn failed"
            );
            Ok((
                interface_status(&interface),
                Json(ChatResponse {
                    status: "failed",
                    messages,
                    error: Some(interface.user_message().to_string()),
                    correlation_id,
                }),
            ))
        }
        Err(join_error) => {
            warn!(
                event_name = "api.chat.aborted",
                correlation_id = %correlation_id,
                error = %join_error,
                "chat turn task aborted"
            );
            Err(reject(ApplicationError::Configuration(join_error.to_string()), &correlation_id))
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub status: &'static str,
    pub sources: Vec<SourceSnapshot>,
}

async fn refresh_discovery(State(state): State<AppState>) -> (StatusCode, Json<RefreshResponse>) {
    state.coordinator.force_rediscovery();
    let coordinator = Arc::clone(&state.coordinator);
    tokio::spawn(async move {
        coordinator.poll_all().await;
    });

    (
        StatusCode::ACCEPTED,
        Json(RefreshResponse { status: "rediscovering", sources: state.coordinator.status_report() }),
    )
}
