use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use concierge_agent::SourceSnapshot;
use serde::Serialize;

use crate::api::AppState;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AgentCheck {
    pub status: &'static str,
    pub version: Option<u64>,
    pub tool_count: usize,
    pub tools: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub sources: Vec<SourceSnapshot>,
    pub agent: AgentCheck,
    pub checked_at: String,
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let ready = state.coordinator.all_available();
    let agent = match state.orchestrator.current_definition() {
        Some(definition) => AgentCheck {
            status: "ready",
            version: Some(definition.version),
            tool_count: definition.tools.len(),
            tools: definition.tool_names(),
        },
        None => AgentCheck { status: "initializing", version: None, tool_count: 0, tools: Vec::new() },
    };

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        sources: state.coordinator.status_report(),
        agent,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}
