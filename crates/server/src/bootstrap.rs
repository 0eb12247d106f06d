use std::sync::Arc;

use concierge_agent::availability::SourceProfile;
use concierge_agent::{
    AgentOrchestrator, AgentProfile, DiscoveryCoordinator, ExecutionRuntime, SessionStore,
    SourceRegistration,
};
use concierge_core::config::AppConfig;
use concierge_remote::{client_for, RemoteError};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub coordinator: Arc<DiscoveryCoordinator>,
    pub orchestrator: Arc<AgentOrchestrator>,
    pub sessions: Arc<SessionStore>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("client for source `{source_id}` could not be built: {error}")]
    Client { source_id: &'static str, error: RemoteError },
}

pub async fn bootstrap_with_config(
    config: AppConfig,
    runtime: Arc<dyn ExecutionRuntime>,
) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let coordinator = Arc::new(DiscoveryCoordinator::new(registrations(&config)?));
    let orchestrator = AgentOrchestrator::new(
        Arc::clone(&coordinator),
        runtime,
        AgentProfile::from_config(&config.agent),
    );
    orchestrator.attach().await;

    info!(
        event_name = "system.bootstrap.sources_registered",
        correlation_id = "bootstrap",
        sources = ?coordinator.source_ids().iter().map(ToString::to_string).collect::<Vec<_>>(),
        "capability sources registered"
    );

    Ok(Application { config, coordinator, orchestrator, sessions: Arc::new(SessionStore::new()) })
}

fn registrations(config: &AppConfig) -> Result<Vec<SourceRegistration>, BootstrapError> {
    config
        .sources
        .iter()
        .map(|(key, source)| {
            let client = client_for(key, source)
                .map_err(|error| BootstrapError::Client { source_id: key.as_str(), error })?;
            Ok(SourceRegistration {
                profile: SourceProfile::for_key(key),
                enabled: source.enabled,
                client,
            })
        })
        .collect()
}
