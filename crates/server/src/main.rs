mod api;
mod bootstrap;
mod health;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use concierge_agent::{NoopExecutionRuntime, PollSchedule};
use concierge_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use concierge_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config, Arc::new(NoopExecutionRuntime)).await?;
    let discovery = app.coordinator.spawn(PollSchedule::from_config(&app.config.discovery));

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        polling_tasks = discovery.task_count(),
        "concierge-server started"
    );

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let serve = axum::serve(listener, api::router(api::AppState::from_application(&app)))
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });
    let mut server = tokio::spawn(async move { serve.await });

    tokio::select! {
        result = &mut server => result??,
        _ = wait_for_shutdown() => {
            let _ = shutdown_tx.send(());
            match tokio::time::timeout(grace, server).await {
                Ok(result) => result??,
                Err(_) => tracing::warn!(
                    event_name = "system.server.shutdown_timeout",
                    correlation_id = "shutdown",
                    grace_secs = grace.as_secs(),
                    "in-flight requests did not drain in time"
                ),
            }
        }
    }

    discovery.shutdown();
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "concierge-server stopping"
    );

    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %error, "failed to listen for shutdown signal");
    }
}
