//! Periodic capability discovery across all configured sources.
//!
//! Each enabled source is polled on its own tokio task until it reports at least one
//! capability. Discovered tools are adapted into [`RemoteTool`]s and handed to every
//! registered [`DiscoveryListener`]. Failures are recorded as per-source state and
//! surfaced to users through [`DiscoveryCoordinator::friendly_unavailable_message`].

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use concierge_core::config::DiscoveryConfig;
use concierge_core::{DiscoveryError, SourceId, Tool};
use concierge_remote::{CapabilitySource, RemoteTool};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::availability::{render_unavailable_message, SourceProfile, UnavailableSource};

/// Receives the full tool list of a source each time it is (re)discovered.
#[async_trait]
pub trait DiscoveryListener: Send + Sync {
    async fn on_capabilities_discovered(
        &self,
        source: &SourceId,
        tools: &[Arc<dyn Tool>],
    ) -> anyhow::Result<()>;
}

pub struct SourceRegistration {
    pub profile: SourceProfile,
    pub enabled: bool,
    pub client: Arc<dyn CapabilitySource>,
}

#[derive(Clone)]
enum SourceStatus {
    Undiscovered,
    Discovered(Vec<Arc<dyn Tool>>),
    Failed(String),
}

impl SourceStatus {
    fn label(&self) -> &'static str {
        match self {
            Self::Undiscovered => "undiscovered",
            Self::Discovered(_) => "discovered",
            Self::Failed(_) => "failed",
        }
    }
}

struct SourceEntry {
    profile: SourceProfile,
    enabled: bool,
    client: Arc<dyn CapabilitySource>,
    status: RwLock<SourceStatus>,
    poll_lock: tokio::sync::Mutex<()>,
}

impl SourceEntry {
    fn new(registration: SourceRegistration) -> Self {
        let status = initial_status(registration.enabled);
        Self {
            profile: registration.profile,
            enabled: registration.enabled,
            client: registration.client,
            status: RwLock::new(status),
            poll_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn status(&self) -> SourceStatus {
        self.status.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set_status(&self, status: SourceStatus) {
        *self.status.write().unwrap_or_else(PoisonError::into_inner) = status;
    }

    fn is_discovered(&self) -> bool {
        matches!(*self.status.read().unwrap_or_else(PoisonError::into_inner), SourceStatus::Discovered(_))
    }

    fn is_available(&self) -> bool {
        if !self.enabled {
            return true;
        }
        match &*self.status.read().unwrap_or_else(PoisonError::into_inner) {
            SourceStatus::Discovered(tools) => !tools.is_empty(),
            SourceStatus::Undiscovered | SourceStatus::Failed(_) => false,
        }
    }

    fn failure_message(&self, error: &DiscoveryError) -> String {
        let label = &self.profile.label;
        let address = self.client.address();
        match error {
            DiscoveryError::Transport(cause) => format!(
                "Unable to connect to {label} at {address}. Error: {cause}. Please ensure the service is running."
            ),
            DiscoveryError::Protocol(cause) => {
                format!("{label} at {address} returned an unusable response: {cause}")
            }
            DiscoveryError::EmptyCapabilitySet => {
                format!("{label} at {address} is running but no capabilities are available.")
            }
        }
    }
}

/// Disabled sources count as satisfied from the start.
fn initial_status(enabled: bool) -> SourceStatus {
    if enabled {
        SourceStatus::Undiscovered
    } else {
        SourceStatus::Discovered(Vec::new())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// Already discovered or disabled; no network call was made.
    Skipped,
    Discovered(usize),
    Empty,
    Failed(String),
    UnknownSource,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollSchedule {
    pub initial_delay: Duration,
    pub interval: Duration,
}

impl PollSchedule {
    pub fn new(initial_delay: Duration, interval: Duration) -> Self {
        Self { initial_delay, interval: interval.max(Duration::from_millis(1)) }
    }

    pub fn from_config(config: &DiscoveryConfig) -> Self {
        Self::new(config.initial_delay(), config.poll_interval())
    }
}

/// Owns the polling tasks. Dropping the handle stops polling.
pub struct DiscoveryHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl DiscoveryHandle {
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn shutdown(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl Drop for DiscoveryHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SourceSnapshot {
    pub id: String,
    pub label: String,
    pub kind: &'static str,
    pub address: String,
    pub enabled: bool,
    pub state: &'static str,
    pub tool_names: Vec<String>,
    pub last_error: Option<String>,
    pub available: bool,
}

pub struct DiscoveryCoordinator {
    sources: Vec<SourceEntry>,
    listeners: RwLock<Vec<Arc<dyn DiscoveryListener>>>,
}

impl DiscoveryCoordinator {
    pub fn new(registrations: Vec<SourceRegistration>) -> Self {
        let sources = registrations.into_iter().map(SourceEntry::new).collect();
        Self { sources, listeners: RwLock::new(Vec::new()) }
    }

    pub fn add_listener(&self, listener: Arc<dyn DiscoveryListener>) {
        self.listeners.write().unwrap_or_else(PoisonError::into_inner).push(listener);
    }

    pub fn source_ids(&self) -> Vec<SourceId> {
        self.sources.iter().map(|entry| entry.profile.id.clone()).collect()
    }

    fn entry(&self, id: &SourceId) -> Option<&SourceEntry> {
        self.sources.iter().find(|entry| &entry.profile.id == id)
    }

    /// Starts one polling task per enabled source.
    pub fn spawn(self: &Arc<Self>, schedule: PollSchedule) -> DiscoveryHandle {
        let tasks = self
            .sources
            .iter()
            .filter(|entry| entry.enabled)
            .map(|entry| {
                let coordinator = Arc::clone(self);
                let id = entry.profile.id.clone();
                tokio::spawn(async move {
                    let start = Instant::now() + schedule.initial_delay;
                    let mut ticker = tokio::time::interval_at(start, schedule.interval);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    loop {
                        ticker.tick().await;
                        coordinator.poll_source(&id).await;
                    }
                })
            })
            .collect::<Vec<_>>();

        info!(
            event_name = "discovery.polling.started",
            task_count = tasks.len(),
            initial_delay_ms = schedule.initial_delay.as_millis() as u64,
            interval_ms = schedule.interval.as_millis() as u64,
            "capability discovery polling started"
        );
        DiscoveryHandle { tasks }
    }

    /// Discovers one source unless it is already satisfied.
    pub async fn poll_source(&self, id: &SourceId) -> PollOutcome {
        let Some(entry) = self.entry(id) else {
            return PollOutcome::UnknownSource;
        };
        if !entry.enabled {
            return PollOutcome::Skipped;
        }

        let _polling = entry.poll_lock.lock().await;
        if entry.is_discovered() {
            debug!(source = %id, "source already discovered; skipping poll");
            return PollOutcome::Skipped;
        }

        match entry.client.discover().await {
            Ok(descriptors) if descriptors.is_empty() => {
                let message = entry.failure_message(&DiscoveryError::EmptyCapabilitySet);
                warn!(
                    event_name = "discovery.source.empty",
                    source = %id,
                    address = entry.client.address(),
                    "source reachable but advertised no capabilities"
                );
                entry.set_status(SourceStatus::Failed(message));
                PollOutcome::Empty
            }
            Ok(descriptors) => {
                let tools: Vec<Arc<dyn Tool>> = descriptors
                    .into_iter()
                    .map(|descriptor| {
                        Arc::new(RemoteTool::adapt(descriptor, Arc::clone(&entry.client)))
                            as Arc<dyn Tool>
                    })
                    .collect();
                let count = tools.len();
                entry.set_status(SourceStatus::Discovered(tools.clone()));
                info!(
                    event_name = "discovery.source.discovered",
                    source = %id,
                    kind = entry.client.kind().as_str(),
                    tool_count = count,
                    tools = ?tools.iter().map(|tool| tool.name()).collect::<Vec<_>>(),
                    "capabilities discovered"
                );
                self.notify(id, &tools).await;
                PollOutcome::Discovered(count)
            }
            Err(error) => {
                let message = entry.failure_message(&error.to_discovery_error());
                warn!(
                    event_name = "discovery.source.failed",
                    source = %id,
                    address = entry.client.address(),
                    error = %error,
                    "capability discovery failed; will retry on next tick"
                );
                entry.set_status(SourceStatus::Failed(message.clone()));
                PollOutcome::Failed(message)
            }
        }
    }

    pub async fn poll_all(&self) -> Vec<(SourceId, PollOutcome)> {
        let mut outcomes = Vec::with_capacity(self.sources.len());
        for entry in &self.sources {
            let outcome = self.poll_source(&entry.profile.id).await;
            outcomes.push((entry.profile.id.clone(), outcome));
        }
        outcomes
    }

    async fn notify(&self, source: &SourceId, tools: &[Arc<dyn Tool>]) {
        let listeners = self.listeners.read().unwrap_or_else(PoisonError::into_inner).clone();
        for listener in listeners {
            if let Err(error) = listener.on_capabilities_discovered(source, tools).await {
                warn!(
                    event_name = "discovery.listener.failed",
                    source = %source,
                    error = %error,
                    "discovery listener failed; continuing"
                );
            }
        }
    }

    /// Every discovered tool, in source registration order.
    pub fn all_tools(&self) -> Vec<Arc<dyn Tool>> {
        self.sources
            .iter()
            .flat_map(|entry| match entry.status() {
                SourceStatus::Discovered(tools) => tools,
                SourceStatus::Undiscovered | SourceStatus::Failed(_) => Vec::new(),
            })
            .collect()
    }

    pub fn is_source_available(&self, id: &SourceId) -> bool {
        self.entry(id).map(SourceEntry::is_available).unwrap_or(false)
    }

    pub fn all_available(&self) -> bool {
        self.sources.iter().all(SourceEntry::is_available)
    }

    /// Explains which of the sources the request needs are down, and where they live.
    pub fn friendly_unavailable_message(&self, intent: &str) -> String {
        let down: Vec<(&SourceEntry, Option<String>)> = self
            .sources
            .iter()
            .filter(|entry| !entry.is_available())
            .map(|entry| {
                let reason = match entry.status() {
                    SourceStatus::Failed(message) => Some(message),
                    SourceStatus::Undiscovered => Some("Discovery has not completed yet.".to_string()),
                    SourceStatus::Discovered(_) => None,
                };
                (entry, reason)
            })
            .collect();

        let unavailable: Vec<UnavailableSource<'_>> = down
            .iter()
            .map(|(entry, reason)| UnavailableSource {
                profile: &entry.profile,
                address: entry.client.address(),
                reason: reason.as_deref(),
            })
            .collect();

        render_unavailable_message(intent, &unavailable)
    }

    pub fn status_report(&self) -> Vec<SourceSnapshot> {
        self.sources
            .iter()
            .map(|entry| {
                let status = entry.status();
                let (tool_names, last_error) = match &status {
                    SourceStatus::Discovered(tools) => {
                        (tools.iter().map(|tool| tool.name().to_string()).collect(), None)
                    }
                    SourceStatus::Failed(message) => (Vec::new(), Some(message.clone())),
                    SourceStatus::Undiscovered => (Vec::new(), None),
                };
                SourceSnapshot {
                    id: entry.profile.id.to_string(),
                    label: entry.profile.label.clone(),
                    kind: entry.client.kind().as_str(),
                    address: entry.client.address().to_string(),
                    enabled: entry.enabled,
                    state: status.label(),
                    tool_names,
                    last_error,
                    available: entry.is_available(),
                }
            })
            .collect()
    }

    /// Forgets everything learned so far. Polling tasks pick sources up again on their next tick.
    pub fn force_rediscovery(&self) {
        for entry in &self.sources {
            entry.client.reset();
            entry.set_status(initial_status(entry.enabled));
        }
        info!(event_name = "discovery.rediscovery.forced", "capability rediscovery forced");
    }
}
