//! Agent orchestration for the hotel concierge.
//!
//! This crate turns discovered remote capabilities into a conversational agent:
//! - **Discovery** (`discovery`) - polls capability sources and tracks their availability
//! - **Definition** (`definition`) - immutable agent snapshots with composed instructions
//! - **Orchestration** (`orchestrator`) - rebuilds the definition on discovery and drives turns
//! - **Turn state** (`turn`) - classifies runtime output into shown, captured or dropped
//! - **Fallback** (`fallback`) - renders tool results the model did not narrate
//!
//! # Architecture
//!
//! ```text
//! CapabilitySource -> DiscoveryCoordinator -> DiscoveryListener -> AgentOrchestrator
//!                                                                      |
//!                              UiMessage sink <- TurnState <- ExecutionRuntime events
//! ```
//!
//! The execution runtime is a collaborator behind [`runtime::ExecutionRuntime`]. The
//! orchestrator never calls tools itself; it only observes what the runtime reports.

pub mod availability;
pub mod definition;
pub mod discovery;
pub mod fallback;
pub mod orchestrator;
pub mod runtime;
pub mod sessions;
pub mod tools;
pub mod turn;

pub use definition::{AgentDefinition, AgentProfile};
pub use discovery::{
    DiscoveryCoordinator, DiscoveryHandle, DiscoveryListener, PollOutcome, PollSchedule,
    SourceRegistration, SourceSnapshot,
};
pub use orchestrator::{AgentOrchestrator, TurnOutcome};
pub use runtime::{
    EventPart, EventStream, ExecutionRuntime, NoopExecutionRuntime, RunRequest, RuntimeError,
    RuntimeEvent,
};
pub use sessions::{SessionStore, SharedSession};
pub use tools::ToolSet;
