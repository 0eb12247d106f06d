//! Remote capability clients.
//!
//! Two wire protocols feed the assistant with capabilities:
//!
//! - **Tool protocol** (`tool_protocol`) - JSON-RPC 2.0 over HTTP: `initialize`,
//!   `tools/list`, `tools/call`
//! - **Skill protocol** (`skill_protocol`) - a well-known provider card listing skills,
//!   invoked through JSON-RPC `tasks/send`
//!
//! Both implement [`CapabilitySource`], and [`RemoteTool`] adapts any discovered
//! descriptor into the uniform [`concierge_core::Tool`] seam.
//!
//! ```text
//! CapabilitySource::discover() -> CapabilityDescriptor -> RemoteTool::adapt() -> Tool
//! ```
//!
//! Nothing in this crate panics across the network boundary: every transport,
//! status, decode and JSON-RPC failure surfaces as a [`RemoteError`] value.

mod adapter;
pub mod jsonrpc;
pub mod skill_protocol;
mod source;
pub mod tool_protocol;

pub use adapter::RemoteTool;
pub use skill_protocol::{AgentCard, SkillDescriptor, SkillProtocolClient};
pub use source::CapabilitySource;
pub use tool_protocol::ToolProtocolClient;

use std::sync::Arc;

use concierge_core::{DiscoveryError, SourceConfig, SourceKey, SourceKind};
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("could not reach {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    #[error("unexpected HTTP status {status} from {endpoint}")]
    HttpStatus { endpoint: String, status: u16 },

    #[error("malformed response from {endpoint}: {message}")]
    Protocol { endpoint: String, message: String },

    #[error("remote error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("capability reported failure: {0}")]
    ToolReported(String),
}

impl RemoteError {
    /// Classifies the failure for discovery status bookkeeping.
    pub fn to_discovery_error(&self) -> DiscoveryError {
        match self {
            Self::Transport { .. } | Self::HttpStatus { .. } => {
                DiscoveryError::Transport(self.to_string())
            }
            Self::Protocol { .. } | Self::Rpc { .. } | Self::ToolReported(_) => {
                DiscoveryError::Protocol(self.to_string())
            }
        }
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Builds the client that speaks the wire protocol of a configured source.
pub fn client_for(key: SourceKey, config: &SourceConfig) -> RemoteResult<Arc<dyn CapabilitySource>> {
    let client: Arc<dyn CapabilitySource> = match key.kind() {
        SourceKind::Primary => Arc::new(ToolProtocolClient::new(
            config.base_url.as_str(),
            &config.rpc_path,
            config.timeout(),
        )?),
        SourceKind::Skill => Arc::new(SkillProtocolClient::new(
            config.base_url.as_str(),
            &config.rpc_path,
            config.timeout(),
        )?),
    };
    Ok(client)
}
