use async_trait::async_trait;
use concierge_core::{CapabilityDescriptor, SourceKind};
use serde_json::Value;

use crate::RemoteResult;

/// A remote endpoint that advertises capabilities and executes them.
#[async_trait]
pub trait CapabilitySource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Configured base address, shown to users when the source is unavailable.
    fn address(&self) -> &str;

    async fn discover(&self) -> RemoteResult<Vec<CapabilityDescriptor>>;

    async fn invoke(&self, capability_id: &str, args: Value) -> RemoteResult<Value>;

    /// Drops any cached discovery state so the next `discover` goes to the wire.
    fn reset(&self) {}
}
