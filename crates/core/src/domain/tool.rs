use async_trait::async_trait;
use serde_json::Value;

use crate::domain::declaration::FunctionDeclaration;
use crate::errors::ToolError;

/// A uniformly invocable capability, independent of the protocol behind it.
///
/// `declaration` returns `None` when the advertised schema could not be mapped;
/// such tools stay invocable but are not offered to the execution runtime.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn declaration(&self) -> Option<&FunctionDeclaration>;
    async fn invoke(&self, params: Value) -> Result<Value, ToolError>;
}
