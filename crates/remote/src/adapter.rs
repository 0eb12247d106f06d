use std::sync::Arc;

use async_trait::async_trait;
use concierge_core::{
    map_declaration, tool_name_from_id, CapabilityDescriptor, FunctionDeclaration, Tool, ToolError,
};
use serde_json::Value;
use tracing::warn;

use crate::source::CapabilitySource;

/// A discovered capability exposed through the uniform [`Tool`] seam.
pub struct RemoteTool {
    descriptor: CapabilityDescriptor,
    name: String,
    declaration: Option<FunctionDeclaration>,
    source: Arc<dyn CapabilitySource>,
}

impl RemoteTool {
    /// Computes the tool name and declaration once. A schema that cannot be
    /// mapped leaves the tool without a declaration.
    pub fn adapt(descriptor: CapabilityDescriptor, source: Arc<dyn CapabilitySource>) -> Self {
        let name = tool_name_from_id(Some(descriptor.id.as_str()));
        let declaration =
            match map_declaration(&name, &descriptor.description, descriptor.input_schema.as_ref()) {
                Ok(declaration) => Some(declaration),
                Err(error) => {
                    warn!(
                        event_name = "remote.adapter.declaration_unmapped",
                        capability = %name,
                        source = source.address(),
                        error = %error,
                        "capability schema could not be mapped; tool will not be offered"
                    );
                    None
                }
            };

        Self { descriptor, name, declaration, source }
    }

    pub fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }
}

#[async_trait]
impl Tool for RemoteTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.descriptor.description
    }

    fn declaration(&self) -> Option<&FunctionDeclaration> {
        self.declaration.as_ref()
    }

    async fn invoke(&self, params: Value) -> Result<Value, ToolError> {
        let payload = self
            .source
            .invoke(&self.descriptor.id, params)
            .await
            .map_err(|error| ToolError::new(&self.name, error.to_string()))?;

        match payload.get("error") {
            None | Some(Value::Null) => Ok(payload),
            Some(Value::String(message)) => Err(ToolError::new(&self.name, message.clone())),
            Some(other) => Err(ToolError::new(&self.name, other.to_string())),
        }
    }
}
