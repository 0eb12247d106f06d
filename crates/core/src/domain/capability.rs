use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wire protocol a capability was discovered through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// JSON-RPC tool protocol (`tools/list`, `tools/call`).
    Primary,
    /// Agent-card skill protocol (`tasks/send`).
    Skill,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Skill => "skill",
        }
    }
}

/// Stable identifier of a configured capability source.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(pub String);

impl SourceId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A remote capability as advertised by its source, before adaptation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    pub input_schema: Option<Value>,
    pub source: SourceKind,
}

impl CapabilityDescriptor {
    pub fn new(id: impl Into<String>, source: SourceKind) -> Self {
        let id = id.into();
        Self { name: id.clone(), id, description: String::new(), input_schema: None, source }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }
}
