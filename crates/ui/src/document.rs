use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::components::UiComponent;

pub const A2UI_FORMAT: &str = "a2ui";
pub const A2UI_VERSION: &str = "1.0";
/// Output-only marker telling renderers to show the payload without further narration.
pub const DIRECT_RENDER_FLAG: &str = "__a2ui_direct__";

/// A finished component tree.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UiDocument {
    components: Vec<UiComponent>,
}

impl UiDocument {
    pub fn new(components: Vec<UiComponent>) -> Self {
        Self { components }
    }

    /// Single body-text document, used for narrated model output.
    pub fn text(content: impl Into<String>) -> Self {
        Self::new(vec![UiComponent::body(content)])
    }

    pub fn components(&self) -> &[UiComponent] {
        &self.components
    }

    pub fn into_components(self) -> Vec<UiComponent> {
        self.components
    }

    pub fn has_json_tree(&self) -> bool {
        self.components.iter().any(UiComponent::is_json_tree)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Serialize for UiDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let direct = self.has_json_tree();
        let mut map = serializer.serialize_map(Some(if direct { 4 } else { 3 }))?;
        map.serialize_entry("format", A2UI_FORMAT)?;
        map.serialize_entry("version", A2UI_VERSION)?;
        map.serialize_entry("components", &self.components)?;
        if direct {
            map.serialize_entry(DIRECT_RENDER_FLAG, &true)?;
        }
        map.end()
    }
}

/// What the orchestrator hands to a transport.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UiMessage {
    /// A document built locally.
    Rendered(UiDocument),
    /// A component tree supplied by a tool, forwarded verbatim.
    Passthrough(Value),
}

impl UiMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Rendered(UiDocument::text(content))
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Rendered(document) => document.to_value(),
            Self::Passthrough(value) => value.clone(),
        }
    }

    pub fn document(&self) -> Option<&UiDocument> {
        match self {
            Self::Rendered(document) => Some(document),
            Self::Passthrough(_) => None,
        }
    }

    /// True when `value` already looks like an `a2ui` component tree.
    pub fn is_component_tree(value: &Value) -> bool {
        value.get("format").and_then(Value::as_str) == Some(A2UI_FORMAT)
            && value.get("components").map(Value::is_array).unwrap_or(false)
    }
}

impl From<UiDocument> for UiMessage {
    fn from(document: UiDocument) -> Self {
        Self::Rendered(document)
    }
}
