//! Running state of one orchestrated turn.
//!
//! [`TurnState`] decides, part by part, whether runtime output is shown, captured or
//! dropped. It knows nothing about transports: every observation returns the UI message
//! to emit, if any.

use concierge_ui::{JsonMode, UiBuilder, UiMessage};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::runtime::EventPart;

const JSON_REQUEST_PHRASES: &[&str] = &[
    "show in json",
    "as json",
    "in json",
    "json tree",
    "json format",
    "show json",
    "display json",
    "raw json",
    "show as tree",
    "tree view",
];

const TOOL_CODE_FENCE: &str = "```tool_code";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TurnPhase {
    #[default]
    Idle,
    Ready,
    Streaming,
    TextAccumulating,
    ToolResultCaptured,
    Completed,
    Failed,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ToolResult {
    pub name: String,
    pub payload: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TurnCompletion {
    /// The runtime produced text; it is the agent's answer.
    Narrated(String),
    /// A tool result was already rendered for the user.
    AlreadyRendered,
    /// No text and nothing rendered, but a tool ran.
    Fallback(ToolResult),
    NoResponse,
}

#[derive(Clone, Debug, Default)]
pub struct TurnState {
    phase: TurnPhase,
    json_requested: bool,
    suppressed: bool,
    component_emitted: bool,
    text: String,
    last_tool_result: Option<ToolResult>,
    tool_names: Vec<String>,
}

impl TurnState {
    pub fn new(utterance: &str, tool_names: Vec<String>) -> Self {
        Self {
            phase: TurnPhase::Ready,
            json_requested: detect_json_request(utterance),
            tool_names,
            ..Self::default()
        }
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn json_requested(&self) -> bool {
        self.json_requested
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    pub fn last_tool_result(&self) -> Option<&ToolResult> {
        self.last_tool_result.as_ref()
    }

    pub fn observe(&mut self, part: EventPart) -> Option<UiMessage> {
        if self.phase == TurnPhase::Ready {
            self.phase = TurnPhase::Streaming;
        }

        match part {
            EventPart::ExecutableCode { language, code } => {
                debug!(language = %language, code = %code, "runtime generated code");
                None
            }
            EventPart::CodeExecutionResult { outcome, output } => {
                debug!(outcome = %outcome, output = %output, "runtime code execution result");
                None
            }
            EventPart::FunctionCall { name, args } => {
                debug!(tool = %name, args = %args, "runtime requested tool call");
                None
            }
            EventPart::FunctionResponse { name, response } => self.capture_tool_result(name, response),
            EventPart::Text(text) => self.accept_text(text),
        }
    }

    fn capture_tool_result(&mut self, name: String, payload: Value) -> Option<UiMessage> {
        info!(event_name = "turn.tool_result.captured", tool = %name, "tool result captured");
        self.phase = TurnPhase::ToolResultCaptured;

        let message = if self.json_requested {
            let document = UiBuilder::new()
                .heading(format!("📊 {}", tool_title(&name)))
                .json_tree(Some("Results".to_string()), payload.clone(), JsonMode::Tree, false)
                .build();
            self.suppressed = true;
            Some(UiMessage::Rendered(document))
        } else if UiMessage::is_component_tree(&payload) {
            Some(UiMessage::Passthrough(payload.clone()))
        } else {
            None
        };

        if message.is_some() {
            self.component_emitted = true;
        }
        self.last_tool_result = Some(ToolResult { name, payload });
        message
    }

    fn accept_text(&mut self, text: String) -> Option<UiMessage> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if is_call_leakage(text, &self.tool_names) {
            warn!(event_name = "turn.text.leakage_dropped", "dropped tool call syntax emitted as text");
            return None;
        }

        self.phase = TurnPhase::TextAccumulating;
        self.text.push_str(text);
        if self.suppressed {
            debug!("text suppressed; a tool result was already rendered");
            None
        } else {
            Some(UiMessage::text(text))
        }
    }

    pub fn fail(&mut self) {
        self.phase = TurnPhase::Failed;
    }

    pub fn complete(&mut self) -> TurnCompletion {
        self.phase = TurnPhase::Completed;
        if !self.text.is_empty() {
            return TurnCompletion::Narrated(std::mem::take(&mut self.text));
        }
        if self.component_emitted {
            return TurnCompletion::AlreadyRendered;
        }
        match self.last_tool_result.take() {
            Some(result) => TurnCompletion::Fallback(result),
            None => TurnCompletion::NoResponse,
        }
    }
}

/// True when the user asked to see raw results as a JSON tree.
pub fn detect_json_request(utterance: &str) -> bool {
    let normalized = utterance.to_lowercase();
    JSON_REQUEST_PHRASES.iter().any(|phrase| normalized.contains(phrase))
}

/// Text that is a tool invocation written out instead of executed.
pub fn is_call_leakage(text: &str, tool_names: &[String]) -> bool {
    if text.contains(TOOL_CODE_FENCE) {
        return true;
    }
    let trimmed = text.trim();
    tool_names.iter().any(|name| {
        trimmed
            .strip_prefix(name.as_str())
            .map(|rest| rest.trim_start().starts_with('('))
            .unwrap_or(false)
    })
}

/// `searchHotels` -> `Search Hotels Results`.
pub fn tool_title(name: &str) -> String {
    if name.is_empty() {
        return "Results".to_string();
    }
    let mut title = String::with_capacity(name.len() + 8);
    for (index, ch) in name.chars().enumerate() {
        if index == 0 {
            title.extend(ch.to_uppercase());
        } else if ch.is_uppercase() {
            title.push(' ');
            title.push(ch);
        } else {
            title.push(ch);
        }
    }
    title.push_str(" Results");
    title
}
