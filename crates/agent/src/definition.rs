use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use concierge_core::config::AgentConfig;
use concierge_core::FunctionDeclaration;
use secrecy::SecretString;

use crate::tools::ToolSet;

#[derive(Clone, Debug)]
pub struct ModelConfig {
    pub model: String,
    pub api_key: Option<SecretString>,
}

/// Static identity of the assistant. Tools and instructions change, this does not.
#[derive(Clone, Debug)]
pub struct AgentProfile {
    pub name: String,
    pub description: String,
    pub app_name: String,
    pub model: ModelConfig,
}

impl AgentProfile {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            name: config.name.clone(),
            description: config.description.clone(),
            app_name: config.app_name.clone(),
            model: ModelConfig { model: config.model.clone(), api_key: config.api_key.clone() },
        }
    }
}

/// Immutable snapshot handed to the execution runtime. Replaced whole, never edited.
#[derive(Debug)]
pub struct AgentDefinition {
    pub version: u64,
    pub name: String,
    pub description: String,
    pub instructions: String,
    pub model: ModelConfig,
    pub tools: ToolSet,
    pub built_at: DateTime<Utc>,
}

impl AgentDefinition {
    pub fn build(version: u64, profile: &AgentProfile, tools: ToolSet) -> Self {
        Self {
            version,
            name: profile.name.clone(),
            description: profile.description.clone(),
            instructions: compose_instructions(profile, &tools),
            model: profile.model.clone(),
            tools,
            built_at: Utc::now(),
        }
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.names()
    }
}

pub fn compose_instructions(profile: &AgentProfile, tools: &ToolSet) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "You are {}. {}", profile.name, profile.description);
    text.push('\n');
    text.push_str("Always answer by calling the available tools. Never invent hotels, prices or bookings.\n");
    text.push_str(
        "Do not write tool invocations as text. Output like `searchHotels(...)` or a ```tool_code block is never shown to the user.\n",
    );

    text.push_str("\nAvailable tools:\n");
    if tools.is_empty() {
        text.push_str("- none yet; tell the user the services are still connecting.\n");
    }
    for declaration in tools.declarations() {
        text.push_str(&usage_line(declaration));
    }

    text.push_str("\nWhen presenting results:\n");
    text.push_str("- Bookings: give the booking reference, hotel, guest name, dates and total.\n");
    text.push_str("- Searches: list hotel names, ratings, nightly prices and locations.\n");
    text.push_str("- Prices: always state the currency amount per night and the total.\n");
    text
}

fn usage_line(declaration: &FunctionDeclaration) -> String {
    let required = &declaration.parameters.required;
    let optional: Vec<&str> = declaration
        .parameters
        .properties
        .keys()
        .filter(|name| !required.contains(name))
        .map(String::as_str)
        .collect();

    let mut line = format!("- {}: {}", declaration.name, declaration.description);
    if !required.is_empty() {
        let _ = write!(line, " Required: {}.", required.join(", "));
    }
    if !optional.is_empty() {
        let _ = write!(line, " Optional: {}.", optional.join(", "));
    }
    line.push('\n');
    line
}
