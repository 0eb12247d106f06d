use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use concierge_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

use super::CommandResult;

pub fn run() -> CommandResult {
    run_with(None)
}

/// Renders the effective configuration, reading `config_path` instead of the
/// default `concierge.toml` lookup when one is given.
pub fn run_with(config_path: Option<PathBuf>) -> CommandResult {
    let options = LoadOptions { config_path: config_path.clone(), ..LoadOptions::default() };
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            )
        }
    };

    let file_path = config_path.filter(|path| path.exists()).or_else(detect_config_path);
    let attribution = Attribution::new(file_path);
    CommandResult::text(0, render(&config, &attribution))
}

fn render(config: &AppConfig, attribution: &Attribution) -> String {
    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];

    for (key, source) in config.sources.iter() {
        let name = key.as_str();
        let prefix = key.env_prefix();
        lines.push(attribution.line(
            &format!("sources.{name}.enabled"),
            &[&format!("{prefix}_ENABLED")],
            &source.enabled.to_string(),
        ));
        lines.push(attribution.line(
            &format!("sources.{name}.base_url"),
            &[&format!("{prefix}_URL")],
            &source.base_url,
        ));
        lines.push(attribution.line(
            &format!("sources.{name}.rpc_path"),
            &[&format!("{prefix}_RPC_PATH")],
            &source.rpc_path,
        ));
        lines.push(attribution.line(
            &format!("sources.{name}.timeout_secs"),
            &[&format!("{prefix}_TIMEOUT_SECS")],
            &source.timeout_secs.to_string(),
        ));
    }

    lines.push(attribution.line(
        "discovery.initial_delay_secs",
        &["CONCIERGE_DISCOVERY_INITIAL_DELAY_SECS"],
        &config.discovery.initial_delay_secs.to_string(),
    ));
    lines.push(attribution.line(
        "discovery.poll_interval_secs",
        &["CONCIERGE_DISCOVERY_POLL_INTERVAL_SECS"],
        &config.discovery.poll_interval_secs.to_string(),
    ));

    lines.push(attribution.line("agent.name", &["CONCIERGE_AGENT_NAME"], &config.agent.name));
    lines.push(attribution.line("agent.description", &[], &config.agent.description));
    lines.push(attribution.line(
        "agent.app_name",
        &["CONCIERGE_AGENT_APP_NAME"],
        &config.agent.app_name,
    ));
    lines.push(attribution.line("agent.model", &["CONCIERGE_AGENT_MODEL"], &config.agent.model));
    let api_key = config.agent.api_key.as_ref().map(|key| redact_secret(key.expose_secret()));
    lines.push(attribution.line(
        "agent.api_key",
        &["CONCIERGE_AGENT_API_KEY"],
        api_key.unwrap_or("<unset>"),
    ));

    lines.push(attribution.line(
        "server.bind_address",
        &["CONCIERGE_SERVER_BIND_ADDRESS"],
        &config.server.bind_address,
    ));
    lines.push(attribution.line(
        "server.port",
        &["CONCIERGE_SERVER_PORT"],
        &config.server.port.to_string(),
    ));
    lines.push(attribution.line(
        "server.graceful_shutdown_secs",
        &["CONCIERGE_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        &config.server.graceful_shutdown_secs.to_string(),
    ));

    lines.push(attribution.line(
        "logging.level",
        &["CONCIERGE_LOGGING_LEVEL", "CONCIERGE_LOG_LEVEL"],
        &config.logging.level,
    ));
    lines.push(attribution.line(
        "logging.format",
        &["CONCIERGE_LOGGING_FORMAT", "CONCIERGE_LOG_FORMAT"],
        &format!("{:?}", config.logging.format),
    ));

    lines.join("\n")
}

/// Where an effective value came from.
struct Attribution {
    file_path: Option<PathBuf>,
    file_doc: Option<Value>,
}

impl Attribution {
    fn new(file_path: Option<PathBuf>) -> Self {
        let file_doc = load_config_file_doc(file_path.as_deref());
        Self { file_path, file_doc }
    }

    fn line(&self, key_path: &str, env_keys: &[&str], value: &str) -> String {
        format!("- {key_path} = {value} (source: {})", self.source_of(key_path, env_keys))
    }

    fn source_of(&self, key_path: &str, env_keys: &[&str]) -> String {
        if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
            return format!("env ({env_key})");
        }

        if let Some(doc) = &self.file_doc {
            if contains_path(doc, key_path) {
                let file_path = self
                    .file_path
                    .as_deref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        "default".to_string()
    }
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("concierge.toml"), PathBuf::from("config/concierge.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn redact_secret(secret: &str) -> &'static str {
    if secret.trim().is_empty() {
        "<empty>"
    } else {
        "<redacted>"
    }
}
