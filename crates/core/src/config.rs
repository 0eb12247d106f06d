use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::capability::{SourceId, SourceKind};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub sources: SourcesConfig,
    pub discovery: DiscoveryConfig,
    pub agent: AgentConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// The three capability sources the assistant knows how to talk to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKey {
    HotelTools,
    Booking,
    LiveSearch,
}

impl SourceKey {
    pub const ALL: [SourceKey; 3] = [SourceKey::HotelTools, SourceKey::Booking, SourceKey::LiveSearch];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::HotelTools => "hotel_tools",
            Self::Booking => "booking",
            Self::LiveSearch => "live_search",
        }
    }

    pub fn id(self) -> SourceId {
        SourceId::new(self.as_str())
    }

    pub fn kind(self) -> SourceKind {
        match self {
            Self::HotelTools => SourceKind::Primary,
            Self::Booking | Self::LiveSearch => SourceKind::Skill,
        }
    }

    pub fn env_prefix(self) -> &'static str {
        match self {
            Self::HotelTools => "CONCIERGE_SOURCES_HOTEL_TOOLS",
            Self::Booking => "CONCIERGE_SOURCES_BOOKING",
            Self::LiveSearch => "CONCIERGE_SOURCES_LIVE_SEARCH",
        }
    }
}

#[derive(Clone, Debug)]
pub struct SourceConfig {
    pub enabled: bool,
    pub base_url: String,
    pub rpc_path: String,
    pub timeout_secs: u64,
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Clone, Debug)]
pub struct SourcesConfig {
    pub hotel_tools: SourceConfig,
    pub booking: SourceConfig,
    pub live_search: SourceConfig,
}

impl SourcesConfig {
    pub fn get(&self, key: SourceKey) -> &SourceConfig {
        match key {
            SourceKey::HotelTools => &self.hotel_tools,
            SourceKey::Booking => &self.booking,
            SourceKey::LiveSearch => &self.live_search,
        }
    }

    fn get_mut(&mut self, key: SourceKey) -> &mut SourceConfig {
        match key {
            SourceKey::HotelTools => &mut self.hotel_tools,
            SourceKey::Booking => &mut self.booking,
            SourceKey::LiveSearch => &mut self.live_search,
        }
    }

    /// Sources in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (SourceKey, &SourceConfig)> {
        SourceKey::ALL.into_iter().map(move |key| (key, self.get(key)))
    }
}

#[derive(Clone, Debug)]
pub struct DiscoveryConfig {
    pub initial_delay_secs: u64,
    pub poll_interval_secs: u64,
}

impl DiscoveryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub name: String,
    pub description: String,
    pub app_name: String,
    pub model: String,
    pub api_key: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub hotel_tools_url: Option<String>,
    pub booking_url: Option<String>,
    pub live_search_url: Option<String>,
    pub live_search_enabled: Option<bool>,
    pub agent_model: Option<String>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sources: SourcesConfig {
                hotel_tools: SourceConfig {
                    enabled: true,
                    base_url: "http://localhost:8081".to_string(),
                    rpc_path: "/mcp/http".to_string(),
                    timeout_secs: 30,
                },
                booking: SourceConfig {
                    enabled: true,
                    base_url: "http://localhost:8082".to_string(),
                    rpc_path: "/a2a".to_string(),
                    timeout_secs: 30,
                },
                live_search: SourceConfig {
                    enabled: false,
                    base_url: "http://localhost:8083".to_string(),
                    rpc_path: "/a2a".to_string(),
                    timeout_secs: 30,
                },
            },
            discovery: DiscoveryConfig { initial_delay_secs: 5, poll_interval_secs: 10 },
            agent: AgentConfig {
                name: "hotel_booking_agent".to_string(),
                description: "Conversational assistant for hotel search, pricing and booking"
                    .to_string(),
                app_name: "hotel-concierge".to_string(),
                model: "gemini-2.0-flash".to_string(),
                api_key: None,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("concierge.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(sources) = patch.sources {
            let patches = [
                (SourceKey::HotelTools, sources.hotel_tools),
                (SourceKey::Booking, sources.booking),
                (SourceKey::LiveSearch, sources.live_search),
            ];
            for (key, source_patch) in patches {
                if let Some(source_patch) = source_patch {
                    source_patch.apply_to(self.sources.get_mut(key));
                }
            }
        }

        if let Some(discovery) = patch.discovery {
            if let Some(initial_delay_secs) = discovery.initial_delay_secs {
                self.discovery.initial_delay_secs = initial_delay_secs;
            }
            if let Some(poll_interval_secs) = discovery.poll_interval_secs {
                self.discovery.poll_interval_secs = poll_interval_secs;
            }
        }

        if let Some(agent) = patch.agent {
            if let Some(name) = agent.name {
                self.agent.name = name;
            }
            if let Some(description) = agent.description {
                self.agent.description = description;
            }
            if let Some(app_name) = agent.app_name {
                self.agent.app_name = app_name;
            }
            if let Some(model) = agent.model {
                self.agent.model = model;
            }
            if let Some(api_key_value) = agent.api_key {
                self.agent.api_key = Some(secret_value(api_key_value));
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        for key in SourceKey::ALL {
            let prefix = key.env_prefix();
            let source = self.sources.get_mut(key);

            let enabled_key = format!("{prefix}_ENABLED");
            if let Some(value) = read_env(&enabled_key) {
                source.enabled = parse_bool(&enabled_key, &value)?;
            }
            if let Some(value) = read_env(&format!("{prefix}_URL")) {
                source.base_url = value;
            }
            if let Some(value) = read_env(&format!("{prefix}_RPC_PATH")) {
                source.rpc_path = value;
            }
            let timeout_key = format!("{prefix}_TIMEOUT_SECS");
            if let Some(value) = read_env(&timeout_key) {
                source.timeout_secs = parse_u64(&timeout_key, &value)?;
            }
        }

        if let Some(value) = read_env("CONCIERGE_DISCOVERY_INITIAL_DELAY_SECS") {
            self.discovery.initial_delay_secs =
                parse_u64("CONCIERGE_DISCOVERY_INITIAL_DELAY_SECS", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_DISCOVERY_POLL_INTERVAL_SECS") {
            self.discovery.poll_interval_secs =
                parse_u64("CONCIERGE_DISCOVERY_POLL_INTERVAL_SECS", &value)?;
        }

        if let Some(value) = read_env("CONCIERGE_AGENT_NAME") {
            self.agent.name = value;
        }
        if let Some(value) = read_env("CONCIERGE_AGENT_APP_NAME") {
            self.agent.app_name = value;
        }
        if let Some(value) = read_env("CONCIERGE_AGENT_MODEL") {
            self.agent.model = value;
        }
        if let Some(value) = read_env("CONCIERGE_AGENT_API_KEY") {
            self.agent.api_key = Some(secret_value(value));
        }

        if let Some(value) = read_env("CONCIERGE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("CONCIERGE_SERVER_PORT") {
            self.server.port = parse_u16("CONCIERGE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("CONCIERGE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("CONCIERGE_LOGGING_LEVEL").or_else(|| read_env("CONCIERGE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CONCIERGE_LOGGING_FORMAT").or_else(|| read_env("CONCIERGE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(url) = overrides.hotel_tools_url {
            self.sources.hotel_tools.base_url = url;
        }
        if let Some(url) = overrides.booking_url {
            self.sources.booking.base_url = url;
        }
        if let Some(url) = overrides.live_search_url {
            self.sources.live_search.base_url = url;
        }
        if let Some(enabled) = overrides.live_search_enabled {
            self.sources.live_search.enabled = enabled;
        }
        if let Some(model) = overrides.agent_model {
            self.agent.model = model;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, source) in self.sources.iter() {
            validate_source(key, source)?;
        }
        validate_discovery(&self.discovery)?;
        validate_agent(&self.agent)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("concierge.toml"), PathBuf::from("config/concierge.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_source(key: SourceKey, source: &SourceConfig) -> Result<(), ConfigError> {
    let name = key.as_str();
    let url = source.base_url.trim();
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "sources.{name}.base_url must start with http:// or https:// (got `{url}`)"
        )));
    }

    if !source.rpc_path.starts_with('/') {
        return Err(ConfigError::Validation(format!(
            "sources.{name}.rpc_path must start with `/`"
        )));
    }

    if source.timeout_secs == 0 || source.timeout_secs > 300 {
        return Err(ConfigError::Validation(format!(
            "sources.{name}.timeout_secs must be in range 1..=300"
        )));
    }

    Ok(())
}

fn validate_discovery(discovery: &DiscoveryConfig) -> Result<(), ConfigError> {
    if discovery.poll_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "discovery.poll_interval_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_agent(agent: &AgentConfig) -> Result<(), ConfigError> {
    if agent.name.trim().is_empty() {
        return Err(ConfigError::Validation("agent.name must not be empty".to_string()));
    }

    if agent.model.trim().is_empty() {
        return Err(ConfigError::Validation("agent.model must not be empty".to_string()));
    }

    let blank_key =
        agent.api_key.as_ref().map(|value| value.expose_secret().trim().is_empty()).unwrap_or(false);
    if blank_key {
        return Err(ConfigError::Validation(
            "agent.api_key is set but blank; remove it or provide a key".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    sources: Option<SourcesPatch>,
    discovery: Option<DiscoveryPatch>,
    agent: Option<AgentPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct SourcesPatch {
    hotel_tools: Option<SourcePatch>,
    booking: Option<SourcePatch>,
    live_search: Option<SourcePatch>,
}

#[derive(Debug, Default, Deserialize)]
struct SourcePatch {
    enabled: Option<bool>,
    base_url: Option<String>,
    rpc_path: Option<String>,
    timeout_secs: Option<u64>,
}

impl SourcePatch {
    fn apply_to(self, source: &mut SourceConfig) {
        if let Some(enabled) = self.enabled {
            source.enabled = enabled;
        }
        if let Some(base_url) = self.base_url {
            source.base_url = base_url;
        }
        if let Some(rpc_path) = self.rpc_path {
            source.rpc_path = rpc_path;
        }
        if let Some(timeout_secs) = self.timeout_secs {
            source.timeout_secs = timeout_secs;
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct DiscoveryPatch {
    initial_delay_secs: Option<u64>,
    poll_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    name: Option<String>,
    description: Option<String>,
    app_name: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat, SourceKey};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_describe_three_sources_with_live_search_disabled() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        let keys: Vec<SourceKey> = config.sources.iter().map(|(key, _)| key).collect();
        ensure(keys == SourceKey::ALL.to_vec(), "sources should iterate in registration order")?;
        ensure(config.sources.hotel_tools.enabled, "hotel tools enabled by default")?;
        ensure(config.sources.booking.enabled, "booking enabled by default")?;
        ensure(!config.sources.live_search.enabled, "live search disabled by default")?;
        ensure(config.sources.hotel_tools.rpc_path == "/mcp/http", "default tool rpc path")?;
        ensure(config.discovery.poll_interval_secs == 10, "default poll interval is 10s")?;
        ensure(config.discovery.initial_delay_secs == 5, "default initial delay is 5s")?;
        Ok(())
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_BOOKING_HOST", "booking.internal:9000");
        env::set_var("TEST_AGENT_KEY", "key-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("concierge.toml");
            fs::write(
                &path,
                r#"
[sources.booking]
base_url = "http://${TEST_BOOKING_HOST}"

[agent]
api_key = "${TEST_AGENT_KEY}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.sources.booking.base_url == "http://booking.internal:9000",
                "booking url should be interpolated from environment",
            )?;
            ensure(
                config.agent.api_key.as_ref().map(|key| key.expose_secret() == "key-from-env")
                    == Some(true),
                "api key should be interpolated from environment",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_BOOKING_HOST", "TEST_AGENT_KEY"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CONCIERGE_LOG_LEVEL", "warn");
        env::set_var("CONCIERGE_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["CONCIERGE_LOG_LEVEL", "CONCIERGE_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CONCIERGE_SOURCES_BOOKING_URL", "http://booking-from-env:8082");
        env::set_var("CONCIERGE_SOURCES_LIVE_SEARCH_ENABLED", "true");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("concierge.toml");
            fs::write(
                &path,
                r#"
[sources.hotel_tools]
base_url = "http://tools-from-file:8081"

[sources.booking]
base_url = "http://booking-from-file:8082"
timeout_secs = 12

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    hotel_tools_url: Some("http://tools-from-override:8081".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.sources.hotel_tools.base_url == "http://tools-from-override:8081",
                "override should win over file",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.sources.booking.base_url == "http://booking-from-env:8082",
                "env should win over file and defaults",
            )?;
            ensure(config.sources.booking.timeout_secs == 12, "file should win over defaults")?;
            ensure(config.sources.live_search.enabled, "env should enable live search")?;
            Ok(())
        })();

        clear_vars(&["CONCIERGE_SOURCES_BOOKING_URL", "CONCIERGE_SOURCES_LIVE_SEARCH_ENABLED"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CONCIERGE_SOURCES_BOOKING_URL", "localhost:8082");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("sources.booking.base_url")
            );
            ensure(has_message, "validation failure should mention sources.booking.base_url")
        })();

        clear_vars(&["CONCIERGE_SOURCES_BOOKING_URL"]);
        result
    }

    #[test]
    fn invalid_numeric_env_override_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CONCIERGE_DISCOVERY_POLL_INTERVAL_SECS", "soon");

        let result = (|| -> Result<(), String> {
            let rejected = matches!(
                AppConfig::load(LoadOptions::default()),
                Err(ConfigError::InvalidEnvOverride { ref key, .. })
                    if key == "CONCIERGE_DISCOVERY_POLL_INTERVAL_SECS"
            );
            ensure(rejected, "non-numeric poll interval should be rejected")
        })();

        clear_vars(&["CONCIERGE_DISCOVERY_POLL_INTERVAL_SECS"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CONCIERGE_AGENT_API_KEY", "model-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("model-secret-value"), "debug output should not contain api key")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&["CONCIERGE_AGENT_API_KEY"]);
        result
    }
}
