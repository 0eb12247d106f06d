use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use concierge_cli::commands::{config, doctor};
use serde_json::Value;

#[test]
fn config_attributes_values_to_env_file_and_default() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("concierge.toml");
    fs::write(&path, "[sources.booking]\nbase_url = \"http://booking.test:9000\"\n")
        .expect("write config file");

    with_env(&[("CONCIERGE_SERVER_PORT", "9100")], || {
        let result = config::run_with(Some(path.clone()));
        assert_eq!(result.exit_code, 0, "expected effective config output");

        let file_source = format!("file ({})", path.display());
        assert!(result.output.contains(&format!(
            "- sources.booking.base_url = http://booking.test:9000 (source: {file_source})"
        )));
        assert!(result
            .output
            .contains("- server.port = 9100 (source: env (CONCIERGE_SERVER_PORT))"));
        assert!(result.output.contains("- logging.level = info (source: default)"));
        assert!(result.output.contains("- sources.live_search.enabled = false (source: default)"));
    });
}

#[test]
fn config_never_prints_the_api_key() {
    with_env(&[("CONCIERGE_AGENT_API_KEY", "sk-very-secret")], || {
        let result = config::run_with(Some(missing_config_path()));
        assert_eq!(result.exit_code, 0);
        assert!(result.output.contains(
            "- agent.api_key = <redacted> (source: env (CONCIERGE_AGENT_API_KEY))"
        ));
        assert!(!result.output.contains("sk-very-secret"));
    });
}

#[test]
fn config_returns_validation_failure_for_bad_override() {
    with_env(&[("CONCIERGE_SERVER_PORT", "not-a-port")], || {
        let result = config::run_with(Some(missing_config_path()));
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "config");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn doctor_reports_unreachable_sources_and_skips_disabled_ones() {
    with_env(
        &[
            ("CONCIERGE_SOURCES_HOTEL_TOOLS_URL", "http://127.0.0.1:9"),
            ("CONCIERGE_SOURCES_HOTEL_TOOLS_TIMEOUT_SECS", "2"),
            ("CONCIERGE_SOURCES_BOOKING_URL", "http://127.0.0.1:9"),
            ("CONCIERGE_SOURCES_BOOKING_TIMEOUT_SECS", "2"),
        ],
        || {
            let result = doctor::run_with(Some(missing_config_path()), true);
            assert_eq!(result.exit_code, 1, "unreachable sources fail the doctor");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["overall_status"], "fail");
            let checks = payload["checks"].as_array().expect("checks array");
            assert_eq!(checks.len(), 4);
            assert_eq!(checks[0]["name"], "config_validation");
            assert_eq!(checks[0]["status"], "pass");
            assert_eq!(checks[1]["name"], "source_hotel_tools");
            assert_eq!(checks[1]["status"], "fail");
            assert_eq!(checks[2]["name"], "source_booking");
            assert_eq!(checks[2]["status"], "fail");
            assert_eq!(checks[3]["name"], "source_live_search");
            assert_eq!(checks[3]["status"], "skipped");
        },
    );
}

#[test]
fn doctor_skips_probes_when_config_is_invalid() {
    with_env(&[("CONCIERGE_LOGGING_LEVEL", "loud")], || {
        let result = doctor::run_with(Some(missing_config_path()), false);
        assert_eq!(result.exit_code, 1);
        assert!(result.output.starts_with("doctor: one or more readiness checks failed"));
        assert!(result.output.contains("- [fail] config_validation:"));
        assert!(result
            .output
            .contains("- [skip] source_booking: skipped because configuration did not load"));
    });
}

fn missing_config_path() -> PathBuf {
    env::temp_dir().join("concierge-cli-tests-missing.toml")
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid json")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let mut keys = vec![
        "CONCIERGE_DISCOVERY_INITIAL_DELAY_SECS",
        "CONCIERGE_DISCOVERY_POLL_INTERVAL_SECS",
        "CONCIERGE_AGENT_NAME",
        "CONCIERGE_AGENT_APP_NAME",
        "CONCIERGE_AGENT_MODEL",
        "CONCIERGE_AGENT_API_KEY",
        "CONCIERGE_SERVER_BIND_ADDRESS",
        "CONCIERGE_SERVER_PORT",
        "CONCIERGE_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "CONCIERGE_LOGGING_LEVEL",
        "CONCIERGE_LOGGING_FORMAT",
        "CONCIERGE_LOG_LEVEL",
        "CONCIERGE_LOG_FORMAT",
    ]
    .into_iter()
    .map(str::to_string)
    .collect::<Vec<_>>();
    for prefix in
        ["CONCIERGE_SOURCES_HOTEL_TOOLS", "CONCIERGE_SOURCES_BOOKING", "CONCIERGE_SOURCES_LIVE_SEARCH"]
    {
        for suffix in ["ENABLED", "URL", "RPC_PATH", "TIMEOUT_SECS"] {
            keys.push(format!("{prefix}_{suffix}"));
        }
    }

    let previous_values: Vec<(String, Option<String>)> =
        keys.iter().map(|key| (key.clone(), env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
