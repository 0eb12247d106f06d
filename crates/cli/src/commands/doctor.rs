use std::path::PathBuf;

use anyhow::Context;
use concierge_core::config::{AppConfig, LoadOptions};
use concierge_core::{SourceConfig, SourceKey};
use serde::Serialize;
use tokio::runtime::Runtime;

use super::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn new(name: impl Into<String>, status: CheckStatus, details: impl Into<String>) -> Self {
        Self { name: name.into(), status, details: details.into() }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

impl DoctorReport {
    fn from_checks(checks: Vec<DoctorCheck>) -> Self {
        let any_failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
        let (overall_status, summary) = if any_failed {
            (CheckStatus::Fail, "doctor: one or more readiness checks failed")
        } else {
            (CheckStatus::Pass, "doctor: all readiness checks passed")
        };
        Self { overall_status, summary: summary.to_string(), checks }
    }

    fn exit_code(&self) -> u8 {
        match self.overall_status {
            CheckStatus::Fail => 1,
            CheckStatus::Pass | CheckStatus::Skipped => 0,
        }
    }
}

pub fn run(json_output: bool) -> CommandResult {
    run_with(None, json_output)
}

pub fn run_with(config_path: Option<PathBuf>, json_output: bool) -> CommandResult {
    let report = build_report(LoadOptions { config_path, ..LoadOptions::default() });
    let exit_code = report.exit_code();

    if json_output {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        return CommandResult::text(exit_code, output);
    }

    CommandResult::text(exit_code, render_human(&report))
}

fn build_report(options: LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    let config = match AppConfig::load(options) {
        Ok(config) => {
            checks.push(DoctorCheck::new(
                "config_validation",
                CheckStatus::Pass,
                "configuration loaded and validated",
            ));
            config
        }
        Err(error) => {
            checks.push(DoctorCheck::new(
                "config_validation",
                CheckStatus::Fail,
                error.to_string(),
            ));
            for key in SourceKey::ALL {
                checks.push(DoctorCheck::new(
                    check_name(key),
                    CheckStatus::Skipped,
                    "skipped because configuration did not load",
                ));
            }
            return DoctorReport::from_checks(checks);
        }
    };

    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build();
    match runtime {
        Ok(runtime) => {
            for (key, source) in config.sources.iter() {
                checks.push(check_source(&runtime, key, source));
            }
        }
        Err(error) => {
            checks.push(DoctorCheck::new(
                "async_runtime",
                CheckStatus::Fail,
                format!("failed to initialize async runtime: {error}"),
            ));
        }
    }

    DoctorReport::from_checks(checks)
}

fn check_name(key: SourceKey) -> String {
    format!("source_{}", key.as_str())
}

fn check_source(runtime: &Runtime, key: SourceKey, source: &SourceConfig) -> DoctorCheck {
    if !source.enabled {
        return DoctorCheck::new(check_name(key), CheckStatus::Skipped, "disabled in configuration");
    }

    match runtime.block_on(probe(key, source)) {
        Ok(0) => DoctorCheck::new(
            check_name(key),
            CheckStatus::Fail,
            format!("{} is running but advertises no capabilities", source.base_url),
        ),
        Ok(count) => DoctorCheck::new(
            check_name(key),
            CheckStatus::Pass,
            format!("discovered {count} capabilities at {}", source.base_url),
        ),
        Err(error) => DoctorCheck::new(check_name(key), CheckStatus::Fail, format!("{error:#}")),
    }
}

async fn probe(key: SourceKey, source: &SourceConfig) -> anyhow::Result<usize> {
    let client = concierge_remote::client_for(key, source)
        .with_context(|| format!("could not build a client for {}", source.base_url))?;
    let capabilities = client
        .discover()
        .await
        .with_context(|| format!("discovery against {} failed", source.base_url))?;
    Ok(capabilities.len())
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
