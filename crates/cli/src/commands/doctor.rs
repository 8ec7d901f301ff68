use huddle_core::config::{AppConfig, LoadOptions};
use huddle_mcp::{GatewayConnector, GatewayError, GatewayStatus};
use serde::Serialize;

use super::{async_runtime, CommandResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn skipped(name: &'static str) -> Self {
        Self {
            name,
            status: CheckStatus::Skipped,
            details: "skipped because configuration did not load".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(options: LoadOptions, json_output: bool) -> CommandResult {
    let report = build_report(options);
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    if json_output {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        return CommandResult::plain(exit_code, output);
    }

    CommandResult::plain(exit_code, render_human(&report))
}

fn build_report(options: LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_llm_credentials(&config));
            checks.push(check_slack_tokens(&config));
            checks.push(check_gateway(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(DoctorCheck::skipped("llm_credentials"));
            checks.push(DoctorCheck::skipped("slack_token_readiness"));
            checks.push(DoctorCheck::skipped("gateway_connectivity"));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_llm_credentials(config: &AppConfig) -> DoctorCheck {
    let provider = config.llm.provider;
    let details = if provider.requires_api_key() {
        format!("{provider:?} key present, model `{}`", config.llm.model)
    } else {
        format!("{provider:?} runs without a key, model `{}`", config.llm.model)
    };
    DoctorCheck { name: "llm_credentials", status: CheckStatus::Pass, details }
}

fn check_slack_tokens(config: &AppConfig) -> DoctorCheck {
    match config.require_slack() {
        Ok(()) => DoctorCheck {
            name: "slack_token_readiness",
            status: CheckStatus::Pass,
            details: "app and bot token prefixes validated".to_string(),
        },
        Err(error) => DoctorCheck {
            name: "slack_token_readiness",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

/// Opens a real session, lists the catalog and closes it again. A missing
/// key fails inside `open` before any request is sent.
fn check_gateway(config: &AppConfig) -> DoctorCheck {
    let runtime = match async_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "gateway_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let connector = GatewayConnector::from_config(&config.gateway);
    let result = runtime.block_on(async {
        let session = connector.open().await?;
        let listed = session.list_tools().await;
        let closed = session.close().await;
        let tools = listed?;
        closed?;
        Ok::<_, GatewayError>(tools.into_iter().map(|tool| tool.name).collect::<Vec<_>>())
    });

    match result {
        Ok(tools) => DoctorCheck {
            name: "gateway_connectivity",
            status: CheckStatus::Pass,
            details: format!("{} ({})", GatewayStatus::Connected { tools }, config.gateway.url),
        },
        Err(error) => DoctorCheck {
            name: "gateway_connectivity",
            status: CheckStatus::Fail,
            details: GatewayStatus::from_error(&error).to_string(),
        },
    }
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
