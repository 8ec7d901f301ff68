use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use huddle_cli::commands::schedule::ScheduleArgs;
use huddle_cli::commands::{config, doctor, schedule};
use huddle_core::config::LoadOptions;
use serde_json::Value;
use tempfile::TempDir;

#[test]
fn config_attributes_each_value_to_its_source() {
    let dir = TempDir::new().expect("temp dir");
    let path = write_config(
        &dir,
        "[llm]\napi_key = \"gsk-file-secret\"\nmodel = \"file-model\"\n",
    );

    with_env(&[("HUDDLE_GATEWAY_URL", "https://env.example.com/mcp")], || {
        let result = config::run(options(path.clone()));
        assert_eq!(result.exit_code, 0, "expected config to load: {}", result.output);

        let file_source = format!("(source: file ({}))", path.display());
        assert!(result.output.contains(&format!("- llm.model = file-model {file_source}")));
        assert!(result
            .output
            .contains("- gateway.url = https://env.example.com/mcp (source: env (HUDDLE_GATEWAY_URL))"));
        assert!(result.output.contains("- agent.organization = Umbrage (source: default)"));
        assert!(result.output.contains(&format!("- llm.api_key = <redacted> {file_source}")));
        assert!(!result.output.contains("gsk-file-secret"));
    });
}

#[test]
fn config_reports_legacy_gateway_key_alias() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("missing.toml");

    with_env(&[("HUDDLE_LLM_API_KEY", "gsk-test"), ("API_KEY", "gateway-secret")], || {
        let result = config::run(options(path.clone()));
        assert_eq!(result.exit_code, 0);
        assert!(result
            .output
            .contains("- gateway.api_key = <redacted> (source: env (API_KEY))"));
        assert!(!result.output.contains("gateway-secret"));
    });
}

#[test]
fn config_fails_validation_without_model_key() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("missing.toml");

    with_env(&[], || {
        let result = config::run(options(path.clone()));
        assert_eq!(result.exit_code, 2);
        assert!(result.output.starts_with("config validation failed"));
    });
}

#[test]
fn doctor_reports_missing_gateway_secret_without_network() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("missing.toml");

    with_env(
        &[
            ("HUDDLE_LLM_API_KEY", "gsk-test"),
            ("HUDDLE_SLACK_APP_TOKEN", "xapp-test"),
            ("HUDDLE_SLACK_BOT_TOKEN", "xoxb-test"),
        ],
        || {
            let result = doctor::run(options(path.clone()), true);
            assert_eq!(result.exit_code, 1);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["overall_status"], "fail");
            assert_eq!(check(&payload, "config_validation")["status"], "pass");
            assert_eq!(check(&payload, "llm_credentials")["status"], "pass");
            assert_eq!(check(&payload, "slack_token_readiness")["status"], "pass");

            let gateway = check(&payload, "gateway_connectivity");
            assert_eq!(gateway["status"], "fail");
            assert!(gateway["details"]
                .as_str()
                .expect("details")
                .starts_with("⚙️ Configuration error"));
        },
    );
}

#[test]
fn doctor_skips_dependent_checks_when_config_fails() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("missing.toml");

    with_env(&[], || {
        let result = doctor::run(options(path.clone()), false);
        assert_eq!(result.exit_code, 1);
        assert!(result.output.starts_with("doctor: one or more readiness checks failed"));
        assert!(result.output.contains("- [fail] config_validation:"));
        assert!(result.output.contains("- [skip] gateway_connectivity:"));
    });
}

#[test]
fn doctor_flags_swapped_slack_tokens() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("missing.toml");

    with_env(
        &[
            ("HUDDLE_LLM_API_KEY", "gsk-test"),
            ("HUDDLE_SLACK_APP_TOKEN", "xoxb-swapped"),
            ("HUDDLE_SLACK_BOT_TOKEN", "xapp-swapped"),
        ],
        || {
            let payload = parse_payload(&doctor::run(options(path.clone()), true).output);
            let slack = check(&payload, "slack_token_readiness");
            assert_eq!(slack["status"], "fail");
            assert!(slack["details"].as_str().expect("details").contains("slack.app_token"));
        },
    );
}

#[test]
fn schedule_rejects_empty_request() {
    with_env(&[], || {
        let result = schedule::run(
            LoadOptions::default(),
            ScheduleArgs { instruction: "   ".to_string(), ..ScheduleArgs::default() },
        );
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "schedule");
        assert_eq!(payload["error_class"], "usage");
    });
}

#[test]
fn schedule_reports_config_failure_before_calling_the_model() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("missing.toml");

    with_env(&[], || {
        let result = schedule::run(
            options(path.clone()),
            ScheduleArgs {
                instruction: "lunch with Sam friday noon".to_string(),
                ..ScheduleArgs::default()
            },
        );
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

fn options(path: PathBuf) -> LoadOptions {
    LoadOptions { config_path: Some(path), ..LoadOptions::default() }
}

fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("huddle.toml");
    fs::write(&path, contents).expect("write config");
    path
}

fn check<'a>(payload: &'a Value, name: &str) -> &'a Value {
    payload["checks"]
        .as_array()
        .expect("checks array")
        .iter()
        .find(|check| check["name"] == name)
        .unwrap_or_else(|| panic!("missing check {name}"))
}

fn parse_payload(raw: &str) -> Value {
    serde_json::from_str(raw).expect("command output should be valid json")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "API_KEY",
        "HUDDLE_SLACK_APP_TOKEN",
        "HUDDLE_SLACK_BOT_TOKEN",
        "HUDDLE_LLM_PROVIDER",
        "HUDDLE_LLM_API_KEY",
        "HUDDLE_LLM_BASE_URL",
        "HUDDLE_LLM_MODEL",
        "HUDDLE_LLM_TIMEOUT_SECS",
        "HUDDLE_LLM_MAX_TOOL_STEPS",
        "HUDDLE_GATEWAY_URL",
        "HUDDLE_GATEWAY_API_KEY",
        "HUDDLE_GATEWAY_API_KEY_HEADER",
        "HUDDLE_GATEWAY_CONNECT_TIMEOUT_SECS",
        "HUDDLE_AGENT_ORGANIZATION",
        "HUDDLE_AGENT_DEFAULT_TIMEZONE",
        "HUDDLE_SERVER_BIND_ADDRESS",
        "HUDDLE_SERVER_HEALTH_CHECK_PORT",
        "HUDDLE_LOGGING_LEVEL",
        "HUDDLE_LOGGING_FORMAT",
        "HUDDLE_LOG_LEVEL",
        "HUDDLE_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

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
