use huddle_agent::{AgentResult, AgentRuntime};
use huddle_core::config::{AppConfig, LoadOptions};
use huddle_core::UserContext;

use super::{async_runtime, CommandResult};

const COMMAND: &str = "schedule";
const USAGE: &str =
    "please provide scheduling details, e.g. `huddle schedule meeting with John tomorrow at 2pm EST`";

#[derive(Clone, Debug, Default)]
pub struct ScheduleArgs {
    pub instruction: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub json: bool,
}

/// Runs one agent request from the terminal, acting as the given user.
pub fn run(options: LoadOptions, args: ScheduleArgs) -> CommandResult {
    let instruction = args.instruction.trim();
    if instruction.is_empty() {
        return CommandResult::failure(COMMAND, "usage", USAGE, 2);
    }

    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(COMMAND, "config_validation", error.to_string(), 2);
        }
    };
    let agent = match AgentRuntime::from_config(&config) {
        Ok(agent) => agent,
        Err(error) => {
            return CommandResult::failure(COMMAND, "model_configuration", error.to_string(), 2);
        }
    };
    let runtime = match async_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                1,
            );
        }
    };

    let user = UserContext::new(
        args.name.unwrap_or_default(),
        args.email.unwrap_or_default(),
    );
    let result = runtime.block_on(agent.run(instruction, &user));
    render(&result, args.json)
}

pub fn render(result: &AgentResult, json: bool) -> CommandResult {
    if json {
        return CommandResult::agent_run(
            COMMAND,
            result.error_class,
            result.text.clone(),
            result.status_message.clone(),
        );
    }
    CommandResult::plain(if result.is_error() { 1 } else { 0 }, result.text.clone())
}
