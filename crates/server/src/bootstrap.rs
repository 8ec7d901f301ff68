use std::sync::Arc;

use async_trait::async_trait;
use huddle_agent::{AgentRuntime, LlmError};
use huddle_core::config::{AppConfig, ConfigError};
use huddle_core::UserContext;
use huddle_slack::commands::{CommandRouteError, ScheduleOutcome, SchedulingService};
use huddle_slack::profile::ProfileDirectory;
use huddle_slack::reply::ReplySink;
use huddle_slack::web::SlackApiError;
use huddle_slack::{
    default_dispatcher, CommandRouter, ReconnectPolicy, SlackSocketTransport, SlackWebClient,
    SocketModeRunner,
};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub slack_runner: SocketModeRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("model client could not be created: {0}")]
    Model(#[from] LlmError),
    #[error("slack client could not be created: {0}")]
    Slack(#[from] SlackApiError),
}

/// Bridges slash commands to the agent runtime. The runtime never fails a
/// request, so this adapter never returns an error.
pub struct AgentScheduler {
    runtime: Arc<AgentRuntime>,
}

impl AgentScheduler {
    pub fn new(runtime: Arc<AgentRuntime>) -> Self {
        Self { runtime }
    }
}

#[async_trait]
impl SchedulingService for AgentScheduler {
    async fn schedule(
        &self,
        instruction: &str,
        user: &UserContext,
    ) -> Result<ScheduleOutcome, CommandRouteError> {
        let result = self.runtime.run(instruction, user).await;
        Ok(ScheduleOutcome { text: result.text, status_message: result.status_message })
    }
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    config.require_slack()?;

    let agent_runtime = Arc::new(AgentRuntime::from_config(&config)?);
    info!(
        event_name = "system.bootstrap.agent_ready",
        correlation_id = "bootstrap",
        provider = ?config.llm.provider,
        model = %config.llm.model,
        gateway_url = %config.gateway.url,
        gateway_secret_configured = config.gateway.has_api_key(),
        "agent runtime initialized"
    );

    let web = Arc::new(SlackWebClient::new(
        config.slack.app_token.clone(),
        config.slack.bot_token.clone(),
    )?);
    let router = CommandRouter::new(
        Arc::new(AgentScheduler::new(Arc::clone(&agent_runtime))),
        Arc::clone(&web) as Arc<dyn ProfileDirectory>,
        Arc::clone(&web) as Arc<dyn ReplySink>,
    );
    let slack_runner = SocketModeRunner::new(
        Arc::new(SlackSocketTransport::new(web)),
        default_dispatcher(router),
        ReconnectPolicy::default(),
    );

    Ok(Application { config, slack_runner })
}
