//! Request orchestration.
//!
//! One call to [`AgentRuntime::run`] walks a fixed sequence of states:
//!
//! 1. `Init` captures the clock once
//! 2. `Connecting` opens a gateway session (failures degrade to local tools)
//! 3. `ToolsMerged` builds the tool set and the system prompt
//! 4. `Invoking` runs the model with tool calling
//! 5. `Finalizing` appends the status footer
//! 6. `Cleanup` closes the gateway session
//!
//! `run` never returns an error: terminal failures become an error-text
//! [`AgentResult`].

use std::sync::Arc;

use huddle_core::config::AppConfig;
use huddle_core::{ApplicationError, Clock, SystemClock, TemporalContext, Tool, UserContext};
use huddle_mcp::{discover_tools, GatewayConnector, GatewaySession, GatewayStatus};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::llm::{generate_text, LlmClient, LlmError, OpenAiCompatibleClient};
use crate::policy::SchedulingPolicy;
use crate::prompt::{build_system_prompt, PromptInputs};
use crate::tools::{local_tools, ToolRegistry};

pub const DEFAULT_MAX_TOOL_STEPS: u32 = 8;
pub const EXAMPLE_REQUEST: &str = "Schedule a team meeting with John and Sarah tomorrow at 2pm EST";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AgentState {
    Init,
    Connecting,
    ToolsMerged,
    Invoking,
    Finalizing,
    Cleanup,
}

impl AgentState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Connecting => "connecting",
            Self::ToolsMerged => "tools_merged",
            Self::Invoking => "invoking",
            Self::Finalizing => "finalizing",
            Self::Cleanup => "cleanup",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AgentResult {
    pub text: String,
    pub status_message: String,
    /// Error class of a terminal failure, absent on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_class: Option<&'static str>,
}

impl AgentResult {
    pub fn is_error(&self) -> bool {
        self.error_class.is_some()
    }
}

pub fn status_footer(status: &GatewayStatus) -> String {
    format!("\n\n🔧 **System Status:** {status}")
}

/// User-facing explanation for a request that could not be completed.
pub fn error_text(error: &ApplicationError, status: &GatewayStatus) -> String {
    format!(
        "❌ **Error Processing Request**\n\n\
         Sorry, I encountered an issue processing your scheduling request.\n\n\
         **Error details:** {}\n\
         **MCP Status:** {status}\n\n\
         **Please try:**\n\
         1. Rephrasing your request\n\
         2. Being more specific about time and attendees\n\
         3. Contacting support if the issue persists\n\n\
         **Example format:** \"{EXAMPLE_REQUEST}\"",
        error.detail()
    )
}

/// Owns the gateway session for one request. Dropping it without `release`
/// (for example when the request future is cancelled) still closes the
/// session on the runtime.
struct SessionGuard {
    session: Option<Arc<GatewaySession>>,
}

impl SessionGuard {
    async fn release(mut self, correlation_id: &str) {
        let Some(session) = self.session.take() else {
            return;
        };
        match session.close().await {
            Ok(()) => debug!(
                event_name = "agent.cleanup.closed",
                correlation_id,
                session_id = %session.session_id(),
                "gateway session released"
            ),
            Err(error) => warn!(
                event_name = "agent.cleanup.failed",
                correlation_id,
                session_id = %session.session_id(),
                error = %ApplicationError::from(error),
                "failed to close gateway session"
            ),
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        if session.is_closed() {
            return;
        }
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(error) = session.close().await {
                    warn!(event_name = "agent.cleanup.failed", error = %error, "deferred close failed");
                }
            });
        }
    }
}

type Connected = (SessionGuard, Vec<Arc<dyn Tool>>, GatewayStatus);

pub struct AgentRuntime {
    llm: Arc<dyn LlmClient>,
    gateway: GatewayConnector,
    clock: Arc<dyn Clock>,
    policy: SchedulingPolicy,
    max_tool_steps: u32,
}

impl AgentRuntime {
    pub fn new(llm: Arc<dyn LlmClient>, gateway: GatewayConnector) -> Self {
        Self {
            llm,
            gateway,
            clock: Arc::new(SystemClock),
            policy: SchedulingPolicy::default(),
            max_tool_steps: DEFAULT_MAX_TOOL_STEPS,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, LlmError> {
        let llm = OpenAiCompatibleClient::from_config(&config.llm)?;
        Ok(Self::new(Arc::new(llm), GatewayConnector::from_config(&config.gateway))
            .with_policy(SchedulingPolicy::from_config(&config.agent))
            .with_max_tool_steps(config.llm.max_tool_steps))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_policy(mut self, policy: SchedulingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_tool_steps(mut self, max_tool_steps: u32) -> Self {
        self.max_tool_steps = max_tool_steps;
        self
    }

    pub fn gateway(&self) -> &GatewayConnector {
        &self.gateway
    }

    pub async fn run(&self, instruction: &str, user: &UserContext) -> AgentResult {
        let correlation_id = Uuid::new_v4().to_string();
        info!(
            event_name = "agent.run.started",
            correlation_id = %correlation_id,
            user_email = %user.redacted_email(),
            "scheduling request received"
        );

        enter(AgentState::Init, &correlation_id);
        let temporal = TemporalContext::capture(self.clock.as_ref());

        enter(AgentState::Connecting, &correlation_id);
        let (guard, remote, status) = match self.connect(&correlation_id).await {
            Ok(connected) => connected,
            Err((error, status)) => {
                enter(AgentState::Cleanup, &correlation_id);
                return failure_result(&correlation_id, error, status);
            }
        };

        enter(AgentState::ToolsMerged, &correlation_id);
        let (tools, _) = ToolRegistry::merge(local_tools(), remote);
        let specs = tools.specs();
        let system_prompt = build_system_prompt(&PromptInputs {
            temporal: &temporal,
            user,
            policy: &self.policy,
            tools: &specs,
        });

        enter(AgentState::Invoking, &correlation_id);
        let generation = generate_text(
            self.llm.as_ref(),
            &system_prompt,
            instruction,
            &tools,
            self.max_tool_steps,
        )
        .await;

        let outcome = match generation {
            Ok(generation) => {
                enter(AgentState::Finalizing, &correlation_id);
                info!(
                    event_name = "agent.run.generated",
                    correlation_id = %correlation_id,
                    steps = generation.steps,
                    tool_calls = generation.tool_calls.len(),
                    "model produced final text"
                );
                Ok(format!("{}{}", generation.text, status_footer(&status)))
            }
            Err(error) => Err(ApplicationError::from(error)),
        };

        enter(AgentState::Cleanup, &correlation_id);
        guard.release(&correlation_id).await;

        match outcome {
            Ok(text) => {
                info!(event_name = "agent.run.completed", correlation_id = %correlation_id, "request completed");
                AgentResult { text, status_message: status.to_string(), error_class: None }
            }
            Err(error) => failure_result(&correlation_id, error, status),
        }
    }

    /// Opens the session and lists remote tools. Only a configuration problem
    /// ends the request; every other failure yields an empty remote set.
    async fn connect(
        &self,
        correlation_id: &str,
    ) -> Result<Connected, (ApplicationError, GatewayStatus)> {
        let session = match self.gateway.open().await {
            Ok(session) => session,
            Err(error) => {
                let status = GatewayStatus::from_error(&error);
                if error.is_configuration() {
                    return Err((ApplicationError::from(error), status));
                }
                warn!(
                    event_name = "agent.gateway.unavailable",
                    correlation_id,
                    error = %ApplicationError::from(error),
                    "continuing with local tools only"
                );
                return Ok((SessionGuard { session: None }, Vec::new(), status));
            }
        };

        let guard = SessionGuard { session: Some(Arc::clone(&session)) };
        match discover_tools(&session).await {
            Ok(tools) => {
                let names: Vec<String> =
                    tools.iter().map(|tool| tool.remote_name().to_owned()).collect();
                let wire_names: Vec<&str> = tools.iter().map(|tool| tool.name()).collect();
                info!(
                    event_name = "agent.gateway.tools",
                    correlation_id,
                    tools = %names.join(","),
                    offered_as = %wire_names.join(","),
                    "remote tools discovered"
                );
                let remote = tools.into_iter().map(|tool| Arc::new(tool) as Arc<dyn Tool>).collect();
                Ok((guard, remote, GatewayStatus::Connected { tools: names }))
            }
            Err(error) => {
                warn!(
                    event_name = "agent.gateway.discovery_failed",
                    correlation_id,
                    error = %ApplicationError::from(error),
                    "continuing with local tools only"
                );
                Ok((guard, Vec::new(), GatewayStatus::ToolsUnavailable))
            }
        }
    }
}

fn failure_result(correlation_id: &str, error: ApplicationError, status: GatewayStatus) -> AgentResult {
    warn!(
        event_name = "agent.run.failed",
        correlation_id,
        error_class = error.error_class(),
        error = %error,
        "request ended with an error"
    );
    AgentResult {
        text: error_text(&error, &status),
        status_message: status.to_string(),
        error_class: Some(error.error_class()),
    }
}

fn enter(state: AgentState, correlation_id: &str) {
    debug!(event_name = "agent.state", state = state.as_str(), correlation_id, "state transition");
}
