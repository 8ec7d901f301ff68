use std::sync::Arc;

use async_trait::async_trait;
use huddle_core::UserContext;
use thiserror::Error;
use tracing::{info, warn};

use crate::blocks::{self, MessageTemplate};
use crate::profile::{resolve_requester, ProfileDirectory};
use crate::reply::{ReplySink, ReplyTarget, ResponseVisibility};

pub const SCHEDULE_COMMAND: &str = "/schedule";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlashCommandPayload {
    pub command: String,
    pub text: String,
    pub channel_id: String,
    pub user_id: String,
    pub trigger_id: String,
    pub request_id: String,
    pub response_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScheduleCommand {
    /// No scheduling details were given.
    Usage,
    Request { instruction: String },
}

/// What the agent produced for one request. Both fields are rendered verbatim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduleOutcome {
    pub text: String,
    pub status_message: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("unsupported slash command: {0}")]
    UnsupportedCommand(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandRouteError {
    #[error("scheduling service failed: {0}")]
    Service(String),
    #[error("reply could not be delivered: {0}")]
    Delivery(String),
}

pub fn parse_schedule_command(
    payload: &SlashCommandPayload,
) -> Result<ScheduleCommand, CommandParseError> {
    if payload.command != SCHEDULE_COMMAND {
        return Err(CommandParseError::UnsupportedCommand(payload.command.clone()));
    }

    let instruction = payload.text.trim();
    if instruction.is_empty() {
        return Ok(ScheduleCommand::Usage);
    }
    Ok(ScheduleCommand::Request { instruction: instruction.to_owned() })
}

#[async_trait]
pub trait SchedulingService: Send + Sync {
    async fn schedule(
        &self,
        instruction: &str,
        user: &UserContext,
    ) -> Result<ScheduleOutcome, CommandRouteError>;
}

/// Runs one `/schedule` invocation end to end: usage reply, requester lookup,
/// working notice, agent call and final reply.
pub struct CommandRouter {
    service: Arc<dyn SchedulingService>,
    profiles: Arc<dyn ProfileDirectory>,
    replies: Arc<dyn ReplySink>,
}

impl CommandRouter {
    pub fn new(
        service: Arc<dyn SchedulingService>,
        profiles: Arc<dyn ProfileDirectory>,
        replies: Arc<dyn ReplySink>,
    ) -> Self {
        Self { service, profiles, replies }
    }

    pub async fn route(
        &self,
        payload: &SlashCommandPayload,
        command: ScheduleCommand,
        correlation_id: &str,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let target = ReplyTarget::from_command(payload);

        let instruction = match command {
            ScheduleCommand::Usage => {
                let message = blocks::usage_message();
                self.send(&target, &message).await?;
                return Ok(message);
            }
            ScheduleCommand::Request { instruction } => instruction,
        };

        let requester =
            resolve_requester(self.profiles.as_ref(), &payload.user_id, correlation_id).await;

        if let Err(error) = self.send(&target, &blocks::working_message()).await {
            warn!(
                event_name = "slack.schedule.notice_failed",
                correlation_id,
                error = %error,
                "working notice not delivered; continuing"
            );
        }

        let message = match self.service.schedule(&instruction, &requester.context).await {
            Ok(outcome) => {
                info!(
                    event_name = "slack.schedule.completed",
                    correlation_id,
                    gateway_status = %outcome.status_message,
                    "scheduling request answered"
                );
                blocks::schedule_result_message(
                    &requester.context.display_name,
                    &instruction,
                    &outcome.text,
                )
            }
            Err(error) => {
                warn!(
                    event_name = "slack.schedule.failed",
                    correlation_id,
                    error = %error,
                    "scheduling service failed"
                );
                blocks::failure_message(&payload.request_id)
            }
        };

        self.send(&target, &message).await?;
        Ok(message)
    }

    async fn send(
        &self,
        target: &ReplyTarget,
        message: &MessageTemplate,
    ) -> Result<(), CommandRouteError> {
        self.replies
            .deliver(target, message, ResponseVisibility::Ephemeral)
            .await
            .map_err(|error| CommandRouteError::Delivery(error.to_string()))
    }
}
