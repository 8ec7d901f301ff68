use async_trait::async_trait;
use thiserror::Error;

use crate::blocks::MessageTemplate;
use crate::commands::SlashCommandPayload;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseVisibility {
    /// Visible only to the invoking user.
    Ephemeral,
    InChannel,
}

impl ResponseVisibility {
    pub fn response_type(self) -> &'static str {
        match self {
            Self::Ephemeral => "ephemeral",
            Self::InChannel => "in_channel",
        }
    }
}

/// Where a reply for one command invocation goes. `response_url` is preferred
/// when Slack supplied one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplyTarget {
    pub channel_id: String,
    pub user_id: String,
    pub response_url: Option<String>,
}

impl ReplyTarget {
    pub fn from_command(payload: &SlashCommandPayload) -> Self {
        Self {
            channel_id: payload.channel_id.clone(),
            user_id: payload.user_id.clone(),
            response_url: payload.response_url.clone(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReplyError {
    #[error("reply delivery failed: {0}")]
    Delivery(String),
    #[error("slack rejected reply: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn deliver(
        &self,
        target: &ReplyTarget,
        message: &MessageTemplate,
        visibility: ResponseVisibility,
    ) -> Result<(), ReplyError>;
}
