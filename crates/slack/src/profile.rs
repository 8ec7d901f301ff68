//! Requester identity from Slack `users.info`.

use async_trait::async_trait;
use huddle_core::{resolve_user_context, NameSource, ResolvedIdentity, UserContext, UserProfile};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

/// The `user` object of a `users.info` response, reduced to the fields used
/// for naming the organizer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SlackUser {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub real_name: Option<String>,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub profile: SlackUserProfile,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SlackUserProfile {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub real_name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl SlackUser {
    /// Profile-level real name wins over the account-level one.
    pub fn to_profile(&self) -> UserProfile {
        let real_name = self
            .profile
            .real_name
            .clone()
            .filter(|value| !value.trim().is_empty())
            .or_else(|| self.real_name.clone());

        UserProfile {
            first_name: self.profile.first_name.clone(),
            last_name: self.profile.last_name.clone(),
            real_name,
            display_name: self.profile.display_name.clone(),
            handle: self.name.clone(),
            email: self.profile.email.clone(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProfileError {
    #[error("profile lookup failed: {0}")]
    Lookup(String),
    #[error("user `{0}` was not found")]
    NotFound(String),
}

#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    async fn user_info(&self, user_id: &str) -> Result<SlackUser, ProfileError>;
}

/// Never fails: a lookup error yields the generic `User` identity with an
/// empty email.
pub async fn resolve_requester(
    directory: &dyn ProfileDirectory,
    user_id: &str,
    correlation_id: &str,
) -> ResolvedIdentity {
    let user = match directory.user_info(user_id).await {
        Ok(user) => user,
        Err(error) => {
            warn!(
                event_name = "slack.profile.lookup_failed",
                correlation_id,
                user_id,
                error = %error,
                "using fallback identity"
            );
            return ResolvedIdentity {
                context: UserContext::anonymous(),
                name_source: NameSource::Fallback,
            };
        }
    };

    let resolved = resolve_user_context(&user.to_profile());
    debug!(
        event_name = "slack.profile.resolved",
        correlation_id,
        user_id,
        name_source = ?resolved.name_source,
        email = %resolved.context.redacted_email(),
        is_bot = user.is_bot,
        deleted = user.deleted,
        "requester identity resolved"
    );
    if !resolved.context.organizer_known() {
        warn!(
            event_name = "slack.profile.no_email",
            correlation_id,
            user_id,
            "requester has no email on file"
        );
    }
    resolved
}
