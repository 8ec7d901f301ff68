//! Slack Web API over HTTP: socket URL, user lookup and reply delivery.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::blocks::MessageTemplate;
use crate::profile::{ProfileDirectory, ProfileError, SlackUser};
use crate::reply::{ReplyError, ReplySink, ReplyTarget, ResponseVisibility};

pub const SLACK_API_BASE: &str = "https://slack.com/api";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SlackApiError {
    #[error("slack http client could not be built: {0}")]
    Client(String),
    #[error("slack request `{method}` failed: {message}")]
    Transport { method: String, message: String },
    #[error("slack method `{method}` returned error `{error}`")]
    Api { method: String, error: String },
    #[error("slack method `{method}` returned an unexpected body: {message}")]
    Malformed { method: String, message: String },
}

pub struct SlackWebClient {
    http: reqwest::Client,
    api_base: String,
    app_token: SecretString,
    bot_token: SecretString,
}

impl SlackWebClient {
    pub fn new(app_token: SecretString, bot_token: SecretString) -> Result<Self, SlackApiError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|error| SlackApiError::Client(error.to_string()))?;
        Ok(Self { http, api_base: SLACK_API_BASE.to_owned(), app_token, bot_token })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_owned();
        self
    }

    /// `apps.connections.open`: a fresh socket-mode WebSocket URL. Uses the
    /// app-level token.
    pub async fn open_socket_url(&self) -> Result<String, SlackApiError> {
        const METHOD: &str = "apps.connections.open";
        let body = self.call_form(METHOD, &self.app_token, &[]).await?;
        body.get("url").and_then(Value::as_str).map(str::to_owned).ok_or_else(|| {
            SlackApiError::Malformed { method: METHOD.to_owned(), message: "missing `url`".to_owned() }
        })
    }

    pub async fn users_info(&self, user_id: &str) -> Result<SlackUser, SlackApiError> {
        const METHOD: &str = "users.info";
        let mut body = self.call_form(METHOD, &self.bot_token, &[("user", user_id)]).await?;
        serde_json::from_value(body["user"].take()).map_err(|error| SlackApiError::Malformed {
            method: METHOD.to_owned(),
            message: error.to_string(),
        })
    }

    async fn call_form(
        &self,
        method: &str,
        token: &SecretString,
        form: &[(&str, &str)],
    ) -> Result<Value, SlackApiError> {
        let request = self
            .http
            .post(format!("{}/{method}", self.api_base))
            .bearer_auth(token.expose_secret())
            .form(form);
        self.execute(method, request).await
    }

    async fn call_json(&self, method: &str, body: &Value) -> Result<Value, SlackApiError> {
        let request = self
            .http
            .post(format!("{}/{method}", self.api_base))
            .bearer_auth(self.bot_token.expose_secret())
            .json(body);
        self.execute(method, request).await
    }

    async fn execute(
        &self,
        method: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<Value, SlackApiError> {
        let response = request.send().await.map_err(|error| SlackApiError::Transport {
            method: method.to_owned(),
            message: error.to_string(),
        })?;
        let body: Value = response.json().await.map_err(|error| SlackApiError::Malformed {
            method: method.to_owned(),
            message: error.to_string(),
        })?;
        check_ok(method, body)
    }
}

fn check_ok(method: &str, body: Value) -> Result<Value, SlackApiError> {
    if body.get("ok").and_then(Value::as_bool) == Some(true) {
        return Ok(body);
    }
    let error = body.get("error").and_then(Value::as_str).unwrap_or("unknown").to_owned();
    Err(SlackApiError::Api { method: method.to_owned(), error })
}

/// Body for a command `response_url`. Follow-ups never replace the
/// original message.
pub fn response_url_body(message: &MessageTemplate, visibility: ResponseVisibility) -> Value {
    let mut body = message.to_payload();
    body["response_type"] = json!(visibility.response_type());
    body["replace_original"] = json!(false);
    body
}

/// `chat.postEphemeral` or `chat.postMessage`, with the matching body.
pub fn chat_post_body(
    target: &ReplyTarget,
    message: &MessageTemplate,
    visibility: ResponseVisibility,
) -> (&'static str, Value) {
    let mut body = message.to_payload();
    body["channel"] = json!(target.channel_id);
    match visibility {
        ResponseVisibility::Ephemeral => {
            body["user"] = json!(target.user_id);
            ("chat.postEphemeral", body)
        }
        ResponseVisibility::InChannel => ("chat.postMessage", body),
    }
}

#[async_trait]
impl ProfileDirectory for SlackWebClient {
    async fn user_info(&self, user_id: &str) -> Result<SlackUser, ProfileError> {
        match self.users_info(user_id).await {
            Ok(user) => Ok(user),
            Err(SlackApiError::Api { error, .. }) if error == "user_not_found" => {
                Err(ProfileError::NotFound(user_id.to_owned()))
            }
            Err(error) => Err(ProfileError::Lookup(error.to_string())),
        }
    }
}

#[async_trait]
impl ReplySink for SlackWebClient {
    async fn deliver(
        &self,
        target: &ReplyTarget,
        message: &MessageTemplate,
        visibility: ResponseVisibility,
    ) -> Result<(), ReplyError> {
        if let Some(response_url) = &target.response_url {
            let response = self
                .http
                .post(response_url)
                .json(&response_url_body(message, visibility))
                .send()
                .await
                .map_err(|error| ReplyError::Delivery(error.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                return Err(ReplyError::Rejected(format!("response_url returned HTTP {status}")));
            }
            debug!(event_name = "slack.reply.sent", via = "response_url", "reply delivered");
            return Ok(());
        }

        let (method, body) = chat_post_body(target, message, visibility);
        self.call_json(method, &body).await.map_err(|error| match error {
            SlackApiError::Api { .. } => ReplyError::Rejected(error.to_string()),
            other => ReplyError::Delivery(other.to_string()),
        })?;
        debug!(event_name = "slack.reply.sent", via = method, "reply delivered");
        Ok(())
    }
}
