//! Model client and tool-calling loop.
//!
//! Every supported provider speaks the OpenAI chat-completions dialect, so a
//! single HTTP client covers Groq, OpenAI and local Ollama.

use std::time::Duration;

use async_trait::async_trait;
use huddle_core::config::LlmConfig;
use huddle_core::{ApplicationError, ToolOutput, ToolSpec};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::tools::ToolRegistry;

const MAX_ERROR_BODY_CHARS: usize = 300;
const MAX_DEBUG_BODY_CHARS: usize = 2000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("model provider rejected the credentials (HTTP {status})")]
    Auth { status: u16 },
    #[error("model provider rate limited the request{}", retry_hint(.retry_after_secs))]
    RateLimit { retry_after_secs: Option<u64> },
    #[error("model provider is unavailable (HTTP {status}): {message}")]
    Server { status: u16, message: String },
    #[error("model provider refused the request (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("model provider unreachable: {0}")]
    Network(String),
    #[error("malformed model response: {0}")]
    Malformed(String),
    #[error("model did not produce a final answer within {0} steps")]
    StepLimit(u32),
    #[error("invalid model configuration: {0}")]
    Configuration(String),
}

fn retry_hint(retry_after_secs: &Option<u64>) -> String {
    retry_after_secs.map(|secs| format!(" (retry after {secs}s)")).unwrap_or_default()
}

impl LlmError {
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 | 403 => Self::Auth { status },
            429 => Self::RateLimit { retry_after_secs: extract_retry_after(body) },
            500..=599 => Self::Server { status, message: truncate(body, MAX_ERROR_BODY_CHARS) },
            _ => Self::Rejected { status, message: truncate(body, MAX_ERROR_BODY_CHARS) },
        }
    }

    fn network(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Network("request timed out".to_owned())
        } else {
            Self::Network(error.to_string())
        }
    }
}

impl From<LlmError> for ApplicationError {
    fn from(value: LlmError) -> Self {
        ApplicationError::ModelInvocation(value.to_string())
    }
}

fn extract_retry_after(body: &str) -> Option<u64> {
    let value: Value = serde_json::from_str(body).ok()?;
    let field = value["error"].get("retry_after").or_else(|| value.get("retry_after"))?;
    field.as_u64().or_else(|| field.as_f64().map(|secs| secs.ceil() as u64))
}

fn truncate(body: &str, max_chars: usize) -> String {
    let mut truncated: String = body.chars().take(max_chars).collect();
    if truncated.len() < body.len() {
        truncated.push_str("...");
    }
    truncated
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded argument object, exactly as the model produced it.
    #[serde(default)]
    pub arguments: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

fn function_kind() -> String {
    "function".to_owned()
}

impl ToolCall {
    pub fn function(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            kind: function_kind(),
            function: FunctionCall { name: name.into(), arguments: arguments.to_string() },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn text(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: Some(content.into()), tool_calls: Vec::new(), tool_call_id: None }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    pub fn assistant_tool_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self { role: Role::Assistant, content, tool_calls, tool_call_id: None }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// One assistant turn: final text, tool calls, or both.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChatResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<ChatResponse, LlmError>;
}

pub struct OpenAiCompatibleClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
}

/// HTTPS everywhere; plain HTTP only for a model server on this machine.
fn validate_base_url(base_url: &str) -> Result<(), LlmError> {
    let parsed = reqwest::Url::parse(base_url)
        .map_err(|error| LlmError::Configuration(format!("invalid base_url `{base_url}`: {error}")))?;
    let host = parsed.host_str().unwrap_or_default();

    match parsed.scheme() {
        "https" => Ok(()),
        "http" if matches!(host, "localhost" | "127.0.0.1" | "[::1]" | "::1") => Ok(()),
        "http" => Err(LlmError::Configuration(format!(
            "plain HTTP is only allowed for localhost (base_url `{base_url}`)"
        ))),
        scheme => Err(LlmError::Configuration(format!("unsupported URL scheme `{scheme}`"))),
    }
}

impl OpenAiCompatibleClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let base_url = config.effective_base_url();
        validate_base_url(base_url)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| LlmError::Configuration(format!("failed to build HTTP client: {error}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Deserialize)]
struct CompletionBody {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<ChatResponse, LlmError> {
        let mut body = json!({
            "model": self.model,
            "messages": messages,
        });
        if !tools.is_empty() {
            body["tools"] = tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters,
                        }
                    })
                })
                .collect();
            body["tool_choice"] = json!("auto");
        }

        let url = format!("{}/chat/completions", self.base_url);
        info!(
            event_name = "llm.request",
            model = %self.model,
            messages = messages.len(),
            tools = tools.len(),
            "calling model"
        );

        let mut request = self.client.post(&url).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }
        let response = request.send().await.map_err(|error| {
            error!(event_name = "llm.request.failed", error = %error, "model request failed");
            LlmError::network(&error)
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|error| LlmError::network(&error))?;
        if !status.is_success() {
            error!(event_name = "llm.response.error", status = status.as_u16(), "model provider error");
            return Err(LlmError::from_status(status.as_u16(), &text));
        }
        debug!(
            event_name = "llm.response",
            body = %truncate(&text, MAX_DEBUG_BODY_CHARS),
            "model response"
        );

        let parsed: CompletionBody = serde_json::from_str(&text)
            .map_err(|error| LlmError::Malformed(error.to_string()))?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Malformed("no choices in response".to_owned()))?;

        Ok(ChatResponse {
            content: choice.message.content,
            tool_calls: choice.message.tool_calls.unwrap_or_default(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolCallRecord {
    pub name: String,
    pub failed: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub steps: u32,
    pub tool_calls: Vec<ToolCallRecord>,
}

/// Runs the model until it answers without requesting tools.
///
/// Every tool call in a turn is dispatched through `tools` in the order the
/// model listed them and its output is fed back as a `tool` message. Fails
/// with [`LlmError::StepLimit`] once `max_steps` model turns have passed.
pub async fn generate_text(
    client: &dyn LlmClient,
    system: &str,
    prompt: &str,
    tools: &ToolRegistry,
    max_steps: u32,
) -> Result<Generation, LlmError> {
    let specs = tools.specs();
    let mut messages = vec![ChatMessage::system(system), ChatMessage::user(prompt)];
    let mut records = Vec::new();

    for step in 1..=max_steps {
        let response = client.complete(&messages, &specs).await?;

        if response.tool_calls.is_empty() {
            let text = strip_thinking(response.content.as_deref().unwrap_or_default());
            return Ok(Generation { text, steps: step, tool_calls: records });
        }

        messages.push(ChatMessage::assistant_tool_calls(
            response.content.clone(),
            response.tool_calls.clone(),
        ));
        for call in response.tool_calls {
            let output = match parse_arguments(&call.function.arguments) {
                Ok(params) => tools.dispatch(&call.function.name, params).await,
                Err(message) => {
                    warn!(
                        event_name = "llm.tool_call.bad_arguments",
                        tool = %call.function.name,
                        "model sent unparseable tool arguments"
                    );
                    ToolOutput::failure(message)
                }
            };
            records.push(ToolCallRecord {
                name: call.function.name.clone(),
                failed: output.is_failure(),
            });
            messages.push(ChatMessage::tool_result(call.id, output.to_model_content()));
        }
    }

    Err(LlmError::StepLimit(max_steps))
}

fn parse_arguments(raw: &str) -> Result<Value, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(json!({}));
    }
    serde_json::from_str(trimmed).map_err(|error| format!("Invalid tool arguments: {error}"))
}

/// Removes `<think>...</think>` reasoning blocks. An unterminated block
/// swallows the rest of the text.
pub fn strip_thinking(text: &str) -> String {
    const OPEN: &str = "<think>";
    const CLOSE: &str = "</think>";

    let mut remaining = text;
    let mut kept = String::with_capacity(text.len());
    while let Some(start) = remaining.find(OPEN) {
        kept.push_str(&remaining[..start]);
        match remaining[start..].find(CLOSE) {
            Some(end) => remaining = &remaining[start + end + CLOSE.len()..],
            None => {
                remaining = "";
                break;
            }
        }
    }
    kept.push_str(remaining);
    kept.trim().to_owned()
}
