use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolProvenance {
    Local,
    Remote,
}

/// What the model sees for one tool: name, description and a JSON schema for
/// its parameters.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Result of one tool invocation. Failures are data so the model can read the
/// message and adjust its plan.
#[derive(Clone, Debug, PartialEq)]
pub enum ToolOutput {
    Success(Value),
    Failure { message: String },
}

impl ToolOutput {
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure { message: message.into() }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    /// JSON value handed back to the model; failures become `{"error": ...}`.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Success(value) => value.clone(),
            Self::Failure { message } => json!({ "error": message }),
        }
    }

    pub fn to_model_content(&self) -> String {
        match self {
            Self::Success(Value::String(text)) => text.clone(),
            other => other.to_value().to_string(),
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> Value;
    fn provenance(&self) -> ToolProvenance;
    async fn invoke(&self, params: Value) -> ToolOutput;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_owned(),
            description: self.description().to_owned(),
            parameters: self.parameters(),
        }
    }
}
