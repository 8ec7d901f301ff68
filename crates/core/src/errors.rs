use thiserror::Error;

/// Failure classes that can occur while serving one agent request.
///
/// Only `Configuration` and `ModelInvocation` end a request early; the gateway
/// classes degrade to local-only tools, tool failures are handed back to the
/// model as data, and cleanup failures are logged.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("configuration failure: {0}")]
    Configuration(String),
    #[error("gateway connection failure: {0}")]
    GatewayConnection(String),
    #[error("tool discovery failure: {0}")]
    ToolDiscovery(String),
    #[error("tool `{tool}` failed: {message}")]
    ToolExecution { tool: String, message: String },
    #[error("model invocation failure: {0}")]
    ModelInvocation(String),
    #[error("cleanup failure: {0}")]
    Cleanup(String),
}

impl ApplicationError {
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::GatewayConnection(_)
            | Self::ToolDiscovery(_)
            | Self::ToolExecution { .. }
            | Self::Cleanup(_) => true,
            Self::Configuration(_) | Self::ModelInvocation(_) => false,
        }
    }

    /// Stable identifier used in structured logs and CLI output.
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::GatewayConnection(_) => "gateway_connection",
            Self::ToolDiscovery(_) => "tool_discovery",
            Self::ToolExecution { .. } => "tool_execution",
            Self::ModelInvocation(_) => "model_invocation",
            Self::Cleanup(_) => "cleanup",
        }
    }

    /// The underlying message without the class prefix.
    pub fn detail(&self) -> &str {
        match self {
            Self::Configuration(message)
            | Self::GatewayConnection(message)
            | Self::ToolDiscovery(message)
            | Self::ModelInvocation(message)
            | Self::Cleanup(message) => message,
            Self::ToolExecution { message, .. } => message,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Configuration(_) => {
                "The scheduling assistant is not fully configured. Please contact an administrator."
            }
            Self::GatewayConnection(_) | Self::ToolDiscovery(_) => {
                "Calendar tools are temporarily unavailable."
            }
            Self::ToolExecution { .. } => "One of the scheduling tools reported an error.",
            Self::ModelInvocation(_) => {
                "The language model could not complete the request. Please retry shortly."
            }
            Self::Cleanup(_) => "An internal cleanup step failed.",
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::ApplicationError;

    #[test]
    fn gateway_failures_are_recoverable() {
        assert!(ApplicationError::GatewayConnection("refused".to_owned()).is_recoverable());
        assert!(ApplicationError::ToolDiscovery("timeout".to_owned()).is_recoverable());
        assert!(ApplicationError::Cleanup("reset".to_owned()).is_recoverable());
    }

    #[test]
    fn configuration_and_model_failures_are_terminal() {
        assert!(!ApplicationError::Configuration("missing key".to_owned()).is_recoverable());
        assert!(!ApplicationError::ModelInvocation("quota".to_owned()).is_recoverable());
    }

    #[test]
    fn detail_strips_class_prefix() {
        let error = ApplicationError::ToolExecution {
            tool: "convert_timezone".to_owned(),
            message: "invalid date".to_owned(),
        };

        assert_eq!(error.detail(), "invalid date");
        assert_eq!(error.to_string(), "tool `convert_timezone` failed: invalid date");
        assert_eq!(error.error_class(), "tool_execution");
    }

    #[test]
    fn configuration_error_has_user_safe_message() {
        let error = ApplicationError::Configuration("API_KEY is not set".to_owned());
        assert!(!error.user_message().contains("API_KEY"));
    }
}
