use std::fmt;

use serde::Serialize;

use crate::GatewayError;

/// Gateway condition shown to the user at the end of every reply.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GatewayStatus {
    #[default]
    NotConnected,
    Connected { tools: Vec<String> },
    ToolsUnavailable,
    ConnectionFailed { message: String },
    Misconfigured { message: String },
}

impl GatewayStatus {
    pub fn from_error(error: &GatewayError) -> Self {
        match error {
            GatewayError::Configuration(message) => Self::Misconfigured { message: message.clone() },
            other => Self::ConnectionFailed { message: other.to_string() },
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. } | Self::ToolsUnavailable)
    }
}

impl fmt::Display for GatewayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => f.write_str("Not connected"),
            Self::Connected { tools } => {
                write!(f, "✅ Connected with {} tools: {}", tools.len(), tools.join(", "))
            }
            Self::ToolsUnavailable => f.write_str("⚠️ Connected but tools unavailable"),
            Self::ConnectionFailed { message } => write!(f, "❌ Connection failed: {message}"),
            Self::Misconfigured { message } => write!(f, "⚙️ Configuration error: {message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::GatewayStatus;
    use crate::GatewayError;

    #[test]
    fn renders_each_state() {
        assert_eq!(GatewayStatus::default().to_string(), "Not connected");
        assert_eq!(
            GatewayStatus::Connected {
                tools: vec!["users.search".to_owned(), "calendar.create_event".to_owned()]
            }
            .to_string(),
            "✅ Connected with 2 tools: users.search, calendar.create_event"
        );
        assert_eq!(GatewayStatus::ToolsUnavailable.to_string(), "⚠️ Connected but tools unavailable");
    }

    #[test]
    fn classifies_errors() {
        let status = GatewayStatus::from_error(&GatewayError::Configuration("no key".to_owned()));
        assert_eq!(status.to_string(), "⚙️ Configuration error: no key");
        assert!(!status.is_connected());

        let status = GatewayStatus::from_error(&GatewayError::Timeout(10));
        assert_eq!(
            status.to_string(),
            "❌ Connection failed: MCP server did not complete the handshake within 10s"
        );
    }
}
