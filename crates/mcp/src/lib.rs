//! Huddle MCP (Model Context Protocol) gateway client
//!
//! This crate connects to a remote tool server over the streamable HTTP
//! transport and exposes the server's catalog as ordinary [`Tool`]s.
//!
//! ## Architecture
//!
//! - `GatewayConnector`: validates credentials, opens one session per request
//!   with a bounded handshake
//! - `GatewaySession`: JSON-RPC calls (`tools/list`, `tools/call`) and teardown
//! - `RemoteTool`: adapter from a catalog entry to the shared tool contract,
//!   offered under a provider-safe wire name
//! - `transport`: the HTTP wire layer, swappable for tests
//!
//! Sessions are never shared across requests and are closed at most once.
//!
//! [`Tool`]: huddle_core::Tool

mod auth;
mod client;
pub mod protocol;
mod status;
mod tools;
pub mod transport;

pub use auth::GatewayCredentials;
pub use client::{session_token, GatewayConnector, GatewaySession, GatewaySettings};
pub use status::GatewayStatus;
pub use tools::{discover_tools, wire_name, RemoteTool, MAX_WIRE_NAME_LEN};
pub use transport::{GatewayTransport, HttpTransportFactory, TransportFactory, TransportResponse};

use huddle_core::ApplicationError;
use thiserror::Error;

/// Errors raised while talking to the remote tool server
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("{0}")]
    Configuration(String),

    #[error("MCP server connection failed: {0}")]
    Connection(String),

    #[error("MCP server did not complete the handshake within {0}s")]
    Timeout(u64),

    #[error("MCP protocol error: {0}")]
    Protocol(String),

    #[error("MCP tool discovery failed: {0}")]
    Discovery(String),

    #[error("MCP tool `{tool}` failed: {message}")]
    Invocation { tool: String, message: String },

    #[error("MCP session close failed: {0}")]
    Close(String),
}

impl GatewayError {
    /// True for failures that should fail the request instead of degrading
    /// to local-only tools.
    pub fn is_configuration(&self) -> bool {
        matches!(self, GatewayError::Configuration(_))
    }
}

impl From<GatewayError> for ApplicationError {
    fn from(value: GatewayError) -> Self {
        let message = value.to_string();
        match value {
            GatewayError::Configuration(_) => ApplicationError::Configuration(message),
            GatewayError::Connection(_) | GatewayError::Timeout(_) | GatewayError::Protocol(_) => {
                ApplicationError::GatewayConnection(message)
            }
            GatewayError::Discovery(_) => ApplicationError::ToolDiscovery(message),
            GatewayError::Invocation { tool, message } => {
                ApplicationError::ToolExecution { tool, message }
            }
            GatewayError::Close(_) => ApplicationError::Cleanup(message),
        }
    }
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use huddle_core::ApplicationError;

    use crate::GatewayError;

    #[test]
    fn maps_gateway_errors_onto_application_taxonomy() {
        let mapped: ApplicationError = GatewayError::Timeout(10).into();
        assert!(matches!(mapped, ApplicationError::GatewayConnection(_)));
        assert!(mapped.is_recoverable());

        let mapped: ApplicationError =
            GatewayError::Configuration("gateway api key is not configured".to_owned()).into();
        assert!(matches!(mapped, ApplicationError::Configuration(_)));
        assert!(!mapped.is_recoverable());

        let mapped: ApplicationError = GatewayError::Close("reset".to_owned()).into();
        assert!(matches!(mapped, ApplicationError::Cleanup(_)));
    }
}
