//! Streamable HTTP transport.
//!
//! Every JSON-RPC message is an HTTP POST to the gateway URL. The session is
//! identified by the `Mcp-Session-Id` header and torn down with a DELETE.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use tracing::debug;

use crate::auth::GatewayCredentials;
use crate::protocol::{decode_body, JsonRpcRequest, JsonRpcResponse, SESSION_HEADER};
use crate::GatewayError;

const MAX_ERROR_BODY_CHARS: usize = 200;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransportResponse {
    /// Session id the server asked the client to use from now on.
    pub assigned_session_id: Option<String>,
    /// `None` for accepted notifications.
    pub message: Option<JsonRpcResponse>,
}

#[async_trait]
pub trait GatewayTransport: Send + Sync {
    async fn send(
        &self,
        request: &JsonRpcRequest,
        session_id: &str,
    ) -> Result<TransportResponse, GatewayError>;

    async fn terminate(&self, session_id: &str) -> Result<(), GatewayError>;
}

/// Builds a transport once credentials have been validated.
pub trait TransportFactory: Send + Sync {
    fn build(&self, credentials: &GatewayCredentials) -> Result<Arc<dyn GatewayTransport>, GatewayError>;
}

#[derive(Clone, Debug)]
pub struct HttpTransportFactory {
    url: String,
    request_timeout: Duration,
}

impl HttpTransportFactory {
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Self {
        Self { url: url.into(), request_timeout }
    }
}

impl TransportFactory for HttpTransportFactory {
    fn build(&self, credentials: &GatewayCredentials) -> Result<Arc<dyn GatewayTransport>, GatewayError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(credentials.header_name().clone(), credentials.header_value()?);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(self.request_timeout)
            .build()
            .map_err(|error| GatewayError::Connection(format!("failed to build HTTP client: {error}")))?;

        Ok(Arc::new(HttpTransport { client, url: self.url.clone() }))
    }
}

pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

#[async_trait]
impl GatewayTransport for HttpTransport {
    async fn send(
        &self,
        request: &JsonRpcRequest,
        session_id: &str,
    ) -> Result<TransportResponse, GatewayError> {
        debug!(
            event_name = "gateway.transport.send",
            method = %request.method,
            notification = request.is_notification(),
            "posting JSON-RPC message"
        );

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json, text/event-stream")
            .header(SESSION_HEADER, session_id)
            .json(request)
            .send()
            .await
            .map_err(|error| GatewayError::Connection(describe_reqwest_error(&error)))?;

        let status = response.status();
        let assigned_session_id = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = response
            .text()
            .await
            .map_err(|error| GatewayError::Connection(describe_reqwest_error(&error)))?;

        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        let message = match request.id {
            None => None,
            Some(_) if status == StatusCode::ACCEPTED || body.trim().is_empty() => {
                return Err(GatewayError::Protocol(format!(
                    "`{}` received an empty reply",
                    request.method
                )));
            }
            Some(id) => Some(decode_body(content_type.as_deref(), &body, id)?),
        };

        Ok(TransportResponse { assigned_session_id, message })
    }

    async fn terminate(&self, session_id: &str) -> Result<(), GatewayError> {
        let response = self
            .client
            .delete(&self.url)
            .header(SESSION_HEADER, session_id)
            .send()
            .await
            .map_err(|error| GatewayError::Close(describe_reqwest_error(&error)))?;

        let status = response.status();
        // 405 means the server does not support explicit termination.
        if status.is_success() || status == StatusCode::METHOD_NOT_ALLOWED {
            return Ok(());
        }
        Err(GatewayError::Close(format!("server answered HTTP {}", status.as_u16())))
    }
}

fn status_error(status: StatusCode, body: &str) -> GatewayError {
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        return GatewayError::Connection(format!(
            "authentication rejected (HTTP {})",
            status.as_u16()
        ));
    }

    let snippet: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    GatewayError::Connection(format!("HTTP {}: {}", status.as_u16(), snippet.trim()))
}

fn describe_reqwest_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "request timed out".to_owned()
    } else if error.is_connect() {
        format!("could not reach server: {error}")
    } else {
        error.to_string()
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::status_error;
    use crate::GatewayError;

    #[test]
    fn auth_failures_do_not_echo_body() {
        let error = status_error(StatusCode::UNAUTHORIZED, "invalid key abc123");
        assert_eq!(
            error,
            GatewayError::Connection("authentication rejected (HTTP 401)".to_owned())
        );
    }

    #[test]
    fn other_failures_carry_truncated_body() {
        let body = "x".repeat(500);
        let GatewayError::Connection(message) = status_error(StatusCode::BAD_GATEWAY, &body) else {
            panic!("expected connection error");
        };
        assert!(message.starts_with("HTTP 502: "));
        assert_eq!(message.len(), "HTTP 502: ".len() + 200);
    }
}
