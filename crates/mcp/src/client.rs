//! Gateway sessions
//!
//! One [`GatewaySession`] is opened per scheduling request and closed when the
//! request finishes, whatever the outcome.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use huddle_core::config::GatewayConfig;
use secrecy::SecretString;
use serde_json::{json, Value};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::GatewayCredentials;
use crate::protocol::{
    initialize_params, CallToolResult, JsonRpcRequest, JsonRpcResponse, ListToolsResult,
    RemoteToolSpec,
};
use crate::transport::{GatewayTransport, HttpTransportFactory, TransportFactory};
use crate::GatewayError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Unique per-request session token: `{prefix}_{32 hex chars}`.
pub fn session_token(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

#[derive(Clone, Debug)]
pub struct GatewaySettings {
    pub url: String,
    pub api_key: Option<SecretString>,
    pub api_key_header: String,
    pub connect_timeout: Duration,
    pub client_name: String,
    pub client_version: String,
    pub session_prefix: String,
}

impl GatewaySettings {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            url: config.url.clone(),
            api_key: config.api_key.clone(),
            api_key_header: config.api_key_header.clone(),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            client_name: config.client_name.clone(),
            client_version: env!("CARGO_PKG_VERSION").to_owned(),
            session_prefix: config.session_prefix.clone(),
        }
    }
}

#[derive(Clone)]
pub struct GatewayConnector {
    settings: GatewaySettings,
    transports: Arc<dyn TransportFactory>,
}

impl GatewayConnector {
    pub fn new(settings: GatewaySettings, transports: Arc<dyn TransportFactory>) -> Self {
        Self { settings, transports }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        let settings = GatewaySettings::from_config(config);
        let transports = Arc::new(HttpTransportFactory::new(settings.url.clone(), REQUEST_TIMEOUT));
        Self::new(settings, transports)
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    /// Validates credentials, then runs the `initialize` handshake within the
    /// connect timeout. A missing key fails here without any network traffic.
    pub async fn open(&self) -> Result<Arc<GatewaySession>, GatewayError> {
        let credentials = GatewayCredentials::resolve(
            self.settings.api_key.as_ref(),
            &self.settings.api_key_header,
        )?;
        let transport = self.transports.build(&credentials)?;
        let token = session_token(&self.settings.session_prefix);

        debug!(
            event_name = "gateway.session.connecting",
            url = %self.settings.url,
            session_id = %token,
            "opening gateway session"
        );

        let session = handshake(transport, token, &self.settings).await?;

        info!(
            event_name = "gateway.session.opened",
            session_id = %session.session_id(),
            "gateway session established"
        );
        Ok(Arc::new(session))
    }
}

/// `initialize` then `notifications/initialized`, both within one connect
/// deadline. Once `initialize` has been answered the server may hold a
/// session, so any later failure terminates it before returning.
async fn handshake(
    transport: Arc<dyn GatewayTransport>,
    token: String,
    settings: &GatewaySettings,
) -> Result<GatewaySession, GatewayError> {
    let timeout_secs = settings.connect_timeout.as_secs();
    let deadline = Instant::now() + settings.connect_timeout;

    let initialize = JsonRpcRequest::call(
        0,
        "initialize",
        initialize_params(&settings.client_name, &settings.client_version),
    );
    let mut reply = timeout_at(deadline, transport.send(&initialize, &token))
        .await
        .map_err(|_| GatewayError::Timeout(timeout_secs))??;
    let session_id = reply.assigned_session_id.take().unwrap_or(token);
    let message = reply.message.take();

    let finished = timeout_at(deadline, async {
        accept_initialize(message)?;
        let initialized = JsonRpcRequest::notification("notifications/initialized", json!({}));
        transport.send(&initialized, &session_id).await.map(|_| ())
    })
    .await
    .unwrap_or(Err(GatewayError::Timeout(timeout_secs)));

    if let Err(error) = finished {
        abandon(transport.as_ref(), &session_id).await;
        return Err(error);
    }

    Ok(GatewaySession {
        transport,
        session_id,
        next_id: AtomicU64::new(1),
        closed: AtomicBool::new(false),
    })
}

fn accept_initialize(message: Option<JsonRpcResponse>) -> Result<(), GatewayError> {
    let result = message
        .ok_or_else(|| GatewayError::Protocol("initialize returned no reply".to_owned()))?
        .into_result()?;
    if result.get("protocolVersion").and_then(Value::as_str).is_none() {
        return Err(GatewayError::Protocol("initialize reply lacks protocolVersion".to_owned()));
    }
    Ok(())
}

async fn abandon(transport: &dyn GatewayTransport, session_id: &str) {
    match transport.terminate(session_id).await {
        Ok(()) => debug!(
            event_name = "gateway.session.abandoned",
            session_id = %session_id,
            "released half-open session"
        ),
        Err(error) => warn!(
            event_name = "gateway.session.abandon_failed",
            session_id = %session_id,
            error = %error,
            "could not release half-open session"
        ),
    }
}

pub struct GatewaySession {
    transport: Arc<dyn GatewayTransport>,
    session_id: String,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl GatewaySession {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, GatewayError> {
        if self.is_closed() {
            return Err(GatewayError::Protocol("session is already closed".to_owned()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest::call(id, method, params);
        let reply = self.transport.send(&request, &self.session_id).await?;
        reply
            .message
            .ok_or_else(|| GatewayError::Protocol(format!("`{method}` returned no reply")))?
            .into_result()
    }

    /// One `tools/list` round trip.
    pub async fn list_tools(&self) -> Result<Vec<RemoteToolSpec>, GatewayError> {
        let result = self
            .request("tools/list", json!({}))
            .await
            .map_err(|error| GatewayError::Discovery(error.to_string()))?;
        let listed: ListToolsResult = serde_json::from_value(result)
            .map_err(|error| GatewayError::Discovery(format!("malformed tool catalog: {error}")))?;
        Ok(listed.tools)
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, GatewayError> {
        let invocation_error =
            |message: String| GatewayError::Invocation { tool: name.to_owned(), message };

        let arguments = match arguments {
            Value::Null => json!({}),
            other => other,
        };
        let result = self
            .request("tools/call", json!({ "name": name, "arguments": arguments }))
            .await
            .map_err(|error| invocation_error(error.to_string()))?;
        serde_json::from_value(result)
            .map_err(|error| invocation_error(format!("malformed tool result: {error}")))
    }

    /// Ends the session. Only the first call reaches the server; later calls
    /// return `Ok(())`.
    pub async fn close(&self) -> Result<(), GatewayError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.transport.terminate(&self.session_id).await?;
        debug!(
            event_name = "gateway.session.closed",
            session_id = %self.session_id,
            "gateway session closed"
        );
        Ok(())
    }
}
