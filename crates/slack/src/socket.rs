use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::{net::TcpStream, sync::Mutex, task::JoinSet};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::commands::SlashCommandPayload;
use crate::events::{EventContext, EventDispatcher, SlackEnvelope, SlackEvent};
use crate::web::SlackWebClient;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// `next_envelope` returning `Ok(None)` means the stream ended for good;
/// a dropped connection that should be retried is an error.
#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

pub struct SocketModeRunner {
    transport: Arc<dyn SocketTransport>,
    dispatcher: Arc<EventDispatcher>,
    reconnect_policy: ReconnectPolicy,
}

struct PumpFailure {
    error: TransportError,
    connected: bool,
}

impl SocketModeRunner {
    pub fn new(
        transport: Arc<dyn SocketTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher: Arc::new(dispatcher), reconnect_policy }
    }

    /// Pumps envelopes until the transport ends or retries are exhausted.
    /// A connection that was established resets the retry budget. Handlers
    /// still running when the loop ends are awaited before returning.
    pub async fn start(&self) {
        let mut handlers = JoinSet::new();
        let mut failures = 0_u32;

        loop {
            match self.connect_and_pump(failures, &mut handlers).await {
                Ok(()) => break,
                Err(PumpFailure { error, connected }) => {
                    if connected {
                        failures = 0;
                    }
                    warn!(
                        attempt = failures,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %error,
                        "socket mode transport failed"
                    );

                    if failures >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "socket mode retries exhausted; continuing process without crash"
                        );
                        break;
                    }

                    let delay = self.reconnect_policy.backoff(failures);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    failures += 1;
                }
            }
        }

        while handlers.join_next().await.is_some() {}
    }

    async fn connect_and_pump(
        &self,
        attempt: u32,
        handlers: &mut JoinSet<()>,
    ) -> Result<(), PumpFailure> {
        info!(attempt, "opening socket mode transport connection");
        self.transport
            .connect()
            .await
            .map_err(|error| PumpFailure { error, connected: false })?;
        info!(attempt, "socket mode transport connected");

        loop {
            while handlers.try_join_next().is_some() {}

            let envelope = self
                .transport
                .next_envelope()
                .await
                .map_err(|error| PumpFailure { error, connected: true })?;
            let Some(envelope) = envelope else {
                info!(attempt, "socket mode transport stream closed");
                return self
                    .transport
                    .disconnect()
                    .await
                    .map_err(|error| PumpFailure { error, connected: true });
            };
            let (command, user_id) = correlation_fields(&envelope);

            info!(
                event_name = "ingress.slack.envelope_received",
                envelope_id = %envelope.envelope_id,
                event_type = ?envelope.event.event_type(),
                correlation_id = %envelope.envelope_id,
                command = command.unwrap_or("none"),
                user_id = user_id.unwrap_or("unknown"),
                "received slack envelope"
            );

            if let Err(error) = self.transport.acknowledge(&envelope.envelope_id).await {
                warn!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    error = %error,
                    "failed to acknowledge slack envelope"
                );
            } else {
                debug!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    "acknowledged slack envelope"
                );
            }

            let dispatcher = Arc::clone(&self.dispatcher);
            handlers.spawn(async move {
                let context = EventContext { correlation_id: envelope.envelope_id.clone() };
                if let Err(error) = dispatcher.dispatch(&envelope, &context).await {
                    warn!(
                        envelope_id = %envelope.envelope_id,
                        correlation_id = %envelope.envelope_id,
                        error = %error,
                        "event dispatch failed; continuing socket loop"
                    );
                }
            });
        }
    }
}

fn correlation_fields(envelope: &SlackEnvelope) -> (Option<&str>, Option<&str>) {
    match &envelope.event {
        SlackEvent::SlashCommand(payload) => {
            (Some(payload.command.as_str()), Some(payload.user_id.as_str()))
        }
        SlackEvent::Unsupported { .. } => (None, None),
    }
}

/// One decoded socket-mode frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SocketFrame {
    Hello,
    Disconnect { reason: String },
    Envelope(SlackEnvelope),
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    envelope_id: Option<String>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    payload: Value,
}

#[derive(Deserialize)]
struct RawSlashCommand {
    command: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    channel_id: String,
    user_id: String,
    #[serde(default)]
    trigger_id: String,
    #[serde(default)]
    response_url: Option<String>,
}

pub fn parse_socket_frame(raw: &str) -> Result<SocketFrame, TransportError> {
    let frame: RawFrame = serde_json::from_str(raw)
        .map_err(|error| TransportError::Receive(format!("undecodable frame: {error}")))?;

    match frame.kind.as_str() {
        "hello" => return Ok(SocketFrame::Hello),
        "disconnect" => {
            return Ok(SocketFrame::Disconnect {
                reason: frame.reason.unwrap_or_else(|| "unknown".to_owned()),
            })
        }
        _ => {}
    }

    let envelope_id = frame
        .envelope_id
        .ok_or_else(|| TransportError::Receive(format!("`{}` frame without envelope_id", frame.kind)))?;

    let event = if frame.kind == "slash_commands" {
        let command: RawSlashCommand = serde_json::from_value(frame.payload)
            .map_err(|error| TransportError::Receive(format!("bad slash command payload: {error}")))?;
        SlackEvent::SlashCommand(SlashCommandPayload {
            command: command.command,
            text: command.text,
            channel_id: command.channel_id,
            user_id: command.user_id,
            trigger_id: command.trigger_id,
            request_id: envelope_id.clone(),
            response_url: command.response_url,
        })
    } else {
        SlackEvent::Unsupported { event_type: frame.kind }
    };

    Ok(SocketFrame::Envelope(SlackEnvelope { envelope_id, event }))
}

type SocketStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Socket-mode connection: a URL from `apps.connections.open`, then JSON
/// frames over a WebSocket. Slack-initiated disconnects surface as errors so
/// the runner reconnects.
pub struct SlackSocketTransport {
    web: Arc<SlackWebClient>,
    stream: Mutex<Option<SocketStream>>,
}

impl SlackSocketTransport {
    pub fn new(web: Arc<SlackWebClient>) -> Self {
        Self { web, stream: Mutex::new(None) }
    }
}

#[async_trait]
impl SocketTransport for SlackSocketTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let url = self
            .web
            .open_socket_url()
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        let (stream, _) = connect_async(url.as_str())
            .await
            .map_err(|error| TransportError::Connect(format!("websocket handshake failed: {error}")))?;
        *self.stream.lock().await = Some(stream);
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        let mut guard = self.stream.lock().await;
        let stream = guard
            .as_mut()
            .ok_or_else(|| TransportError::Receive("socket is not connected".to_owned()))?;

        loop {
            let message = match stream.next().await {
                Some(Ok(message)) => message,
                Some(Err(error)) => {
                    *guard = None;
                    return Err(TransportError::Receive(error.to_string()));
                }
                None => {
                    *guard = None;
                    return Err(TransportError::Receive("socket closed".to_owned()));
                }
            };

            match message {
                Message::Text(text) => match parse_socket_frame(&text) {
                    Ok(SocketFrame::Hello) => debug!("socket mode hello received"),
                    Ok(SocketFrame::Disconnect { reason }) => {
                        info!(reason = %reason, "slack requested socket refresh");
                        *guard = None;
                        return Err(TransportError::Receive(format!("server disconnect: {reason}")));
                    }
                    Ok(SocketFrame::Envelope(envelope)) => return Ok(Some(envelope)),
                    Err(error) => warn!(error = %error, "skipping socket frame"),
                },
                Message::Ping(data) => {
                    if let Err(error) = stream.send(Message::Pong(data)).await {
                        warn!(error = %error, "failed to answer ping");
                    }
                }
                Message::Close(_) => {
                    *guard = None;
                    return Err(TransportError::Receive("socket closed by server".to_owned()));
                }
                _ => {}
            }
        }
    }

    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
        let mut guard = self.stream.lock().await;
        let stream = guard
            .as_mut()
            .ok_or_else(|| TransportError::Acknowledge("socket is not connected".to_owned()))?;
        let ack = serde_json::json!({ "envelope_id": envelope_id });
        stream
            .send(Message::Text(ack.to_string().into()))
            .await
            .map_err(|error| TransportError::Acknowledge(error.to_string()))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let Some(mut stream) = self.stream.lock().await.take() else {
            return Ok(());
        };
        stream.close(None).await.map_err(|error| TransportError::Disconnect(error.to_string()))
    }
}
