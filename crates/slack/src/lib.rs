//! Slack Integration - Socket Mode glue for `/schedule`
//!
//! This crate connects Slack to the scheduling agent:
//! - **Socket Mode** (`socket`) - WebSocket connection to Slack (no public URL needed)
//! - **Slash Commands** (`commands`) - `/schedule <free text>` parsing and routing
//! - **Events** (`events`) - envelope dispatch to handlers
//! - **Profiles** (`profile`) - requester identity from `users.info`
//! - **Replies** (`reply`, `web`) - ephemeral follow-ups via response URL or Web API
//! - **Block Kit** (`blocks`) - message templates
//!
//! # Getting Started
//!
//! 1. Create a Slack app at https://api.slack.com/apps
//! 2. Enable Socket Mode and add the `/schedule` slash command
//! 3. Set env vars: `HUDDLE_SLACK_APP_TOKEN`, `HUDDLE_SLACK_BOT_TOKEN`
//!
//! # Architecture
//!
//! ```text
//! Slack → SocketModeRunner → EventDispatcher → CommandRouter → SchedulingService
//!                                                   ↓
//!                                   ReplySink ← MessageTemplate
//! ```
//!
//! The agent itself is behind [`commands::SchedulingService`]; this crate has
//! no knowledge of models or tool gateways.

pub mod blocks;
pub mod commands;
pub mod events;
pub mod profile;
pub mod reply;
pub mod socket;
pub mod web;

pub use commands::{CommandRouter, ScheduleOutcome, SchedulingService};
pub use events::{default_dispatcher, EventDispatcher};
pub use socket::{ReconnectPolicy, SlackSocketTransport, SocketModeRunner};
pub use web::SlackWebClient;
