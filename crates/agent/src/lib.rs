//! Agent Runtime - model-driven scheduling orchestration
//!
//! This crate turns a free-text scheduling instruction into a sequence of
//! tool calls mediated by a language model:
//! - Grounds the system prompt in one captured instant and the requesting user
//! - Merges in-process tools with the tools discovered on the remote gateway
//! - Runs the model's tool-calling loop
//! - Owns the gateway session for the duration of the request
//!
//! # Architecture
//!
//! 1. **Prompt** (`prompt`, `policy`) - temporal, user and scheduling rules
//! 2. **Tools** (`tools`, `timezone`) - local tools and the merged registry
//! 3. **Model** (`llm`) - OpenAI-compatible client and `generate_text` loop
//! 4. **Orchestration** (`runtime`) - `AgentRuntime::run` state sequence
//!
//! # Failure Principle
//!
//! Gateway problems degrade the request to local tools, tool failures are
//! data for the model, and only configuration or model failures end a
//! request. Even then the caller receives an `AgentResult`, never an error.

pub mod llm;
pub mod policy;
pub mod prompt;
pub mod runtime;
pub mod timezone;
pub mod tools;

pub use llm::{LlmClient, LlmError, OpenAiCompatibleClient};
pub use runtime::{AgentResult, AgentRuntime};
