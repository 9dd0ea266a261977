//! Model provider abstraction.
//!
//! The agent loop talks to a [`ModelProvider`]: give it a conversation and
//! the tool catalogue, get back one model turn: either tool-call requests
//! or a plain text reply. The production implementation ([`RigProvider`])
//! wraps rig-core's provider clients behind enum dispatch (Anthropic,
//! OpenAI, OpenRouter, Ollama); tests substitute a scripted double.

mod adapter;
mod client;
mod kind;
mod resolve;

pub use client::RigProvider;
#[allow(unused_imports)]
pub use kind::{default_model_for, ProviderKind};
pub use resolve::{resolve_model, ModelSelection};

use async_trait::async_trait;
use thiserror::Error;

use crate::message::{Message, ToolCall};
use crate::tools::ToolDefinition;

/// A model invocation failure. Never retried; the turn aborts and the
/// dispatcher reports it to the client.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Request(String),
}

/// One model turn.
#[derive(Debug, Clone)]
pub enum ModelTurn {
    /// The model requested tool calls, possibly alongside commentary text.
    ToolCalls { text: String, calls: Vec<ToolCall> },
    /// A reply with no tool calls. The agent loop treats this as a
    /// malformed turn and prompts the model to correct itself.
    Reply(String),
}

/// Drives one LLM completion over a conversation snapshot.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn complete(
        &self,
        conversation: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ModelTurn, ProviderError>;
}
