//! rig-core-backed [`ModelProvider`] implementation.
//!
//! Wraps rig-core provider clients behind enum dispatch, keeping
//! provider-specific details out of the rest of the server. Supports
//! Anthropic, OpenAI, OpenRouter, and Ollama. Each call builds a fresh
//! agent (they are cheap to create), attaches the tool catalogue, and
//! issues a single non-streaming completion; the send/tool/feedback
//! iteration is owned by the agent loop, not by rig.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Completion;
use rig::message::{
    AssistantContent, Message as RigMessage, Text, ToolCall as RigToolCall, ToolFunction,
};
use rig::providers::{anthropic, openai, openrouter};
use rig::tool::ToolDyn;
use rig::OneOrMany;

use super::adapter::CatalogueTool;
use super::resolve::ModelSelection;
use super::{ModelProvider, ModelTurn, ProviderError};
use crate::config::Config;
use crate::message::{Message, Role, ToolCall};
use crate::tools::ToolDefinition;

/// Internal enum wrapping provider-specific clients.
enum ClientKind {
    Anthropic(anthropic::Client),
    OpenAI(openai::Client),
    OpenRouter(openrouter::Client),
    Ollama(openai::Client),
}

/// A configured LLM provider ready to handle completion requests.
pub struct RigProvider {
    client: ClientKind,
    model: String,
}

/// Dispatches an operation across provider-specific clients.
///
/// Matches on [`ClientKind`] and executes the same block for each variant,
/// letting the compiler monomorphize per provider.
macro_rules! dispatch {
    ($self:expr, |$client:ident| $body:expr) => {
        match &$self.client {
            ClientKind::Anthropic($client) => $body,
            ClientKind::OpenAI($client) => $body,
            ClientKind::OpenRouter($client) => $body,
            ClientKind::Ollama($client) => $body,
        }
    };
}

impl RigProvider {
    /// Creates a provider from the loaded application config.
    ///
    /// Resolves the API key through the config precedence chain
    /// (env var → config file → substitution) and builds the appropriate
    /// client.
    ///
    /// # Errors
    ///
    /// Returns an error if no API key is found for the selected provider
    /// or if client construction fails.
    pub fn from_config(config: &Config, selection: &ModelSelection) -> Result<Self> {
        match selection.provider {
            super::ProviderKind::Anthropic => {
                let api_key = config
                    .resolve_api_key("anthropic")
                    .context("No API key found for Anthropic. Set ANTHROPIC_API_KEY or configure it in config.toml")?;
                let client = anthropic::Client::new(&api_key)
                    .context("Failed to create Anthropic client")?;
                Ok(Self {
                    client: ClientKind::Anthropic(client),
                    model: selection.model.clone(),
                })
            }
            super::ProviderKind::OpenAI => {
                let api_key = config
                    .resolve_api_key("openai")
                    .context("No API key found for OpenAI. Set OPENAI_API_KEY or configure it in config.toml")?;
                let client =
                    openai::Client::new(&api_key).context("Failed to create OpenAI client")?;
                Ok(Self {
                    client: ClientKind::OpenAI(client),
                    model: selection.model.clone(),
                })
            }
            super::ProviderKind::OpenRouter => {
                let api_key = config
                    .resolve_api_key("openrouter")
                    .context("No API key found for OpenRouter. Set OPENROUTER_API_KEY or configure it in config.toml")?;
                let client = openrouter::Client::new(&api_key)
                    .context("Failed to create OpenRouter client")?;
                Ok(Self {
                    client: ClientKind::OpenRouter(client),
                    model: selection.model.clone(),
                })
            }
            super::ProviderKind::Ollama => {
                let base_url = config
                    .provider
                    .ollama
                    .as_ref()
                    .and_then(|o| o.base_url.as_deref())
                    .unwrap_or(crate::constants::OLLAMA_DEFAULT_BASE_URL);
                let client = openai::Client::builder()
                    .api_key("ollama")
                    .base_url(format!("{}/v1", base_url))
                    .build()
                    .context("Failed to create Ollama client")?;
                Ok(Self {
                    client: ClientKind::Ollama(client),
                    model: selection.model.clone(),
                })
            }
        }
    }
}

#[async_trait]
impl ModelProvider for RigProvider {
    async fn complete(
        &self,
        conversation: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ModelTurn, ProviderError> {
        // First System message becomes the agent preamble.
        let system_prompt = conversation
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.clone());

        // Last message becomes the prompt; the rest is chat history.
        let prompt = conversation
            .last()
            .and_then(convert_message_to_rig)
            .unwrap_or_else(|| RigMessage::user(""));
        let chat_history: Vec<RigMessage> = conversation
            .iter()
            .take(conversation.len().saturating_sub(1))
            .filter(|m| m.role != Role::System)
            .filter_map(convert_message_to_rig)
            .collect();

        dispatch!(self, |client| {
            let rig_tools: Vec<Box<dyn ToolDyn>> = tools
                .iter()
                .map(|d| Box::new(CatalogueTool::new(d.clone())) as Box<dyn ToolDyn>)
                .collect();
            let agent = if let Some(ref sys) = system_prompt {
                client
                    .agent(&self.model)
                    .preamble(sys)
                    .max_tokens(crate::constants::MAX_TOKENS)
                    .tools(rig_tools)
                    .build()
            } else {
                client
                    .agent(&self.model)
                    .max_tokens(crate::constants::MAX_TOKENS)
                    .tools(rig_tools)
                    .build()
            };
            let response = agent
                .completion(prompt, chat_history)
                .await
                .map_err(|e| ProviderError::Request(e.to_string()))?
                .send()
                .await
                .map_err(|e| ProviderError::Request(e.to_string()))?;
            Ok(extract_turn(response.choice))
        })
    }
}

/// Collapses a completion choice into a [`ModelTurn`].
fn extract_turn(choice: OneOrMany<AssistantContent>) -> ModelTurn {
    let mut text = String::new();
    let mut calls = Vec::new();
    for item in choice {
        match item {
            AssistantContent::Text(Text { text: t }) => {
                if !text.is_empty() {
                    text.push('\n');
                }
                text.push_str(&t);
            }
            AssistantContent::ToolCall(tc) => calls.push(ToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: tc.function.arguments,
            }),
            // Reasoning etc. is not replayed.
            _ => {}
        }
    }
    if calls.is_empty() {
        ModelTurn::Reply(text)
    } else {
        ModelTurn::ToolCalls { text, calls }
    }
}

/// Converts an internal [`Message`] to a rig-core message.
///
/// - **User** → user text
/// - **Assistant** (text only) → assistant text
/// - **Assistant** (with tool calls) → assistant with `ToolCall` content items
/// - **Tool** → user message with `ToolResult` content
/// - **System** → `None` (extracted as preamble separately)
fn convert_message_to_rig(msg: &Message) -> Option<RigMessage> {
    match msg.role {
        Role::User => Some(RigMessage::user(msg.content.as_str())),
        Role::Assistant => {
            if msg.tool_calls.is_empty() {
                Some(RigMessage::assistant(msg.content.as_str()))
            } else {
                let mut items: Vec<AssistantContent> = Vec::new();
                if !msg.content.is_empty() {
                    items.push(AssistantContent::Text(Text {
                        text: msg.content.clone(),
                    }));
                }
                for tc in &msg.tool_calls {
                    items.push(AssistantContent::ToolCall(RigToolCall::new(
                        tc.id.clone(),
                        ToolFunction::new(tc.name.clone(), tc.arguments.clone()),
                    )));
                }
                Some(RigMessage::Assistant {
                    id: None,
                    content: OneOrMany::many(items)
                        .unwrap_or_else(|_| OneOrMany::one(AssistantContent::text(""))),
                })
            }
        }
        Role::Tool => {
            let call_id = msg.tool_call_id.clone().unwrap_or_default();
            Some(RigMessage::tool_result(call_id, msg.content.as_str()))
        }
        Role::System => None,
    }
}
