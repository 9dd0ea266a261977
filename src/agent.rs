//! The agent turn state machine.
//!
//! One call to [`run_turn`] drives a complete agent turn ("make a move"
//! after the human played, or "respond to chat") through repeated model
//! invocation and tool execution:
//!
//! `AwaitingModel → ExecutingTools → (AwaitingModel | Done)`
//!
//! The only way a turn finishes normally is the model calling
//! `stop_interaction`. A response with zero tool calls is a malformed
//! turn, not completion: the loop appends a corrective message and asks
//! again. Tool failures are fed back as result content and never abort
//! the turn; provider failures do, and surface at the dispatcher.

use tracing::{debug, info, warn};

use crate::constants::MAX_TURN_ROUNDS;
use crate::engine;
use crate::error::DispatchError;
use crate::message::{Message, ToolCall};
use crate::prompts;
use crate::provider::{ModelProvider, ModelTurn};
use crate::session::Session;
use crate::tools::{self, ToolKind};

/// What the agent is being asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnKind {
    /// Answer the human's move with a move of its own.
    Move,
    /// Respond to a chat message already appended to the history.
    Chat,
}

enum LoopState {
    AwaitingModel,
    ExecutingTools(Vec<ToolCall>),
    Done,
}

/// Runs one agent turn to completion.
///
/// Every message produced along the way, seed prompt and corrective
/// reminders included, is appended to the
/// session's persistent history, so the next turn resumes with full
/// context. The conversation passed to the provider is an owned snapshot
/// taken fresh each round.
pub async fn run_turn(
    provider: &dyn ModelProvider,
    session: &mut Session,
    system_prompt: &str,
    kind: TurnKind,
) -> Result<(), DispatchError> {
    if kind == TurnKind::Move {
        let side = engine::color_name(session.game.turn());
        session.commit_user(prompts::move_request(side));
    }

    let definitions = tools::definitions();
    let mut rounds = 0usize;
    let mut state = LoopState::AwaitingModel;

    loop {
        state = match state {
            LoopState::AwaitingModel => {
                rounds += 1;
                if rounds > MAX_TURN_ROUNDS {
                    return Err(DispatchError::RoundLimit(MAX_TURN_ROUNDS));
                }
                let conversation = session.conversation(system_prompt);
                match provider.complete(&conversation, &definitions).await? {
                    ModelTurn::ToolCalls { text, calls } => {
                        session
                            .history
                            .push(Message::assistant_with_calls(text, calls.clone()));
                        LoopState::ExecutingTools(calls)
                    }
                    ModelTurn::Reply(text) => {
                        // Malformed turn: a tool-calling model must act
                        // through the catalogue. Correct and re-ask.
                        warn!(round = rounds, "model response carried no tool calls");
                        session.history.push(Message::assistant(text));
                        session
                            .history
                            .push(Message::user(prompts::CORRECTIVE_PROMPT));
                        LoopState::AwaitingModel
                    }
                }
            }
            LoopState::ExecutingTools(calls) => {
                let mut next = LoopState::AwaitingModel;
                for call in &calls {
                    let result = tools::execute(session, call);
                    debug!(tool = %call.name, is_error = result.is_error, "tool executed");
                    session
                        .history
                        .push(Message::tool_result(call.id.as_str(), result.content.as_str()));
                    let terminates = ToolKind::from_name(&call.name)
                        .map(ToolKind::terminates_turn)
                        .unwrap_or(false);
                    if terminates {
                        // Remaining calls in the batch are discarded.
                        next = LoopState::Done;
                        break;
                    }
                }
                next
            }
            LoopState::Done => {
                info!(rounds, "agent turn complete");
                return Ok(());
            }
        };
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use crate::message::{Message, ToolCall};
    use crate::provider::{ModelProvider, ModelTurn, ProviderError};
    use crate::tools::ToolDefinition;

    /// A provider double that replays a fixed script of model turns and
    /// errors once the script runs dry.
    pub struct ScriptedProvider {
        turns: Mutex<VecDeque<ModelTurn>>,
        pub invocations: std::sync::atomic::AtomicUsize,
    }

    impl ScriptedProvider {
        pub fn new(turns: Vec<ModelTurn>) -> Self {
            Self {
                turns: Mutex::new(turns.into()),
                invocations: std::sync::atomic::AtomicUsize::new(0),
            }
        }

        pub fn call_count(&self) -> usize {
            self.invocations.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ModelProvider for ScriptedProvider {
        async fn complete(
            &self,
            _conversation: &[Message],
            _tools: &[ToolDefinition],
        ) -> Result<ModelTurn, ProviderError> {
            self.invocations
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.turns
                .lock()
                .await
                .pop_front()
                .ok_or_else(|| ProviderError::Request("script exhausted".to_string()))
        }
    }

    /// A provider that answers every call identically, for exercising the
    /// round cap.
    pub struct RepeatingProvider;

    #[async_trait]
    impl ModelProvider for RepeatingProvider {
        async fn complete(
            &self,
            _conversation: &[Message],
            _tools: &[ToolDefinition],
        ) -> Result<ModelTurn, ProviderError> {
            Ok(ModelTurn::Reply("thinking out loud".to_string()))
        }
    }

    pub fn tool_call(id: &str, name: &str, arguments: serde_json::Value) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments,
        }
    }
}
