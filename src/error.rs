//! Error taxonomy for kibitzer.
//!
//! Two propagation regimes exist. Errors raised inside a tool
//! ([`ToolError`]) are recovered and returned to the model as tool result
//! content so it can self-correct. Errors raised anywhere else surface as
//! [`DispatchError`] at the dispatcher boundary, where they become an ERROR
//! envelope carrying the session's current position.

use thiserror::Error;

use crate::engine::EngineError;
use crate::provider::ProviderError;

/// A failure inside a tool call. Never propagated past the agent loop;
/// the message becomes the tool's result content.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Arguments did not validate against the tool's schema, or named an
    /// unknown tool or unparseable move/square.
    #[error("invalid tool input: {0}")]
    InvalidInput(String),

    /// The move parsed but is not legal in the current position.
    #[error("illegal move: {0}")]
    IllegalMove(String),
}

impl From<EngineError> for ToolError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::IllegalMove(m) => ToolError::IllegalMove(m),
            other => ToolError::InvalidInput(other.to_string()),
        }
    }
}

/// A failure while handling an inbound envelope. Converted at the
/// dispatcher boundary into an ERROR envelope; the session survives.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown session: {0}")]
    SessionNotFound(String),

    #[error("model provider failure: {0}")]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The agent turn exceeded the model round-trip cap.
    #[error("agent turn exceeded {0} model rounds")]
    RoundLimit(usize),

    /// The envelope is missing a field its action requires.
    #[error("missing field '{0}' in request")]
    MissingField(&'static str),
}
