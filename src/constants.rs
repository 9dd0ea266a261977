//! Centralized constants for kibitzer.
//!
//! All magic numbers, default strings, and configuration constants live here
//! so they can be changed in one place.

/// Application name used in CLI output and directory paths.
pub const APP_NAME: &str = "kibitzer";

/// Default LLM model identifier.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

/// Maximum tokens for LLM completions.
pub const MAX_TOKENS: u64 = 4096;

/// Configuration filename.
pub const CONFIG_FILENAME: &str = "config.toml";

/// Default LLM model identifier for OpenAI.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4.1";

/// Default LLM model identifier for OpenRouter.
pub const DEFAULT_OPENROUTER_MODEL: &str = "arcee-ai/trinity-large-preview:free";

/// Default base URL for local Ollama server.
pub const OLLAMA_DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Default LLM model identifier for Ollama.
pub const OLLAMA_DEFAULT_MODEL: &str = "llama3";

/// Default provider when none is configured.
pub const DEFAULT_PROVIDER: &str = "anthropic";

// --- Server defaults ---

/// Default bind address for the HTTP/WebSocket server.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

// --- Agent turn limits ---

/// Maximum model round-trips per agent turn before the turn is aborted.
///
/// Bounds a runaway model without treating "no tool calls" as completion;
/// a legitimate exchange over a chess position stays far below this.
pub const MAX_TURN_ROUNDS: usize = 32;
