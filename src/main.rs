//! Entry point for kibitzer, a WebSocket chess server whose opponent is a
//! tool-calling LLM agent.
//!
//! This binary loads environment variables, initializes logging, parses
//! CLI arguments via [`cli`], and dispatches to the chosen subcommand.

mod agent;
mod cli;
mod config;
mod constants;
mod dispatch;
mod engine;
mod error;
mod message;
mod prompts;
mod protocol;
mod provider;
mod server;
mod session;
mod tools;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Runs the kibitzer CLI.
///
/// Loads `.env` files (silently ignored if absent), sets up tracing with
/// `RUST_LOG` support, and dispatches the chosen subcommand via
/// [`cli::run`].
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kibitzer=info")),
        )
        .init();
    let cli = cli::parse();
    cli::run(cli).await
}
