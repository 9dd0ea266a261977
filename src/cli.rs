//! Command-line interface definition and dispatch.
//!
//! Uses [`clap`] with derive macros. The `///` doc comments on variants
//! double as `--help` text rendered by clap.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::provider::{resolve_model, ModelProvider, RigProvider};
use crate::session::SessionRegistry;
use crate::{config, server};

/// Top-level CLI structure.
#[derive(Parser)]
#[command(name = "kibitzer", about = "Play chess against a tool-calling LLM over WebSocket")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the game server
    Serve {
        /// Bind address (overrides config), e.g. 127.0.0.1:8080
        #[arg(short, long)]
        addr: Option<String>,
        /// Provider to use (anthropic, openai, openrouter, ollama)
        #[arg(short, long)]
        provider: Option<String>,
        /// Model to use (overrides config)
        #[arg(short, long)]
        model: Option<String>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Subcommands for the `config` command.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current config
    Show,
}

/// Parses command-line arguments into a [`Cli`] struct.
pub fn parse() -> Cli {
    Cli::parse()
}

/// Dispatches the parsed CLI command to its handler.
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve {
            addr,
            provider: provider_name,
            model,
        } => {
            let config = config::Config::load()?;
            let selection = resolve_model(provider_name.as_deref(), model.as_deref(), &config)?;
            tracing::info!(model = %selection.model, "starting up");

            let provider: Arc<dyn ModelProvider> =
                Arc::new(RigProvider::from_config(&config, &selection)?);
            let registry = Arc::new(SessionRegistry::new());
            let router = server::router(
                registry,
                provider,
                config.system_prompt().to_string(),
            );

            let addr = config.bind_addr(addr.as_deref());
            server::serve(&addr, router).await
        }
        Commands::Config { action } => {
            let config = config::Config::load()?;
            match action {
                ConfigAction::Show => {
                    let path = config::Config::config_path()?;
                    println!("Config path: {}", path.display());
                    println!();
                    let toml_str = toml::to_string_pretty(&config)?;
                    println!("{}", toml_str);
                }
            }
            Ok(())
        }
    }
}
