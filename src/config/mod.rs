//! Configuration types and path resolution for kibitzer.
//!
//! Settings live as TOML at the platform's XDG config path
//! (e.g. `~/.config/kibitzer/config.toml` on Linux). A default file with
//! `{env:VAR}` placeholders for API keys is created on first run.

mod loader;
mod paths;
mod resolve;
mod types;

pub use types::Config;
#[allow(unused_imports)]
pub use types::{ProviderConfig, ProviderEntry, ServerConfig};

use anyhow::Result;

impl Config {
    /// Load config from disk (creating the default file if none exists)
    /// and resolve `{env:VAR}` substitutions.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_global()?;
        config.resolve_substitutions();
        Ok(config)
    }
}
