//! Adapter exposing catalogue tool definitions to rig-core.
//!
//! rig-core only accepts tools as [`ToolDyn`] trait objects on its agent
//! builder. The agent loop executes tools itself (rig only runs them in
//! its own `multi_turn` mode, which this crate does not use), so this
//! adapter is a schema carrier: `definition()` is real, `call()` is never
//! reached by a plain completion request.

use std::pin::Pin;

use rig::completion::ToolDefinition as RigToolDefinition;
use rig::tool::{ToolDyn, ToolError};

use crate::tools::ToolDefinition;

/// Bridges a catalogue [`ToolDefinition`] to rig-core's [`ToolDyn`].
pub struct CatalogueTool {
    def: ToolDefinition,
}

impl CatalogueTool {
    pub fn new(def: ToolDefinition) -> Self {
        Self { def }
    }
}

impl ToolDyn for CatalogueTool {
    fn name(&self) -> String {
        self.def.name.clone()
    }

    fn definition<'a>(
        &'a self,
        _prompt: String,
    ) -> Pin<Box<dyn std::future::Future<Output = RigToolDefinition> + Send + 'a>> {
        let name = self.def.name.clone();
        let description = self.def.description.clone();
        let parameters = self.def.parameters.clone();
        Box::pin(async move {
            RigToolDefinition {
                name,
                description,
                parameters,
            }
        })
    }

    fn call<'a>(
        &'a self,
        _args: String,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<String, ToolError>> + Send + 'a>> {
        // Unreachable with plain completions; tool execution lives in the
        // agent loop.
        Box::pin(async move { Ok("tool calls are executed by the agent loop".to_string()) })
    }
}
