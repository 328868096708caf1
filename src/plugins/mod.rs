//! Lifecycle hooks the orchestrator dispatches to at fixed points in a run.
//!
//! A plugin cannot veto or redirect control flow — it observes. A hook that
//! returns an error is logged and ignored; the run continues exactly as it
//! would have without the plugin.

use crate::error::{AppError, Result};
use crate::llm::ChatResponse;
use crate::tools::ToolExecutionOutcome;
use crate::types::{Message, ToolCall};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// One of the fixed set of lifecycle points a plugin can observe.
#[derive(Debug, Clone)]
pub enum HookEvent {
    BeforeRun {
        conversation_id: String,
        input: String,
    },
    AfterRun {
        conversation_id: String,
        final_content: Option<String>,
    },
    BeforeProviderCall {
        provider: String,
        round: u32,
    },
    AfterProviderCall {
        provider: String,
        round: u32,
        response: ChatResponse,
    },
    BeforeToolCall {
        tool_call: ToolCall,
    },
    AfterToolCall {
        tool_call: ToolCall,
        outcome: ToolExecutionOutcome,
    },
    OnStreamingChunk {
        text: String,
    },
    OnError {
        message: String,
    },
    OnMessageAdded {
        message: Message,
    },
}

/// A plugin observing orchestrator lifecycle events.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// A short, stable name used in logs when a hook fails.
    fn name(&self) -> &str;

    /// Handle a single lifecycle event. The default implementation ignores
    /// every event; override to react to the ones this plugin cares about.
    async fn handle(&self, _event: &HookEvent) -> Result<()> {
        Ok(())
    }
}

/// Dispatches lifecycle events to every registered plugin, in registration
/// order, swallowing (and logging) any hook failure.
#[derive(Default, Clone)]
pub struct PluginManager {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self { plugins: Vec::new() }
    }

    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub async fn dispatch(&self, event: HookEvent) {
        for plugin in &self.plugins {
            if let Err(err) = plugin.handle(&event).await {
                warn!(plugin = plugin.name(), error = %err, "plugin hook failed; continuing run");
            }
        }
    }
}

/// Convenience for plugins that only care about failures elsewhere in the
/// runtime and want a uniform string to log, regardless of error shape.
pub fn describe_error(err: &AppError) -> String {
    err.to_string()
}
