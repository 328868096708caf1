//! # agentrt
//!
//! A runtime for driving conversational AI "agents": a loop that, given a
//! user utterance and a configured model, repeatedly asks a large-language-
//! model provider for a response, executes any tools the model requested,
//! feeds the results back, and returns a final textual answer.
//!
//! ## Modules
//!
//! - [`types`] - the message/tool-call data model
//! - [`history`] - per-conversation message logs with tool-call integrity
//!   rules, and a bounded multi-conversation store
//! - [`tools`] - the tool trait, registry, and batched execution service
//! - [`llm`] - the provider trait and a named-provider registry
//! - [`plugins`] - lifecycle hooks the orchestrator dispatches to
//! - [`orchestrator`] - the multi-round tool-calling state machine
//! - [`executor`] - local (in-process) and remote (HTTP/SSE/WebSocket)
//!   back-ends for running a turn
//! - [`error`] - the application-wide error type
//! - [`retry`] - retry-with-backoff for transient failures
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use agentrt::executor::{Executor, LocalExecutor};
//! use agentrt::history::ConversationHistory;
//! use agentrt::orchestrator::{build_orchestrator, OrchestratorConfig};
//! use agentrt::plugins::PluginManager;
//! use agentrt::tools::ToolRegistry;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn run(provider: Arc<dyn agentrt::llm::AiProvider>) -> agentrt::error::Result<()> {
//! let tools = Arc::new(ToolRegistry::new());
//! let executor: Arc<dyn Executor> = Arc::new(LocalExecutor::new().with_provider("openai", provider));
//! let (orchestrator, _service) = build_orchestrator(
//!     executor,
//!     tools,
//!     Duration::from_secs(30),
//!     PluginManager::new(),
//!     OrchestratorConfig::default(),
//! );
//!
//! let mut history = ConversationHistory::new();
//! let session = history.session_mut("conversation-1");
//! let outcome = orchestrator.run(session, "hello", "openai", "gpt-test", None).await?;
//! println!("{:?}", outcome.final_content);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

/// Application-wide error type and result alias.
pub mod error;
/// Execution back-ends: local in-process, and remote HTTP/SSE/WebSocket.
pub mod executor;
/// Per-conversation message logs and the bounded multi-conversation store.
pub mod history;
/// Provider trait and named-provider registry.
pub mod llm;
/// The multi-round tool-calling state machine.
pub mod orchestrator;
/// Lifecycle hooks dispatched during a run.
pub mod plugins;
/// Retry-with-backoff for transient failures.
pub mod retry;
/// Tool trait, registry, and batched execution service.
pub mod tools;
/// The message/tool-call data model.
pub mod types;

pub use error::{AppError, Result};
pub use history::ConversationHistory;
pub use llm::{AiProvider, ProviderRegistry};
pub use orchestrator::Orchestrator;
pub use tools::ToolRegistry;

/// Initializes a `tracing-subscriber` global default subscriber driven by
/// the `RUST_LOG` environment variable, falling back to `info` level.
///
/// Intended for binaries and tests that want ready-made logging; library
/// consumers embedding this crate are free to install their own subscriber
/// instead.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init();
}
