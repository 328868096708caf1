//! Two interchangeable back-ends for a single provider round-trip: entirely
//! in this process ([`local::LocalExecutor`]), or proxied to a remote server
//! over HTTP ([`remote::RemoteExecutor`]).
//!
//! Either back-end only ever performs one chat call per invocation; the
//! multi-round tool-calling loop, tool dispatch, and session mutation all
//! stay local to the orchestrator regardless of which [`Executor`] it is
//! configured with. This keeps a locally-registered tool runnable even when
//! the model is served remotely.

pub mod local;
pub mod remote;

use crate::error::Result;
use crate::llm::{ChatOptions, ChatResponse};
use crate::types::Message;
use async_trait::async_trait;

/// Performs one provider chat call, by whatever means the implementation
/// sees fit (an in-process [`crate::llm::AiProvider`], an HTTP round trip to
/// a remote agent-runtime server, …).
#[async_trait]
pub trait Executor: Send + Sync {
    /// Ask `provider` for a single response to `messages`, no round-trip
    /// looping — that is the orchestrator's job.
    async fn execute_chat(&self, provider: &str, messages: &[Message], options: &ChatOptions) -> Result<ChatResponse>;

    /// Whether this back-end can honor `options.tools`. Both back-ends can
    /// today; the hook exists for a future executor that proxies a model
    /// with no tool-calling support.
    fn supports_tools(&self) -> bool {
        true
    }
}

pub use local::LocalExecutor;
pub use remote::RemoteExecutor;
