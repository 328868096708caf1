//! The provider contract: anything that can turn a conversation plus a set
//! of tool schemas into a response is an [`AiProvider`]. Concrete wire
//! adapters (OpenAI, Ollama, Anthropic, …) are external collaborators —
//! this crate only defines the trait and the types that cross it.

use crate::error::Result;
use crate::types::{Message, ToolCall, ToolSchema};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Per-call generation options, independent of any one provider's wire
/// format.
#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub tools: Vec<ToolSchema>,
}

impl ChatOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: None,
            max_tokens: None,
            tools: Vec::new(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolSchema>) -> Self {
        self.tools = tools;
        self
    }
}

/// Why the provider stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
}

/// A complete, non-streaming response from a provider.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: FinishReason,
}

/// One piece of a streamed response.
#[derive(Debug, Clone)]
pub enum StreamChunk {
    /// An incremental piece of assistant text.
    TextDelta(String),
    /// A tool call was completed (providers typically emit these whole,
    /// not incrementally, even in a streaming response).
    ToolCall(ToolCall),
    /// The stream is finished; carries the same finish reason a
    /// non-streaming call would have returned.
    Done(FinishReason),
}

/// A provider of chat completions.
///
/// Implementations are expected to be cheap to clone behind an `Arc` and
/// safe to call concurrently from multiple orchestrator instances.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// A short, stable name used for registry lookups and error messages.
    fn name(&self) -> &str;

    /// Generate a single, complete response.
    async fn chat(&self, messages: &[Message], options: &ChatOptions) -> Result<ChatResponse>;

    /// Whether [`AiProvider::chat_stream`] streams real incremental tokens
    /// rather than the default chat-then-wrap-in-one-chunk fallback.
    fn supports_streaming(&self) -> bool {
        false
    }

    /// Release any resources held for this provider (connections, background
    /// tasks, …). The default implementation has nothing to do. Called by
    /// [`crate::llm::ProviderRegistry::dispose`] when a provider is removed
    /// from the registry or the registry itself is torn down.
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Generate a streamed response. The default implementation falls back
    /// to [`AiProvider::chat`] and emits it as a single chunk, so providers
    /// that do not support token streaming still satisfy the trait.
    async fn chat_stream(
        &self,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<BoxStream<'static, Result<StreamChunk>>> {
        let response = self.chat(messages, options).await?;
        let chunks: Vec<Result<StreamChunk>> = response
            .content
            .clone()
            .map(StreamChunk::TextDelta)
            .into_iter()
            .chain(response.tool_calls.clone().into_iter().map(StreamChunk::ToolCall))
            .chain(std::iter::once(StreamChunk::Done(response.finish_reason)))
            .map(Ok)
            .collect();
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}
