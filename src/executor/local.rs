//! Direct, in-process execution: dispatches straight to a registered
//! [`AiProvider`], with a per-call timeout and exponential-backoff retry
//! around that single call — not around the whole multi-round turn, which
//! lives in the orchestrator.

use crate::error::{AppError, Result};
use crate::executor::Executor;
use crate::llm::{AiProvider, ChatOptions, ChatResponse};
use crate::retry::{retry_with_config, RetryConfig};
use crate::types::Message;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Per-call timeout applied to every provider chat call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Executes chat calls directly against in-process [`AiProvider`]s, keyed
/// by the name they were registered under.
pub struct LocalExecutor {
    providers: HashMap<String, Arc<dyn AiProvider>>,
    call_timeout: Duration,
    retry_config: RetryConfig,
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalExecutor {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            // 30s timeout x 3 attempts per call, exponential backoff starting
            // at 1s — the same shape RemoteExecutor uses for its transport,
            // just scoped to a single round instead of a whole turn.
            retry_config: RetryConfig {
                max_attempts: 3,
                initial_backoff: Duration::from_secs(1),
                backoff_multiplier: 2.0,
                max_backoff: Duration::from_secs(30),
            },
        }
    }

    pub fn with_provider(mut self, name: impl Into<String>, provider: Arc<dyn AiProvider>) -> Self {
        self.providers.insert(name.into(), provider);
        self
    }

    pub fn with_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }
}

#[async_trait]
impl Executor for LocalExecutor {
    async fn execute_chat(&self, provider: &str, messages: &[Message], options: &ChatOptions) -> Result<ChatResponse> {
        let provider_impl = self
            .providers
            .get(provider)
            .ok_or_else(|| AppError::Configuration(format!("unknown provider '{provider}'")))?;

        retry_with_config(self.retry_config, || async {
            match tokio::time::timeout(self.call_timeout, provider_impl.chat(messages, options)).await {
                Ok(result) => result,
                Err(_) => Err(AppError::Network(format!(
                    "provider '{provider}' call timed out after {:?}",
                    self.call_timeout
                ))),
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::FinishReason;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct StaticProvider;

    #[async_trait]
    impl AiProvider for StaticProvider {
        fn name(&self) -> &str {
            "static"
        }

        async fn chat(&self, _messages: &[Message], _options: &ChatOptions) -> Result<ChatResponse> {
            Ok(ChatResponse {
                content: Some("answer".into()),
                tool_calls: vec![],
                finish_reason: FinishReason::Stop,
            })
        }
    }

    struct SlowProvider;

    #[async_trait]
    impl AiProvider for SlowProvider {
        fn name(&self) -> &str {
            "slow"
        }

        async fn chat(&self, _messages: &[Message], _options: &ChatOptions) -> Result<ChatResponse> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            unreachable!("should have timed out first")
        }
    }

    struct FlakyProvider {
        failures_remaining: AtomicU32,
    }

    #[async_trait]
    impl AiProvider for FlakyProvider {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn chat(&self, _messages: &[Message], _options: &ChatOptions) -> Result<ChatResponse> {
            if self.failures_remaining.fetch_sub(1, Ordering::SeqCst) > 0 {
                Err(AppError::Network("connection reset".into()))
            } else {
                Ok(ChatResponse {
                    content: Some("recovered".into()),
                    tool_calls: vec![],
                    finish_reason: FinishReason::Stop,
                })
            }
        }
    }

    #[tokio::test]
    async fn dispatches_a_single_call_to_the_named_provider() {
        let executor = LocalExecutor::new().with_provider("static", Arc::new(StaticProvider));
        let response = executor
            .execute_chat("static", &[Message::user("hi")], &ChatOptions::new("model-x"))
            .await
            .unwrap();
        assert_eq!(response.content.as_deref(), Some("answer"));
    }

    #[tokio::test]
    async fn unknown_provider_is_a_configuration_error() {
        let executor = LocalExecutor::new();
        let result = executor
            .execute_chat("missing", &[Message::user("hi")], &ChatOptions::new("model-x"))
            .await;
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[tokio::test]
    async fn a_call_that_exceeds_the_timeout_is_reported_as_a_network_error() {
        let executor = LocalExecutor::new()
            .with_provider("slow", Arc::new(SlowProvider))
            .with_timeout(Duration::from_millis(20))
            .with_retry_config(RetryConfig {
                max_attempts: 1,
                initial_backoff: Duration::from_millis(1),
                backoff_multiplier: 1.0,
                max_backoff: Duration::from_millis(1),
            });
        let result = executor
            .execute_chat("slow", &[Message::user("hi")], &ChatOptions::new("model-x"))
            .await;
        assert!(matches!(result, Err(AppError::Network(_))));
    }

    #[tokio::test]
    async fn retries_a_single_round_before_succeeding() {
        let executor = LocalExecutor::new()
            .with_provider(
                "flaky",
                Arc::new(FlakyProvider {
                    failures_remaining: AtomicU32::new(2),
                }),
            )
            .with_retry_config(RetryConfig {
                max_attempts: 3,
                initial_backoff: Duration::from_millis(1),
                backoff_multiplier: 1.0,
                max_backoff: Duration::from_millis(1),
            });
        let response = executor
            .execute_chat("flaky", &[Message::user("hi")], &ChatOptions::new("model-x"))
            .await
            .unwrap();
        assert_eq!(response.content.as_deref(), Some("recovered"));
    }
}
