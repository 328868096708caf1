//! The multi-round tool-calling state machine: ask the provider, run any
//! tools it requested, feed the results back, repeat until the provider
//! stops requesting tools or the round cap is hit.

use crate::error::{AppError, Result};
use crate::executor::Executor;
use crate::history::ConversationSession;
use crate::llm::ChatOptions;
use crate::plugins::{HookEvent, PluginManager};
use crate::tools::{ExecutionMode, ToolExecutionService, ToolRegistry};
use crate::types::Message;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Default cap on the number of provider round-trips a single `run` call
/// will make before giving up and returning whatever it has.
pub const DEFAULT_MAX_ROUNDS: u32 = 10;

/// Why a run stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The provider returned a turn with no tool calls.
    Completed,
    /// The round cap was reached while the provider was still requesting
    /// tools.
    RoundCapReached,
}

/// The result of one `Orchestrator::run` call.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub final_content: Option<String>,
    pub rounds_used: u32,
    pub stop_reason: StopReason,
}

/// Tunables for a single orchestrator instance.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub max_rounds: u32,
    pub tool_execution_mode: ExecutionMode,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            tool_execution_mode: ExecutionMode::Parallel { max_concurrency: 4 },
        }
    }
}

/// Drives the multi-round tool-calling loop for one conversation turn.
///
/// Every provider call goes through `executor`, an interchangeable back-end
/// ([`crate::executor::LocalExecutor`] or [`crate::executor::RemoteExecutor`])
/// that performs exactly one chat round. The loop itself, tool dispatch, and
/// session mutation all happen here regardless of which back-end is
/// plugged in — a remote executor proxying the model call does not mean
/// locally-registered tools stop running.
pub struct Orchestrator {
    executor: Arc<dyn Executor>,
    tool_registry: Arc<ToolRegistry>,
    tool_execution: Arc<ToolExecutionService>,
    plugins: PluginManager,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        executor: Arc<dyn Executor>,
        tool_registry: Arc<ToolRegistry>,
        tool_execution: Arc<ToolExecutionService>,
        plugins: PluginManager,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            executor,
            tool_registry,
            tool_execution,
            plugins,
            config,
        }
    }

    /// Run the loop for one user turn against `provider`.
    ///
    /// Appends `user_input` to `session` (unless the session's last message
    /// is already that exact pending user turn — re-entering `run` after a
    /// transient error should not duplicate the user's message), then drives
    /// provider/tool rounds until completion or the round cap.
    pub async fn run(
        &self,
        session: &mut ConversationSession,
        user_input: &str,
        provider: &str,
        model: &str,
        allowed_tools: Option<&[String]>,
    ) -> Result<RunOutcome> {
        let conversation_id = session.id().to_string();

        self.plugins
            .dispatch(HookEvent::BeforeRun {
                conversation_id: conversation_id.clone(),
                input: user_input.to_string(),
            })
            .await;

        let already_pending = matches!(
            session.messages().last(),
            Some(Message::User(u)) if u.content == user_input
        );
        if !already_pending {
            session.append(Message::user(user_input))?;
        }

        let result = self.run_rounds(session, provider, model, allowed_tools).await;

        match &result {
            Ok(outcome) => {
                self.plugins
                    .dispatch(HookEvent::AfterRun {
                        conversation_id,
                        final_content: outcome.final_content.clone(),
                    })
                    .await;
            }
            Err(err) => {
                self.plugins
                    .dispatch(HookEvent::OnError {
                        message: err.to_string(),
                    })
                    .await;
            }
        }

        result
    }

    async fn run_rounds(
        &self,
        session: &mut ConversationSession,
        provider: &str,
        model: &str,
        allowed_tools: Option<&[String]>,
    ) -> Result<RunOutcome> {
        let tool_schemas = self.tool_registry.schemas_for(allowed_tools);

        for round in 1..=self.config.max_rounds {
            self.plugins
                .dispatch(HookEvent::BeforeProviderCall {
                    provider: provider.to_string(),
                    round,
                })
                .await;

            let options = ChatOptions::new(model).with_tools(tool_schemas.clone());
            let response = match self.executor.execute_chat(provider, session.messages(), &options).await {
                Ok(response) => response,
                Err(err) => {
                    warn!(round, error = %err, "provider call failed");
                    return Err(err);
                }
            };

            self.plugins
                .dispatch(HookEvent::AfterProviderCall {
                    provider: provider.to_string(),
                    round,
                    response: response.clone(),
                })
                .await;

            let assistant_message = Message::assistant(response.content.clone(), response.tool_calls.clone());
            session.append(assistant_message.clone())?;
            self.plugins
                .dispatch(HookEvent::OnMessageAdded {
                    message: assistant_message,
                })
                .await;

            if response.tool_calls.is_empty() {
                info!(round, "run completed: no further tool calls requested");
                return Ok(RunOutcome {
                    final_content: response.content,
                    rounds_used: round,
                    stop_reason: StopReason::Completed,
                });
            }

            for call in &response.tool_calls {
                self.plugins
                    .dispatch(HookEvent::BeforeToolCall {
                        tool_call: call.clone(),
                    })
                    .await;
            }

            let outcomes = self
                .tool_execution
                .execute_batch_with_mode(&response.tool_calls, allowed_tools, self.config.tool_execution_mode)
                .await;

            for (call, outcome) in response.tool_calls.iter().zip(outcomes.iter()) {
                self.plugins
                    .dispatch(HookEvent::AfterToolCall {
                        tool_call: call.clone(),
                        outcome: outcome.clone(),
                    })
                    .await;

                let tool_message = match &outcome.result {
                    Ok(value) => Message::tool_result(outcome.tool_call_id.clone(), stringify_tool_result(value)),
                    Err(err_msg) => Message::tool_error(outcome.tool_call_id.clone(), err_msg.clone()),
                }
                .with_name(outcome.tool_name.clone());
                session.append(tool_message.clone())?;
                self.plugins
                    .dispatch(HookEvent::OnMessageAdded { message: tool_message })
                    .await;
            }

            if round == self.config.max_rounds {
                warn!(round, "round cap reached while provider still requesting tools");
                return Ok(RunOutcome {
                    final_content: None,
                    rounds_used: round,
                    stop_reason: StopReason::RoundCapReached,
                });
            }
        }

        Err(AppError::Internal("orchestrator loop exited without a result".into()))
    }
}

/// A tool's JSON result, as fed back to the provider: a bare string is
/// passed through unquoted, everything else is serialized to its JSON text.
fn stringify_tool_result(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Constructs an [`Orchestrator`] along with the [`ToolExecutionService`]
/// backing it, so callers do not have to wire the registry into both
/// places themselves.
pub fn build_orchestrator(
    executor: Arc<dyn Executor>,
    tool_registry: Arc<ToolRegistry>,
    tool_timeout: Duration,
    plugins: PluginManager,
    config: OrchestratorConfig,
) -> (Orchestrator, Arc<ToolExecutionService>) {
    let tool_execution = Arc::new(ToolExecutionService::new(Arc::clone(&tool_registry), tool_timeout));
    let orchestrator = Orchestrator::new(executor, tool_registry, Arc::clone(&tool_execution), plugins, config);
    (orchestrator, tool_execution)
}
