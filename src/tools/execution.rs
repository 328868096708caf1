//! Batched tool execution: runs the tool calls from one assistant turn,
//! either in parallel (bounded by a semaphore) or strictly in sequence, with
//! a per-call timeout and a small ring buffer of recent executions for
//! diagnostics.

use crate::error::{AppError, Result};
use crate::tools::registry::ToolRegistry;
use crate::types::ToolCall;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// How a batch of tool calls should be executed.
#[derive(Debug, Clone, Copy)]
pub enum ExecutionMode {
    /// Run calls concurrently, at most `max_concurrency` in flight at once.
    Parallel { max_concurrency: usize },
    /// Run calls one at a time, in the order they were requested. When
    /// `continue_on_error` is `false` (the default), the first failing call
    /// stops the batch immediately — the remaining calls are never run and
    /// have no outcome at all, not even an error outcome.
    Sequential { continue_on_error: bool },
}

impl ExecutionMode {
    /// Sequential execution that stops at the first failure.
    pub const fn sequential() -> Self {
        ExecutionMode::Sequential { continue_on_error: false }
    }
}

/// The outcome of executing a single tool call.
#[derive(Debug, Clone)]
pub struct ToolExecutionOutcome {
    pub tool_call_id: String,
    pub tool_name: String,
    pub result: std::result::Result<Value, String>,
    pub duration: Duration,
}

/// Rolling counters plus a short history of recent executions, useful for
/// an operator-facing status endpoint or for tests asserting on behavior
/// without re-deriving it from raw outcomes.
#[derive(Debug, Default)]
pub struct ExecutionStats {
    pub total_calls: u64,
    pub total_errors: u64,
    pub total_timeouts: u64,
    recent: VecDeque<ToolExecutionOutcome>,
}

const RECENT_HISTORY_CAPACITY: usize = 50;

impl ExecutionStats {
    fn record(&mut self, outcome: ToolExecutionOutcome) {
        self.total_calls += 1;
        if outcome.result.is_err() {
            self.total_errors += 1;
        }
        if self.recent.len() >= RECENT_HISTORY_CAPACITY {
            self.recent.pop_front();
        }
        self.recent.push_back(outcome);
    }

    pub fn recent(&self) -> impl Iterator<Item = &ToolExecutionOutcome> {
        self.recent.iter()
    }
}

/// Executes batches of tool calls against a [`ToolRegistry`].
pub struct ToolExecutionService {
    registry: Arc<ToolRegistry>,
    per_call_timeout: Duration,
    stats: Mutex<ExecutionStats>,
}

impl ToolExecutionService {
    pub fn new(registry: Arc<ToolRegistry>, per_call_timeout: Duration) -> Self {
        Self {
            registry,
            per_call_timeout,
            stats: Mutex::new(ExecutionStats::default()),
        }
    }

    pub fn stats_snapshot(&self) -> (u64, u64, u64) {
        let stats = self.stats.lock();
        (stats.total_calls, stats.total_errors, stats.total_timeouts)
    }

    /// Execute every call in `calls`, in the given mode, returning one
    /// outcome per call in request order regardless of completion order.
    pub async fn execute_batch(
        &self,
        calls: &[ToolCall],
        allowed: Option<&[String]>,
    ) -> Vec<ToolExecutionOutcome> {
        self.execute_batch_with_mode(calls, allowed, ExecutionMode::Parallel { max_concurrency: 4 })
            .await
    }

    pub async fn execute_batch_with_mode(
        &self,
        calls: &[ToolCall],
        allowed: Option<&[String]>,
        mode: ExecutionMode,
    ) -> Vec<ToolExecutionOutcome> {
        if calls.is_empty() {
            return Vec::new();
        }

        match mode {
            ExecutionMode::Sequential { continue_on_error } => {
                let mut outcomes = Vec::with_capacity(calls.len());
                for call in calls {
                    let outcome = self.execute_one(call, allowed).await;
                    let failed = outcome.result.is_err();
                    outcomes.push(outcome);
                    if failed && !continue_on_error {
                        break;
                    }
                }
                outcomes
            }
            ExecutionMode::Parallel { max_concurrency } => {
                let max_concurrency = max_concurrency.max(1).min(calls.len());
                let semaphore = Arc::new(Semaphore::new(max_concurrency));
                let mut handles = Vec::with_capacity(calls.len());

                for call in calls.iter().cloned() {
                    let semaphore = Arc::clone(&semaphore);
                    let registry = Arc::clone(&self.registry);
                    let timeout = self.per_call_timeout;
                    handles.push(tokio::spawn(async move {
                        let _permit = semaphore
                            .acquire_owned()
                            .await
                            .expect("semaphore is never closed");
                        run_with_timeout(&registry, &call, allowed_to_owned(allowed), timeout).await
                    }));
                }

                let mut outcomes = Vec::with_capacity(handles.len());
                for handle in handles {
                    match handle.await {
                        Ok(outcome) => outcomes.push(outcome),
                        Err(join_err) => outcomes.push(ToolExecutionOutcome {
                            tool_call_id: "unknown".into(),
                            tool_name: "unknown".into(),
                            result: Err(format!("tool task panicked: {join_err}")),
                            duration: Duration::ZERO,
                        }),
                    }
                }
                outcomes
            }
        }
        .into_iter()
        .inspect(|outcome| self.record(outcome.clone()))
        .collect()
    }

    async fn execute_one(
        &self,
        call: &ToolCall,
        allowed: Option<&[String]>,
    ) -> ToolExecutionOutcome {
        run_with_timeout(&self.registry, call, allowed_to_owned(allowed), self.per_call_timeout).await
    }

    fn record(&self, outcome: ToolExecutionOutcome) {
        let is_timeout = matches!(&outcome.result, Err(msg) if msg.contains("timed out"));
        let mut stats = self.stats.lock();
        if is_timeout {
            stats.total_timeouts += 1;
        }
        stats.record(outcome);
    }
}

fn allowed_to_owned(allowed: Option<&[String]>) -> Option<Vec<String>> {
    allowed.map(|s| s.to_vec())
}

async fn run_with_timeout(
    registry: &ToolRegistry,
    call: &ToolCall,
    allowed: Option<Vec<String>>,
    timeout: Duration,
) -> ToolExecutionOutcome {
    let started = Instant::now();
    let allowed_ref = allowed.as_deref();
    let fut = registry.execute(&call.function.name, call.function.arguments.clone(), allowed_ref);

    let result: Result<Value> = match tokio::time::timeout(timeout, fut).await {
        Ok(inner) => inner,
        Err(_) => {
            warn!(tool = %call.function.name, tool_call_id = %call.id, "tool call timed out");
            Err(AppError::ToolExecution {
                tool: call.function.name.clone(),
                cause: format!("tool call timed out after {timeout:?}"),
                parameters: call.function.arguments.clone(),
            })
        }
    };

    let duration = started.elapsed();
    info!(tool = %call.function.name, tool_call_id = %call.id, ?duration, ok = result.is_ok(), "tool call completed");

    ToolExecutionOutcome {
        tool_call_id: call.id.clone(),
        tool_name: call.function.name.clone(),
        result: result.map_err(|e| e.to_string()),
        duration,
    }
}
