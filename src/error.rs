//! Application-wide error type.
//!
//! A single `thiserror`-derived enum covers every failure mode the runtime
//! can produce, in the same single-enum-with-methods style the rest of this
//! codebase's ancestry uses instead of a type per subsystem.

use serde_json::Value;

/// The reason a provider call failed, as reported by the provider itself.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ProviderErrorReason {
    /// The provider rejected the request as malformed.
    InvalidRequest,
    /// The caller is not authorized to use this provider/model.
    Unauthorized,
    /// The provider is rate-limiting the caller.
    RateLimited,
    /// The provider (or its upstream) is temporarily unavailable.
    Unavailable,
    /// The provider returned a response this runtime could not parse.
    MalformedResponse,
    /// Any other provider-reported failure.
    Other,
}

/// Application-wide error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Input failed validation before any provider or tool was invoked.
    #[error("validation error: {0}")]
    Validation(String),

    /// A registry, session, or runtime was misconfigured.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A tool invocation failed or was rejected.
    #[error("tool '{tool}' failed: {cause}")]
    ToolExecution {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable cause.
        cause: String,
        /// The arguments the tool was invoked with, for diagnostics.
        parameters: Value,
    },

    /// A provider call failed.
    #[error("provider '{provider}' error ({reason:?}): {cause}")]
    Provider {
        /// Name of the provider that failed.
        provider: String,
        /// Human-readable cause.
        cause: String,
        /// Structured reason, used to decide retryability.
        reason: ProviderErrorReason,
    },

    /// A transport-level failure talking to a remote executor or provider.
    #[error("network error: {0}")]
    Network(String),

    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether retrying the operation that produced this error stands a
    /// reasonable chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Network(_) => true,
            AppError::Provider { reason, .. } => matches!(
                reason,
                ProviderErrorReason::RateLimited | ProviderErrorReason::Unavailable
            ),
            AppError::Validation(_)
            | AppError::Configuration(_)
            | AppError::ToolExecution { .. }
            | AppError::Internal(_) => false,
        }
    }
}

/// A specialized `Result` type for runtime operations.
pub type Result<T> = std::result::Result<T, AppError>;
