//! Provider abstraction: the [`AiProvider`] trait concrete adapters
//! implement, and the [`ProviderRegistry`] that looks them up by name.

/// The provider trait and the types that cross it.
pub mod provider;
/// Named provider registry and current-selection model.
pub mod registry;

pub use provider::{AiProvider, ChatOptions, ChatResponse, FinishReason, StreamChunk};
pub use registry::{ModelSelection, ProviderRegistry};
