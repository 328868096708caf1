//! Conversation history: per-conversation message logs with tool-call
//! integrity rules, and a bounded multi-conversation store.

pub mod session;
pub mod store;

pub use session::{ConversationSession, DEFAULT_MAX_MESSAGES};
pub use store::{append_message, new_conversation_id, ConversationHistory, DEFAULT_MAX_SESSIONS};
