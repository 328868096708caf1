//! A bounded collection of [`ConversationSession`]s keyed by conversation id.

use super::session::{ConversationSession, DEFAULT_MAX_MESSAGES};
use crate::error::Result;
use std::collections::HashMap;
use tracing::info;

/// Default number of distinct conversations kept in memory at once.
pub const DEFAULT_MAX_SESSIONS: usize = 50;

/// Generates a fresh conversation id for callers that do not have one of
/// their own (a new chat window, a CLI session with no persisted state).
pub fn new_conversation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Multi-session conversation store.
///
/// When a new session would push the store over `max_sessions`, the least
/// recently touched session is evicted to make room — "touched" meaning
/// created or appended to, tracked via an insertion-order queue rather than
/// wall-clock time so eviction stays deterministic in tests.
pub struct ConversationHistory {
    sessions: HashMap<String, ConversationSession>,
    order: Vec<String>,
    max_sessions: usize,
    max_messages_per_session: usize,
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_SESSIONS, DEFAULT_MAX_MESSAGES)
    }

    pub fn with_limits(max_sessions: usize, max_messages_per_session: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            order: Vec::new(),
            max_sessions: max_sessions.max(1),
            max_messages_per_session,
        }
    }

    /// Get or create the session for `conversation_id`, marking it as most
    /// recently touched.
    pub fn session_mut(&mut self, conversation_id: &str) -> &mut ConversationSession {
        if !self.sessions.contains_key(conversation_id) {
            self.sessions.insert(
                conversation_id.to_string(),
                ConversationSession::with_capacity(conversation_id, self.max_messages_per_session),
            );
            self.touch(conversation_id);
            self.evict_if_needed();
        } else {
            self.touch(conversation_id);
        }
        self.sessions.get_mut(conversation_id).expect("just inserted or present")
    }

    pub fn get(&self, conversation_id: &str) -> Option<&ConversationSession> {
        self.sessions.get(conversation_id)
    }

    pub fn remove(&mut self, conversation_id: &str) -> Option<ConversationSession> {
        self.order.retain(|id| id != conversation_id);
        self.sessions.remove(conversation_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn touch(&mut self, conversation_id: &str) {
        self.order.retain(|id| id != conversation_id);
        self.order.push(conversation_id.to_string());
    }

    fn evict_if_needed(&mut self) {
        while self.sessions.len() > self.max_sessions {
            if self.order.is_empty() {
                break;
            }
            let oldest = self.order.remove(0);
            info!(conversation_id = %oldest, "evicting least-recently-touched session");
            self.sessions.remove(&oldest);
        }
    }
}

/// Convenience wrapper for the common "resolve session, append, surface any
/// integrity error" flow.
pub fn append_message(
    history: &mut ConversationHistory,
    conversation_id: &str,
    message: crate::types::Message,
) -> Result<()> {
    history.session_mut(conversation_id).append(message)
}
