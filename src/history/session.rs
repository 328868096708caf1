//! A single conversation's message log, with tool-call integrity rules.

use crate::error::{AppError, Result};
use crate::types::{ApiMessage, Message, MessageRole};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Default cap on messages kept in a session before eviction kicks in.
pub const DEFAULT_MAX_MESSAGES: usize = 100;

/// One conversation's ordered message log.
///
/// Two invariants are enforced on every append:
///
/// 1. A `Tool` message's `tool_call_id` must match a tool call requested by
///    the most recent assistant turn that has not yet been answered.
/// 2. The same `tool_call_id` can never be answered twice.
///
/// Eviction never removes a `System` message; it removes the oldest
/// non-system message instead, and if that message was an assistant turn
/// with outstanding tool calls, the tool results that answered those calls
/// are evicted alongside it so the log never contains an orphaned tool
/// result.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    id: String,
    messages: Vec<Message>,
    max_messages: usize,
}

impl ConversationSession {
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_capacity(id, DEFAULT_MAX_MESSAGES)
    }

    pub fn with_capacity(id: impl Into<String>, max_messages: usize) -> Self {
        Self {
            id: id.into(),
            messages: Vec::new(),
            max_messages: max_messages.max(1),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Ids of tool calls requested by any assistant turn that have not yet
    /// been answered by a `Tool` message.
    ///
    /// A `tool_call_id`, once answered, is removed permanently — even if a
    /// later assistant turn happens to reuse the same id, it must not be
    /// answerable a second time. Tool call ids are meant to be unique for
    /// the life of the session, so a repeat is treated as a duplicate-answer
    /// attempt rather than a fresh request.
    fn outstanding_tool_call_ids(&self) -> HashSet<String> {
        let mut requested = HashSet::new();
        let mut answered = HashSet::new();
        for msg in &self.messages {
            match msg {
                Message::Assistant(a) => {
                    for call in &a.tool_calls {
                        requested.insert(call.id.clone());
                    }
                }
                Message::Tool(t) => {
                    answered.insert(t.tool_call_id.clone());
                }
                _ => {}
            }
        }
        requested.difference(&answered).cloned().collect()
    }

    /// Append a message, validating tool-call integrity, then evict if the
    /// session has grown past `max_messages`.
    pub fn append(&mut self, message: Message) -> Result<()> {
        if let Message::Tool(tool_msg) = &message {
            let outstanding = self.outstanding_tool_call_ids();
            if !outstanding.contains(&tool_msg.tool_call_id) {
                return Err(AppError::Validation(format!(
                    "tool result for unknown or already-answered tool_call_id '{}'",
                    tool_msg.tool_call_id
                )));
            }
        }

        self.messages.push(message);
        debug!(session_id = %self.id, len = self.messages.len(), "appended message to session");
        self.evict_if_needed();
        Ok(())
    }

    fn evict_if_needed(&mut self) {
        while self.messages.len() > self.max_messages {
            let Some(victim_idx) = self.messages.iter().position(|m| !m.is_system()) else {
                // Every remaining message is a system message; stop evicting
                // rather than discard one.
                break;
            };

            let victim = self.messages.remove(victim_idx);
            warn!(session_id = %self.id, "evicting oldest message to stay under capacity");

            if let Message::Assistant(a) = &victim {
                let evicted_ids: HashSet<String> =
                    a.tool_calls.iter().map(|c| c.id.clone()).collect();
                if !evicted_ids.is_empty() {
                    self.messages.retain(|m| match m.tool_call_id() {
                        Some(id) => !evicted_ids.contains(id),
                        None => true,
                    });
                }
            }
        }
    }

    /// Remove every message from the session, including system messages.
    /// The session itself (its id and capacity) is unaffected.
    pub fn clear(&mut self) {
        self.messages.clear();
        debug!(session_id = %self.id, "cleared session");
    }

    /// All messages with the given role, in log order.
    pub fn messages_by_role(&self, role: MessageRole) -> Vec<&Message> {
        self.messages.iter().filter(|m| m.role() == role).collect()
    }

    /// The last `n` messages in the log (or all of them, if there are fewer
    /// than `n`).
    pub fn recent_messages(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    /// The full log projected to the wire shape sent to a provider.
    pub fn messages_for_api(&self) -> Vec<ApiMessage> {
        self.messages.iter().map(Message::to_api).collect()
    }

    /// Strip any `Tool` message that answers a tool call no longer present
    /// in the log (for example after loading a persisted, possibly
    /// truncated, session). Returns the number of messages removed.
    pub fn prune_orphaned_tool_results(&mut self) -> usize {
        let known_ids: HashSet<String> = self
            .messages
            .iter()
            .filter_map(|m| match m {
                Message::Assistant(a) => Some(a.tool_calls.iter().map(|c| c.id.clone())),
                _ => None,
            })
            .flatten()
            .collect();

        let before = self.messages.len();
        self.messages.retain(|m| match m.tool_call_id() {
            Some(id) => known_ids.contains(id),
            None => true,
        });
        before - self.messages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn appends_plain_messages() {
        let mut session = ConversationSession::new("s1");
        session.append(Message::user("hello")).unwrap();
        session.append(Message::assistant(Some("hi".into()), vec![])).unwrap();
        assert_eq!(session.len(), 2);
    }

    #[test]
    fn rejects_tool_result_with_unknown_id() {
        let mut session = ConversationSession::new("s1");
        let err = session
            .append(Message::tool_result("call_1", "ok"))
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn rejects_duplicate_tool_call_id_answer() {
        let mut session = ConversationSession::new("s1");
        session
            .append(Message::assistant(
                None,
                vec![crate::types::ToolCall::function("call_1", "calculator", json!({}))],
            ))
            .unwrap();
        session
            .append(Message::tool_result("call_1", "4"))
            .unwrap();
        let err = session
            .append(Message::tool_result("call_1", "5"))
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn rejects_answer_for_an_id_already_answered_even_if_re_requested() {
        let mut session = ConversationSession::new("s1");
        session
            .append(Message::assistant(
                None,
                vec![crate::types::ToolCall::function("call_1", "calculator", json!({}))],
            ))
            .unwrap();
        session
            .append(Message::tool_result("call_1", "4"))
            .unwrap();
        // A later turn reusing the same id should not make it answerable again.
        session
            .append(Message::assistant(
                None,
                vec![crate::types::ToolCall::function("call_1", "calculator", json!({}))],
            ))
            .unwrap();
        let err = session
            .append(Message::tool_result("call_1", "5"))
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn preserves_none_content_through_append() {
        let mut session = ConversationSession::new("s1");
        session
            .append(Message::assistant(
                None,
                vec![crate::types::ToolCall::function("call_1", "calculator", json!({}))],
            ))
            .unwrap();
        match &session.messages()[0] {
            Message::Assistant(a) => assert!(a.content.is_none()),
            _ => panic!("expected assistant message"),
        }
    }

    #[test]
    fn eviction_never_removes_system_messages() {
        let mut session = ConversationSession::with_capacity("s1", 3);
        session.append(Message::system("be helpful")).unwrap();
        for i in 0..10 {
            session.append(Message::user(format!("turn {i}"))).unwrap();
        }
        assert!(session.messages().iter().any(|m| m.is_system()));
        assert!(session.len() <= 3);
    }

    #[test]
    fn eviction_removes_orphaned_tool_results_with_their_assistant_turn() {
        let mut session = ConversationSession::with_capacity("s1", 2);
        session.append(Message::system("be helpful")).unwrap();
        session
            .append(Message::assistant(
                None,
                vec![crate::types::ToolCall::function("call_1", "calculator", json!({}))],
            ))
            .unwrap();
        session
            .append(Message::tool_result("call_1", "4"))
            .unwrap();
        session.append(Message::user("and then?")).unwrap();

        for msg in session.messages() {
            if let Message::Tool(t) = msg {
                let has_caller = session.messages().iter().any(|m| {
                    matches!(m, Message::Assistant(a) if a.tool_calls.iter().any(|c| c.id == t.tool_call_id))
                });
                assert!(has_caller, "found orphaned tool result after eviction");
            }
        }
    }

    #[test]
    fn prune_orphaned_tool_results_removes_unmatched_tool_messages() {
        let mut session = ConversationSession::new("s1");
        session.messages.push(Message::tool_result("dangling", "orphan"));
        let removed = session.prune_orphaned_tool_results();
        assert_eq!(removed, 1);
        assert!(session.is_empty());
    }

    #[test]
    fn clear_empties_the_session_including_system_messages() {
        let mut session = ConversationSession::new("s1");
        session.append(Message::system("be helpful")).unwrap();
        session.append(Message::user("hi")).unwrap();
        session.clear();
        assert!(session.is_empty());
    }

    #[test]
    fn messages_by_role_filters_the_log() {
        let mut session = ConversationSession::new("s1");
        session.append(Message::system("be helpful")).unwrap();
        session.append(Message::user("hi")).unwrap();
        session.append(Message::assistant(Some("hello".into()), vec![])).unwrap();

        assert_eq!(session.messages_by_role(crate::types::MessageRole::User).len(), 1);
        assert_eq!(session.messages_by_role(crate::types::MessageRole::Assistant).len(), 1);
        assert_eq!(session.messages_by_role(crate::types::MessageRole::System).len(), 1);
        assert_eq!(session.messages_by_role(crate::types::MessageRole::Tool).len(), 0);
    }

    #[test]
    fn recent_messages_returns_the_tail_of_the_log() {
        let mut session = ConversationSession::new("s1");
        for i in 0..5 {
            session.append(Message::user(format!("turn {i}"))).unwrap();
        }
        let recent = session.recent_messages(2);
        assert_eq!(recent.len(), 2);
        match &recent[1] {
            Message::User(u) => assert_eq!(u.content, "turn 4"),
            _ => panic!("expected user message"),
        }
    }

    #[test]
    fn recent_messages_saturates_when_asked_for_more_than_the_log_holds() {
        let mut session = ConversationSession::new("s1");
        session.append(Message::user("hi")).unwrap();
        assert_eq!(session.recent_messages(50).len(), 1);
    }

    #[test]
    fn messages_for_api_projects_every_message_to_the_wire_shape() {
        let mut session = ConversationSession::new("s1");
        session.append(Message::user("hi")).unwrap();
        session
            .append(Message::assistant(
                None,
                vec![crate::types::ToolCall::function("call_1", "calculator", json!({}))],
            ))
            .unwrap();
        session.append(Message::tool_result("call_1", "4")).unwrap();

        let api_messages = session.messages_for_api();
        assert_eq!(api_messages.len(), 3);
        assert_eq!(api_messages[2].tool_call_id.as_deref(), Some("call_1"));
    }
}
