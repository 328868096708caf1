//! Core data model: messages, tool calls, and the metadata they carry.
//!
//! A conversation is a sequence of [`Message`] values. Unlike a plain
//! role/content pair, each variant here carries exactly the fields that
//! variant needs — in particular an assistant message's `content` is
//! `Option<String>` because a tool-calling turn frequently has no text at
//! all, and collapsing that to `""` would erase a distinction the
//! orchestrator and any downstream renderer need to preserve.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Arbitrary metadata attached to a message.
///
/// `metadata` is free-form per message (provider identifiers, trace ids,
/// token counts, …); it is not interpreted by the history or orchestrator
/// themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    String(String),
    Number(f64),
    Bool(bool),
    DateTime(DateTime<Utc>),
    Array(Vec<MetadataValue>),
}

pub type Metadata = HashMap<String, MetadataValue>;

/// A user-authored message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMessage {
    pub content: String,
    /// Optional display name for the author, passed through to providers
    /// that support multi-user chat (e.g. distinguishing two humans in the
    /// same conversation).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// A system/instruction message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemMessage {
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// A message produced by the assistant.
///
/// `content` is `None` when the assistant's turn consisted solely of tool
/// calls. `None` and `Some(String::new())` are not interchangeable — callers
/// that collapse the two lose the information that the model said nothing
/// at all this turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// The result of a single tool invocation, fed back to the provider.
///
/// `content` is always a string, matching the wire shape every provider's
/// tool-result message expects: a JSON object result is serialized to its
/// JSON text, not passed through as a nested value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMessage {
    pub tool_call_id: String,
    pub content: String,
    /// Name of the tool that produced this result, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    User(UserMessage),
    Assistant(AssistantMessage),
    System(SystemMessage),
    Tool(ToolMessage),
}

/// The role tag of a [`Message`], independent of its payload — useful for
/// filtering a session's log by role without matching on the full enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
    Tool,
}

/// The wire-shaped projection of a [`Message`] sent to a provider: a flat
/// role/content/tool_calls/tool_call_id/name record, the same shape every
/// chat-completions-style API expects, collapsing the four message variants
/// into one.
#[derive(Debug, Clone, Serialize)]
pub struct ApiMessage {
    pub role: MessageRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Message::User(UserMessage {
            content: content.into(),
            name: None,
            timestamp: Utc::now(),
            metadata: Metadata::new(),
        })
    }

    pub fn system(content: impl Into<String>) -> Self {
        Message::System(SystemMessage {
            content: content.into(),
            timestamp: Utc::now(),
            metadata: Metadata::new(),
        })
    }

    pub fn assistant(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Message::Assistant(AssistantMessage {
            content,
            tool_calls,
            timestamp: Utc::now(),
            metadata: Metadata::new(),
        })
    }

    /// A successful tool result. `content` is the string fed back to the
    /// provider verbatim — callers holding a JSON value should serialize it
    /// themselves first.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Message::Tool(ToolMessage {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            name: None,
            timestamp: Utc::now(),
            metadata: Metadata::new(),
        })
    }

    /// A failed tool result. Content is always `"Error: <message>"`, and
    /// `metadata.success` is set to `false` so a renderer or the provider's
    /// own reasoning can tell a reported failure apart from a result that
    /// merely looks like one.
    pub fn tool_error(tool_call_id: impl Into<String>, message: impl Into<String>) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert("success".to_string(), MetadataValue::Bool(false));
        Message::Tool(ToolMessage {
            tool_call_id: tool_call_id.into(),
            content: format!("Error: {}", message.into()),
            name: None,
            timestamp: Utc::now(),
            metadata,
        })
    }

    /// Attach a display name. Only meaningful for [`Message::User`] and
    /// [`Message::Tool`] (the two variants the wire format allows a `name`
    /// on); a no-op on the others.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = Some(name.into());
        match &mut self {
            Message::User(m) => m.name = name,
            Message::Tool(m) => m.name = name,
            Message::Assistant(_) | Message::System(_) => {}
        }
        self
    }

    /// The role tag of this message.
    pub fn role(&self) -> MessageRole {
        match self {
            Message::User(_) => MessageRole::User,
            Message::Assistant(_) => MessageRole::Assistant,
            Message::System(_) => MessageRole::System,
            Message::Tool(_) => MessageRole::Tool,
        }
    }

    /// Project this message to the flat shape sent to a provider.
    pub fn to_api(&self) -> ApiMessage {
        match self {
            Message::User(m) => ApiMessage {
                role: MessageRole::User,
                content: Some(m.content.clone()),
                tool_calls: Vec::new(),
                tool_call_id: None,
                name: m.name.clone(),
            },
            Message::System(m) => ApiMessage {
                role: MessageRole::System,
                content: Some(m.content.clone()),
                tool_calls: Vec::new(),
                tool_call_id: None,
                name: None,
            },
            Message::Assistant(m) => ApiMessage {
                role: MessageRole::Assistant,
                content: m.content.clone(),
                tool_calls: m.tool_calls.clone(),
                tool_call_id: None,
                name: None,
            },
            Message::Tool(m) => ApiMessage {
                role: MessageRole::Tool,
                content: Some(m.content.clone()),
                tool_calls: Vec::new(),
                tool_call_id: Some(m.tool_call_id.clone()),
                name: m.name.clone(),
            },
        }
    }

    /// Timestamp common to every variant.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Message::User(m) => m.timestamp,
            Message::Assistant(m) => m.timestamp,
            Message::System(m) => m.timestamp,
            Message::Tool(m) => m.timestamp,
        }
    }

    /// Whether this message must never be evicted from a bounded history.
    pub fn is_system(&self) -> bool {
        matches!(self, Message::System(_))
    }

    /// The tool_call_id this message answers, if it is a tool result.
    pub fn tool_call_id(&self) -> Option<&str> {
        match self {
            Message::Tool(m) => Some(m.tool_call_id.as_str()),
            _ => None,
        }
    }

    /// The tool call ids an assistant message requested, if any.
    pub fn requested_tool_call_ids(&self) -> &[ToolCall] {
        match self {
            Message::Assistant(m) => &m.tool_calls,
            _ => &[],
        }
    }
}

/// The kind of a tool call. Only function calls are modeled today; the enum
/// leaves room for future call kinds without a breaking change to
/// [`ToolCall`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallKind {
    Function,
}

/// A function invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: Value,
}

/// A single tool call attached to an assistant turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ToolCallKind,
    pub function: FunctionCall,
}

impl ToolCall {
    pub fn function(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        ToolCall {
            id: id.into(),
            kind: ToolCallKind::Function,
            function: FunctionCall {
                name: name.into(),
                arguments,
            },
        }
    }
}

/// Describes a tool to a provider: name, human-readable purpose, and a JSON
/// Schema for its arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}
