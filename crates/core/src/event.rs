//! Inbound Events
//!
//! A narrow, backend-agnostic view of one received message. Constructed by the
//! messaging adapter per update, consumed by exactly one handler invocation.

use serde::{Deserialize, Serialize};

/// Identifier of a chat / channel on the messaging backend.
pub type ChatId = i64;

/// Identifier of a single message inside a chat.
pub type MessageId = i64;

/// Read-only view of one received message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Full message text as received.
    pub raw_text: String,
    /// True when this event reports an edit of an earlier message.
    pub is_edit: bool,
    /// Captures of the pattern that resolved this event to a command.
    /// Empty until the router fills it in.
    #[serde(default)]
    pub matched_groups: Vec<String>,
    pub origin_channel_id: ChatId,
    pub message_id: MessageId,
    pub replied_message_id: Option<MessageId>,
    /// Sender of the replied-to message, when the event is a reply.
    #[serde(default)]
    pub replied_sender_id: Option<i64>,
    /// Account that sent this message.
    pub sender_id: i64,
    /// Sent by the operator this agent acts for.
    pub is_outgoing: bool,
    /// One-to-one conversation with the sender.
    #[serde(default)]
    pub is_private: bool,
    /// The message mentions the operator.
    #[serde(default)]
    pub mentions_operator: bool,
}

impl InboundEvent {
    /// Build an operator-originated event with default metadata.
    pub fn outgoing(chat_id: ChatId, message_id: MessageId, text: impl Into<String>) -> Self {
        Self {
            raw_text: text.into(),
            is_edit: false,
            matched_groups: Vec::new(),
            origin_channel_id: chat_id,
            message_id,
            replied_message_id: None,
            replied_sender_id: None,
            sender_id: 0,
            is_outgoing: true,
            is_private: false,
            mentions_operator: false,
        }
    }

    /// Return a copy of this event carrying the router's captures.
    pub fn with_groups(mut self, groups: Vec<String>) -> Self {
        self.matched_groups = groups;
        self
    }

    /// Capture at `index`, or `None` when the group did not participate.
    pub fn group(&self, index: usize) -> Option<&str> {
        self.matched_groups
            .get(index)
            .map(String::as_str)
            .filter(|g| !g.is_empty())
    }

    /// First capture trimmed, or an empty string.
    pub fn argument(&self) -> &str {
        self.group(0).map(str::trim).unwrap_or("")
    }
}
