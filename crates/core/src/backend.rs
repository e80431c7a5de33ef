//! Messaging Backend Capability
//!
//! The small slice of the messaging platform that command handlers actually
//! need: send, edit, delete, upload, and resolve a user. Platform adapters
//! implement this trait; handlers never see platform-specific types.
//!
//! All outbound text is HTML-formatted.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{CoreError, CoreResult};
use crate::event::{ChatId, MessageId};

/// Failures reported by a messaging backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// The platform asked us to back off before the next request.
    #[error("Rate limited, retry after {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    /// Chat, message, or user does not exist or is not visible.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other request failure.
    #[error("Request failed: {0}")]
    Request(String),
}

impl BackendError {
    /// True for the distinguished back-off condition.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, BackendError::RateLimited { .. })
    }
}

/// Free-form identifier of a user or entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserQuery {
    Id(i64),
    Handle(String),
}

impl UserQuery {
    /// Parse a numeric id or a handle (with or without leading `@`).
    pub fn parse(input: &str) -> CoreResult<Self> {
        let input = input.trim();
        if let Ok(id) = input.parse::<i64>() {
            return Ok(UserQuery::Id(id));
        }
        let handle = input.trim_start_matches('@');
        if handle.is_empty() || handle.chars().any(char::is_whitespace) {
            return Err(CoreError::validation(format!("Invalid user: {:?}", input)));
        }
        Ok(UserQuery::Handle(handle.to_string()))
    }
}

/// Rich record describing a resolved user or entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub bio: Option<String>,
    /// Chats shared with the operator, when the platform exposes it.
    pub common_chats_count: Option<u32>,
    /// Platform reference to the profile photo.
    pub avatar: Option<String>,
    /// False for groups and channels.
    pub is_user: bool,
    /// True when the record describes the operator.
    pub is_self: bool,
}

/// A file attachment built in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingFile {
    pub file_name: String,
    pub data: Vec<u8>,
    pub caption: Option<String>,
}

impl OutgoingFile {
    pub fn new(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            data,
            caption: None,
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }
}

/// Messaging backend capability used by command handlers.
#[async_trait]
pub trait MessagingBackend: Send + Sync {
    /// Send a new message, optionally as a reply. Returns the new message id.
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageId, BackendError>;

    /// Replace the text of an existing message.
    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), BackendError>;

    /// Delete a message.
    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId)
        -> Result<(), BackendError>;

    /// Upload a file attachment. Returns the id of the message carrying it.
    async fn send_file(
        &self,
        chat_id: ChatId,
        file: OutgoingFile,
        reply_to: Option<MessageId>,
    ) -> Result<MessageId, BackendError>;

    /// Resolve a numeric id or handle to a user record.
    async fn resolve_user(&self, query: &UserQuery) -> Result<UserRecord, BackendError>;

    /// Edit `message_id`, or reply to it when the edit is refused.
    ///
    /// Returns the id of the message that now shows `text`. Rate limiting is
    /// not a refusal and is returned to the caller unchanged.
    async fn update_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
    ) -> Result<MessageId, BackendError> {
        match self.edit_message(chat_id, message_id, text).await {
            Ok(()) => Ok(message_id),
            Err(err) if err.is_rate_limited() => Err(err),
            Err(_) => self.send_message(chat_id, text, Some(message_id)).await,
        }
    }
}
