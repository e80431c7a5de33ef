//! Recording Adapter
//!
//! In-memory messaging backend that records every call. Message ids are
//! allocated sequentially; edits can be scripted to start failing, or to be
//! refused on messages the backend did not send itself.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chat_companion_core::{
    BackendError, ChatId, InboundEvent, MessageId, MessagingBackend, OutgoingFile, UserQuery,
    UserRecord,
};
use tokio::sync::mpsc;

use super::RemoteAdapter;
use crate::utils::error::AppResult;

/// First id handed out by the backend. Lower ids belong to other senders.
pub const FIRST_MESSAGE_ID: MessageId = 1000;

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Send {
        chat_id: ChatId,
        message_id: MessageId,
        text: String,
        reply_to: Option<MessageId>,
    },
    Edit {
        chat_id: ChatId,
        message_id: MessageId,
        text: String,
    },
    Delete {
        chat_id: ChatId,
        message_id: MessageId,
    },
    File {
        chat_id: ChatId,
        message_id: MessageId,
        file: OutgoingFile,
        reply_to: Option<MessageId>,
    },
}

/// Backend double for tests and dry runs.
pub struct RecordingBackend {
    calls: Mutex<Vec<Call>>,
    users: Mutex<HashMap<i64, UserRecord>>,
    next_id: AtomicI64,
    edit_attempts: AtomicUsize,
    /// Successful edits left before edits start failing; `None` = never fail
    edits_left: Mutex<Option<usize>>,
    edit_error: Mutex<BackendError>,
    own_edits_only: AtomicBool,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            users: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(FIRST_MESSAGE_ID),
            edit_attempts: AtomicUsize::new(0),
            edits_left: Mutex::new(None),
            edit_error: Mutex::new(BackendError::Request("message can't be edited".to_string())),
            own_edits_only: AtomicBool::new(false),
        }
    }

    /// Allow `n` more successful edits, then fail every edit.
    pub fn fail_edits_after(&self, n: usize) {
        *lock(&self.edits_left) = Some(n);
    }

    /// Refuse edits of messages this backend did not send, the way a bot
    /// account cannot edit the operator's messages.
    pub fn refuse_foreign_edits(&self) {
        self.own_edits_only.store(true, Ordering::SeqCst);
    }

    /// Error returned by failing edits.
    pub fn fail_edits_with(&self, error: BackendError) {
        *lock(&self.edit_error) = error;
    }

    /// Make a user resolvable by id and username.
    pub fn add_user(&self, user: UserRecord) {
        lock(&self.users).insert(user.id, user);
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    /// Successful edits as `(message_id, text)`.
    pub fn edits(&self) -> Vec<(MessageId, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Edit {
                    message_id, text, ..
                } => Some((message_id, text)),
                _ => None,
            })
            .collect()
    }

    /// Sent messages as `(chat_id, text, reply_to)`.
    pub fn sent(&self) -> Vec<(ChatId, String, Option<MessageId>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Send {
                    chat_id,
                    text,
                    reply_to,
                    ..
                } => Some((chat_id, text, reply_to)),
                _ => None,
            })
            .collect()
    }

    pub fn files(&self) -> Vec<OutgoingFile> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::File { file, .. } => Some(file),
                _ => None,
            })
            .collect()
    }

    pub fn deleted(&self) -> Vec<MessageId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Delete { message_id, .. } => Some(message_id),
                _ => None,
            })
            .collect()
    }

    /// Every edit attempt, failed ones included.
    pub fn edit_attempts(&self) -> usize {
        self.edit_attempts.load(Ordering::SeqCst)
    }

    /// Text most recently shown on `message_id` by an edit.
    pub fn last_edit_of(&self, message_id: MessageId) -> Option<String> {
        self.edits()
            .into_iter()
            .rev()
            .find(|(id, _)| *id == message_id)
            .map(|(_, text)| text)
    }

    fn allocate_id(&self) -> MessageId {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        lock(&self.calls).push(call);
    }
}

#[async_trait]
impl MessagingBackend for RecordingBackend {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageId, BackendError> {
        let message_id = self.allocate_id();
        self.record(Call::Send {
            chat_id,
            message_id,
            text: text.to_string(),
            reply_to,
        });
        Ok(message_id)
    }

    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), BackendError> {
        self.edit_attempts.fetch_add(1, Ordering::SeqCst);
        if self.own_edits_only.load(Ordering::SeqCst) && message_id < FIRST_MESSAGE_ID {
            return Err(lock(&self.edit_error).clone());
        }
        {
            let mut left = lock(&self.edits_left);
            match left.as_mut() {
                Some(0) => return Err(lock(&self.edit_error).clone()),
                Some(n) => *n -= 1,
                None => {}
            }
        }
        self.record(Call::Edit {
            chat_id,
            message_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn delete_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<(), BackendError> {
        self.record(Call::Delete {
            chat_id,
            message_id,
        });
        Ok(())
    }

    async fn send_file(
        &self,
        chat_id: ChatId,
        file: OutgoingFile,
        reply_to: Option<MessageId>,
    ) -> Result<MessageId, BackendError> {
        let message_id = self.allocate_id();
        self.record(Call::File {
            chat_id,
            message_id,
            file,
            reply_to,
        });
        Ok(message_id)
    }

    async fn resolve_user(&self, query: &UserQuery) -> Result<UserRecord, BackendError> {
        let users = lock(&self.users);
        let found = match query {
            UserQuery::Id(id) => users.get(id).cloned(),
            UserQuery::Handle(handle) => users
                .values()
                .find(|u| u.username.as_deref() == Some(handle.as_str()))
                .cloned(),
        };
        found.ok_or_else(|| BackendError::NotFound(format!("No user matches {:?}", query)))
    }
}

#[async_trait]
impl RemoteAdapter for RecordingBackend {
    fn name(&self) -> &'static str {
        "recording"
    }

    /// Nothing arrives on its own; tests feed the gateway directly.
    async fn start(&self, _event_tx: mpsc::Sender<InboundEvent>) -> AppResult<()> {
        Ok(())
    }

    async fn stop(&self) -> AppResult<()> {
        Ok(())
    }

    async fn health_check(&self) -> AppResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_records_calls_with_sequential_ids() {
        let backend = RecordingBackend::new();
        let first = backend.send_message(1, "a", None).await.unwrap();
        let second = backend.send_message(1, "b", Some(first)).await.unwrap();
        assert_eq!(second, first + 1);
        assert_eq!(
            backend.sent(),
            vec![(1, "a".to_string(), None), (1, "b".to_string(), Some(first))]
        );
    }

    #[tokio::test]
    async fn test_scripted_edit_failures() {
        let backend = RecordingBackend::new();
        backend.fail_edits_after(1);
        assert!(backend.edit_message(1, 5, "ok").await.is_ok());
        assert!(backend.edit_message(1, 5, "no").await.is_err());
        assert_eq!(backend.edit_attempts(), 2);
        assert_eq!(backend.last_edit_of(5).as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn test_foreign_edits_refused() {
        let backend = RecordingBackend::new();
        backend.refuse_foreign_edits();
        let reply = backend.update_message(1, 5, "first").await.unwrap();
        assert_eq!(reply, FIRST_MESSAGE_ID);
        assert_eq!(backend.update_message(1, reply, "second").await.unwrap(), reply);
        assert_eq!(backend.sent().len(), 1);
        assert_eq!(backend.last_edit_of(reply).as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_update_message_rate_limit_not_refusal() {
        let backend = RecordingBackend::new();
        backend.fail_edits_after(0);
        backend.fail_edits_with(BackendError::RateLimited {
            retry_after: Duration::from_secs(3),
        });
        let result = backend.update_message(1, 5, "x").await;
        assert!(matches!(result, Err(BackendError::RateLimited { .. })));
        assert!(backend.sent().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_user_by_handle() {
        let backend = RecordingBackend::new();
        backend.add_user(UserRecord {
            id: 9,
            first_name: "Nine".to_string(),
            last_name: None,
            username: Some("nine".to_string()),
            bio: None,
            common_chats_count: None,
            avatar: None,
            is_user: true,
            is_self: false,
        });
        let user = backend
            .resolve_user(&UserQuery::Handle("nine".to_string()))
            .await
            .unwrap();
        assert_eq!(user.id, 9);
        assert!(matches!(
            backend.resolve_user(&UserQuery::Id(10)).await,
            Err(BackendError::NotFound(_))
        ));
    }
}
