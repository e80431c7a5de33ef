//! Telegram Adapter
//!
//! Telegram Bot adapter using teloxide for long-polling message reception.
//! New and edited text messages become `InboundEvent`s; messages from the
//! configured operator account are flagged as self-originated. All outbound
//! text uses HTML parse mode.

use async_trait::async_trait;
use chat_companion_core::{
    BackendError, ChatId, InboundEvent, MessageId, MessagingBackend, OutgoingFile, UserQuery,
    UserRecord,
};
use serde_json::Value;
use teloxide::prelude::*;
use teloxide::types::{InputFile, ParseMode, Recipient, ReplyParameters};
use teloxide::{ApiError, RequestError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::RemoteAdapter;
use crate::models::settings::TelegramConfig;
use crate::utils::error::{AppError, AppResult};

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Messaging library reported by `.version`.
pub const LIBRARY_NAME: &str = "Teloxide";
pub const LIBRARY_VERSION: &str = "0.17";

/// Identifies the operator among message senders.
#[derive(Debug, Clone, Default)]
pub struct OperatorFilter {
    pub user_id: i64,
    pub username: Option<String>,
}

impl OperatorFilter {
    pub fn from_config(config: &TelegramConfig) -> Self {
        Self {
            user_id: config.operator_user_id,
            username: config
                .operator_username
                .as_ref()
                .map(|u| u.trim_start_matches('@').to_string()),
        }
    }

    pub fn is_operator(&self, sender_id: i64) -> bool {
        self.user_id != 0 && sender_id == self.user_id
    }

    pub fn is_mentioned(&self, text: &str) -> bool {
        match &self.username {
            Some(handle) if !handle.is_empty() => text.contains(&format!("@{}", handle)),
            _ => false,
        }
    }
}

/// Platform-independent fields of one received message.
#[derive(Debug, Clone, Default)]
pub struct RawMessage {
    pub text: String,
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub sender_id: i64,
    pub is_private: bool,
    pub replied_message_id: Option<MessageId>,
    pub replied_sender_id: Option<i64>,
}

/// Build the event the gateway sees for one message.
pub fn build_event(raw: RawMessage, is_edit: bool, operator: &OperatorFilter) -> InboundEvent {
    InboundEvent {
        is_outgoing: operator.is_operator(raw.sender_id),
        mentions_operator: operator.is_mentioned(&raw.text),
        raw_text: raw.text,
        is_edit,
        matched_groups: Vec::new(),
        origin_channel_id: raw.chat_id,
        message_id: raw.message_id,
        replied_message_id: raw.replied_message_id,
        replied_sender_id: raw.replied_sender_id,
        sender_id: raw.sender_id,
        is_private: raw.is_private,
    }
}

fn raw_message(msg: &Message) -> Option<RawMessage> {
    let text = msg.text().or_else(|| msg.caption())?;
    let replied = msg.reply_to_message();
    Some(RawMessage {
        text: text.to_string(),
        chat_id: msg.chat.id.0,
        message_id: msg.id.0 as i64,
        sender_id: msg.from.as_ref().map(|u| u.id.0 as i64).unwrap_or(0),
        is_private: msg.chat.is_private(),
        replied_message_id: replied.map(|m| m.id.0 as i64),
        replied_sender_id: replied
            .and_then(|m| m.from.as_ref())
            .map(|u| u.id.0 as i64),
    })
}

/// Map a teloxide failure onto the backend error taxonomy.
pub fn map_request_error(err: RequestError) -> BackendError {
    match &err {
        RequestError::RetryAfter(secs) => BackendError::RateLimited {
            retry_after: secs.duration(),
        },
        RequestError::Api(ApiError::ChatNotFound | ApiError::UserNotFound) => {
            BackendError::NotFound(err.to_string())
        }
        _ => BackendError::Request(err.to_string()),
    }
}

/// Build a user record from the Bot API JSON of a chat.
pub fn user_record_from_json(chat: &Value, operator_user_id: i64) -> UserRecord {
    let text = |key: &str| chat.get(key).and_then(Value::as_str).map(str::to_string);
    let id = chat.get("id").and_then(Value::as_i64).unwrap_or(0);
    let is_user = chat.get("type").and_then(Value::as_str) == Some("private");
    UserRecord {
        id,
        first_name: text("first_name").or_else(|| text("title")).unwrap_or_default(),
        last_name: text("last_name"),
        username: text("username"),
        bio: text("bio").or_else(|| text("description")),
        common_chats_count: None,
        avatar: chat
            .get("photo")
            .and_then(|p| p.get("big_file_id"))
            .and_then(Value::as_str)
            .map(str::to_string),
        is_user,
        is_self: operator_user_id != 0 && id == operator_user_id,
    }
}

/// Telegram Bot adapter using teloxide with long-polling.
pub struct TelegramAdapter {
    pub(crate) bot: Bot,
    pub(crate) operator: OperatorFilter,
    pub(crate) cancel_token: CancellationToken,
}

impl TelegramAdapter {
    pub fn new(config: &TelegramConfig) -> AppResult<Self> {
        let bot_token = config
            .bot_token
            .as_ref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AppError::config("Bot token is required"))?;

        let operator = OperatorFilter::from_config(config);
        if operator.user_id == 0 {
            tracing::warn!("[Telegram] operator_user_id is not set, no command will be dispatched");
        }

        Ok(Self {
            bot: Bot::new(bot_token),
            operator,
            cancel_token: CancellationToken::new(),
        })
    }
}

#[async_trait]
impl MessagingBackend for TelegramAdapter {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageId, BackendError> {
        let mut request = self
            .bot
            .send_message(teloxide::types::ChatId(chat_id), text)
            .parse_mode(ParseMode::Html);
        if let Some(id) = reply_to {
            request = request.reply_parameters(ReplyParameters::new(teloxide::types::MessageId(
                id as i32,
            )));
        }
        let sent = request.await.map_err(map_request_error)?;
        Ok(sent.id.0 as i64)
    }

    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), BackendError> {
        let result = self
            .bot
            .edit_message_text(
                teloxide::types::ChatId(chat_id),
                teloxide::types::MessageId(message_id as i32),
                text,
            )
            .parse_mode(ParseMode::Html)
            .await;
        match result {
            Ok(_) => Ok(()),
            // Same text as before: the message already shows it.
            Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
            Err(e) => Err(map_request_error(e)),
        }
    }

    async fn delete_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<(), BackendError> {
        self.bot
            .delete_message(
                teloxide::types::ChatId(chat_id),
                teloxide::types::MessageId(message_id as i32),
            )
            .await
            .map_err(map_request_error)?;
        Ok(())
    }

    async fn send_file(
        &self,
        chat_id: ChatId,
        file: OutgoingFile,
        reply_to: Option<MessageId>,
    ) -> Result<MessageId, BackendError> {
        let input = InputFile::memory(file.data).file_name(file.file_name);
        let mut request = self
            .bot
            .send_document(teloxide::types::ChatId(chat_id), input);
        if let Some(caption) = file.caption {
            request = request.caption(caption).parse_mode(ParseMode::Html);
        }
        if let Some(id) = reply_to {
            request = request.reply_parameters(ReplyParameters::new(teloxide::types::MessageId(
                id as i32,
            )));
        }
        let sent = request.await.map_err(map_request_error)?;
        Ok(sent.id.0 as i64)
    }

    async fn resolve_user(&self, query: &UserQuery) -> Result<UserRecord, BackendError> {
        let recipient = match query {
            UserQuery::Id(id) => Recipient::Id(teloxide::types::ChatId(*id)),
            UserQuery::Handle(handle) => Recipient::ChannelUsername(format!("@{}", handle)),
        };
        let chat = self
            .bot
            .get_chat(recipient)
            .await
            .map_err(map_request_error)?;
        let json = serde_json::to_value(&chat).map_err(|e| BackendError::Request(e.to_string()))?;
        Ok(user_record_from_json(&json, self.operator.user_id))
    }
}

#[async_trait]
impl RemoteAdapter for TelegramAdapter {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn start(&self, event_tx: mpsc::Sender<InboundEvent>) -> AppResult<()> {
        use teloxide::dispatching::{Dispatcher, UpdateFilterExt};
        use teloxide::dptree;
        use teloxide::types::Update;

        let bot = self.bot.clone();
        let cancel = self.cancel_token.clone();
        let new_tx = event_tx.clone();
        let new_operator = self.operator.clone();
        let edit_tx = event_tx;
        let edit_operator = self.operator.clone();

        tokio::spawn(async move {
            let handler = dptree::entry()
                .branch(Update::filter_message().endpoint(move |msg: Message| {
                    let tx = new_tx.clone();
                    let operator = new_operator.clone();
                    async move {
                        if let Some(raw) = raw_message(&msg) {
                            let _ = tx.send(build_event(raw, false, &operator)).await;
                        }
                        HandlerResult::Ok(())
                    }
                }))
                .branch(Update::filter_edited_message().endpoint(move |msg: Message| {
                    let tx = edit_tx.clone();
                    let operator = edit_operator.clone();
                    async move {
                        if let Some(raw) = raw_message(&msg) {
                            let _ = tx.send(build_event(raw, true, &operator)).await;
                        }
                        HandlerResult::Ok(())
                    }
                }));

            let mut dispatcher = Dispatcher::builder(bot, handler)
                .default_handler(|_| async {})
                .build();

            // Get shutdown token for graceful termination
            let shutdown_token = dispatcher.shutdown_token();

            // Spawn a task that watches the CancellationToken and triggers shutdown
            let cancel_clone = cancel.clone();
            tokio::spawn(async move {
                cancel_clone.cancelled().await;
                let _ = shutdown_token.shutdown();
            });

            tracing::info!("[Telegram] Long polling started");
            dispatcher.dispatch().await;
            tracing::info!("[Telegram] Long polling stopped");
        });

        Ok(())
    }

    async fn stop(&self) -> AppResult<()> {
        self.cancel_token.cancel();
        Ok(())
    }

    async fn health_check(&self) -> AppResult<()> {
        self.bot
            .get_me()
            .await
            .map_err(|e| AppError::connection(format!("Bot health check failed: {}", e)))?;
        Ok(())
    }
}
