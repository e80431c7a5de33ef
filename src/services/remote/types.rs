//! Remote Command Types
//!
//! Core types for command dispatch: the registrable `CommandSpec`, the
//! handler signature, the `CommandContext` every handler receives and the
//! `LiveMessage` multi-step commands keep updating.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chat_companion_core::{ChatId, InboundEvent, MessageId, MessagingBackend, OutgoingFile};
use serde::{Deserialize, Serialize};

use crate::models::settings::AppConfig;
use crate::services::exec::ProcessController;
use crate::services::presence::PresenceState;
use crate::services::remote::registry::CommandRegistry;
use crate::utils::error::AppResult;

// ---------------------------------------------------------------------------
// Command Types
// ---------------------------------------------------------------------------

/// How a command is recognised in message text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchMode {
    /// One of the configured prefix symbols immediately followed by the
    /// command name; the rest of the message is captured.
    ExactPrefixedWord,
    /// A regular expression matched from the start of the message.
    FreeformPattern(String),
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchMode::ExactPrefixedWord => write!(f, "prefixed"),
            MatchMode::FreeformPattern(p) => write!(f, "pattern({})", p),
        }
    }
}

/// Future returned by a command handler.
pub type CommandFuture = Pin<Box<dyn Future<Output = AppResult<()>> + Send>>;

/// Type alias for the async handler function of a command.
///
/// The handler receives a clone of the shared `CommandContext` and the
/// event that resolved to it.
pub type CommandHandler = Arc<dyn Fn(CommandContext, InboundEvent) -> CommandFuture + Send + Sync>;

/// One registrable command.
#[derive(Clone)]
pub struct CommandSpec {
    pub name: String,
    pub match_mode: MatchMode,
    pub handler: CommandHandler,
    pub help_text: Option<String>,
    /// Editing a message re-invokes the handler
    pub react_to_edits: bool,
    /// Logical module owning this command (used by `.plugins` and help)
    pub module: String,
}

impl CommandSpec {
    /// Create a prefixed-word command from an async function.
    ///
    /// ```ignore
    /// let spec = CommandSpec::new("ping", |ctx, event| Box::pin(ping(ctx, event)))
    ///     .with_help("Measure round-trip time")
    ///     .in_module("misc");
    /// ```
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(CommandContext, InboundEvent) -> CommandFuture + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            match_mode: MatchMode::ExactPrefixedWord,
            handler: Arc::new(handler),
            help_text: None,
            react_to_edits: false,
            module: String::new(),
        }
    }

    /// Match with a regular expression instead of the prefixed name.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.match_mode = MatchMode::FreeformPattern(pattern.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help_text = Some(help.into());
        self
    }

    /// Re-run the command when the triggering message is edited.
    pub fn with_edits(mut self, react_to_edits: bool) -> Self {
        self.react_to_edits = react_to_edits;
        self
    }

    pub fn in_module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("name", &self.name)
            .field("match_mode", &self.match_mode)
            .field("help_text", &self.help_text)
            .field("react_to_edits", &self.react_to_edits)
            .field("module", &self.module)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Handler Context
// ---------------------------------------------------------------------------

/// Everything a command handler may touch.
///
/// Cheap to clone; every field is shared.
#[derive(Clone)]
pub struct CommandContext {
    pub backend: Arc<dyn MessagingBackend>,
    pub config: Arc<AppConfig>,
    pub presence: Arc<PresenceState>,
    pub controller: Arc<ProcessController>,
    pub registry: Arc<CommandRegistry>,
    pub http: reqwest::Client,
}

impl CommandContext {
    /// Show `text` on the triggering message (edit, or reply when the
    /// edit is refused). Returns the message now showing it.
    pub async fn edit(&self, event: &InboundEvent, text: &str) -> AppResult<MessageId> {
        Ok(self
            .backend
            .update_message(event.origin_channel_id, event.message_id, text)
            .await?)
    }

    /// Reply to the triggering message.
    pub async fn reply(&self, event: &InboundEvent, text: &str) -> AppResult<MessageId> {
        Ok(self
            .backend
            .send_message(event.origin_channel_id, text, Some(event.message_id))
            .await?)
    }

    /// Send a message to the event's chat.
    pub async fn send(&self, event: &InboundEvent, text: &str) -> AppResult<MessageId> {
        Ok(self
            .backend
            .send_message(event.origin_channel_id, text, None)
            .await?)
    }

    /// Upload a file to the event's chat.
    pub async fn send_file(
        &self,
        event: &InboundEvent,
        file: OutgoingFile,
        reply_to: Option<MessageId>,
    ) -> AppResult<MessageId> {
        Ok(self
            .backend
            .send_file(event.origin_channel_id, file, reply_to)
            .await?)
    }

}

/// Status message of a command that reports in several steps.
///
/// Starts out as the trigger. When an edit of the trigger is refused the
/// reply that took its place is edited from then on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveMessage {
    pub chat_id: ChatId,
    pub trigger_id: MessageId,
    pub message_id: MessageId,
}

impl LiveMessage {
    pub fn of(event: &InboundEvent) -> Self {
        Self {
            chat_id: event.origin_channel_id,
            trigger_id: event.message_id,
            message_id: event.message_id,
        }
    }

    pub async fn show(&mut self, ctx: &CommandContext, text: &str) -> AppResult<()> {
        self.message_id = ctx
            .backend
            .update_message(self.chat_id, self.message_id, text)
            .await?;
        Ok(())
    }

    /// Upload a file to the chat.
    pub async fn send_file(&self, ctx: &CommandContext, file: OutgoingFile) -> AppResult<MessageId> {
        Ok(ctx.backend.send_file(self.chat_id, file, None).await?)
    }

    /// Delete the status message and, when it is a separate reply, the
    /// trigger as well.
    pub async fn clear(&self, ctx: &CommandContext) -> AppResult<()> {
        ctx.backend
            .delete_message(self.chat_id, self.message_id)
            .await?;
        if self.message_id != self.trigger_id {
            if let Err(e) = ctx
                .backend
                .delete_message(self.chat_id, self.trigger_id)
                .await
            {
                tracing::debug!("[Upload] Trigger {} kept: {}", self.trigger_id, e);
            }
        }
        Ok(())
    }
}
