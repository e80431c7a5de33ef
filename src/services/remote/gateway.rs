//! Remote Gateway
//!
//! Owns the adapter lifecycle and the dispatch loop: every inbound event is
//! checked against presence, resolved by the `CommandRouter`, and handed to
//! its handler inside the exception capture wrapper.

use std::sync::Arc;

use chat_companion_core::InboundEvent;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::adapters::RemoteAdapter;
use super::capture::ExceptionCapture;
use super::command_router::CommandRouter;
use super::response_mapper::ResponseMapper;
use super::types::CommandContext;
use crate::utils::error::AppResult;

/// Name of the command that sets presence; it never clears it.
pub const AFK_COMMAND: &str = "afk";

/// Posted when an operator message ends an away period.
pub const NO_LONGER_AFK: &str = "<code>I'm no longer afk</code>";

const EVENT_CHANNEL_SIZE: usize = 100;

/// Dispatches inbound events to registered commands.
pub struct RemoteGateway {
    router: CommandRouter,
    capture: ExceptionCapture,
    ctx: CommandContext,
    adapter: Arc<dyn RemoteAdapter>,
    afk_auto_reply: bool,
    cancel_token: CancellationToken,
}

impl RemoteGateway {
    /// Compile the context's registry into a router and bind the adapter.
    pub fn new(ctx: CommandContext, adapter: Arc<dyn RemoteAdapter>) -> AppResult<Self> {
        let router = ctx.registry.build_router(&ctx.config.command_prefixes)?;
        let capture = ExceptionCapture::from_config(&ctx.config);
        let afk_auto_reply = ctx.config.telegram.afk_auto_reply;
        Ok(Self {
            router,
            capture,
            ctx,
            adapter,
            afk_auto_reply,
            cancel_token: CancellationToken::new(),
        })
    }

    pub fn context(&self) -> &CommandContext {
        &self.ctx
    }

    pub fn router(&self) -> &CommandRouter {
        &self.router
    }

    /// Start the adapter and spawn the dispatch loop.
    pub async fn start(self: Arc<Self>) -> AppResult<JoinHandle<()>> {
        let (tx, rx) = mpsc::channel::<InboundEvent>(EVENT_CHANNEL_SIZE);
        self.adapter.start(tx).await?;
        tracing::info!(
            "[Gateway] {} adapter started with {} commands",
            self.adapter.name(),
            self.router.len()
        );

        let gateway = self.clone();
        Ok(tokio::spawn(async move { gateway.run(rx).await }))
    }

    /// Dispatch events until the channel closes or `stop` is called.
    pub async fn run(&self, mut rx: mpsc::Receiver<InboundEvent>) {
        loop {
            tokio::select! {
                maybe_event = rx.recv() => {
                    match maybe_event {
                        Some(event) => {
                            self.dispatch(event).await;
                        }
                        None => break,
                    }
                }
                _ = self.cancel_token.cancelled() => {
                    break;
                }
            }
        }
        tracing::debug!("[Gateway] Dispatch loop exited");
    }

    /// Stop the dispatch loop and the adapter.
    pub async fn stop(&self) -> AppResult<()> {
        self.cancel_token.cancel();
        self.adapter.stop().await?;
        tracing::info!("[Gateway] Stopped");
        Ok(())
    }

    /// Handle one event. Returns the spawned handler task when the event
    /// resolved to a command.
    pub async fn dispatch(&self, event: InboundEvent) -> Option<JoinHandle<()>> {
        if !event.is_outgoing {
            self.auto_reply(&event).await;
            return None;
        }

        let found = self.router.resolve(&event);

        if !event.is_edit && found.as_ref().map(|m| m.spec.name.as_str()) != Some(AFK_COMMAND) {
            if let Some(reason) = self.ctx.presence.clear() {
                tracing::info!("[Presence] Back from afk (reason: {:?})", reason);
                if let Err(e) = self.ctx.send(&event, NO_LONGER_AFK).await {
                    tracing::warn!("[Gateway] Failed to announce return: {}", e);
                }
            }
        }

        let found = found?;
        let spec = found.spec;
        let event = event.with_groups(found.groups);
        let ctx = self.ctx.clone();
        let capture = self.capture.clone();
        tracing::debug!(
            "[Gateway] Dispatching '{}' for message {}",
            spec.name,
            event.message_id
        );

        Some(tokio::spawn(async move {
            let handler_fut = (spec.handler)(ctx.clone(), event.clone());
            if let Err(e) = capture.run(&spec.name, &event, handler_fut).await {
                tracing::error!("[Gateway] Command '{}' failed: {}", spec.name, e);
                if let Err(send_err) = ctx.reply(&event, &ResponseMapper::format_error(&e)).await {
                    tracing::warn!("[Gateway] Failed to report error: {}", send_err);
                }
            }
        }))
    }

    /// Away auto-reply for private messages and mentions from others.
    async fn auto_reply(&self, event: &InboundEvent) {
        if !self.afk_auto_reply || event.is_edit {
            return;
        }
        if !(event.is_private || event.mentions_operator) {
            return;
        }
        let Some(text) = self.ctx.presence.auto_reply_text() else {
            return;
        };
        if let Err(e) = self.ctx.reply(event, &text).await {
            tracing::warn!("[Gateway] Auto-reply failed: {}", e);
        }
    }
}
