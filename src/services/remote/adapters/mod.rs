//! Remote Adapters
//!
//! Platform adapters: a `MessagingBackend` plus the lifecycle needed to feed
//! inbound events to the gateway.

pub mod recording;
pub mod telegram;

use async_trait::async_trait;
use chat_companion_core::{InboundEvent, MessagingBackend};
use tokio::sync::mpsc;

use crate::utils::error::AppResult;

/// Remote adapter trait for platform-specific message handling.
///
/// Adapters are responsible for:
/// - Receiving messages from the platform (long-polling or webhook) and
///   converting them to `InboundEvent`s
/// - Sending, editing and deleting messages, and uploading files
/// - Health checking connectivity
#[async_trait]
pub trait RemoteAdapter: MessagingBackend {
    /// Adapter identifier for logs
    fn name(&self) -> &'static str;

    /// Start the adapter (begin receiving messages).
    ///
    /// Events are forwarded through the provided mpsc sender channel.
    /// The adapter should spawn its own task for the receive loop.
    async fn start(&self, event_tx: mpsc::Sender<InboundEvent>) -> AppResult<()>;

    /// Stop the adapter gracefully.
    async fn stop(&self) -> AppResult<()>;

    /// Check adapter health/connectivity.
    async fn health_check(&self) -> AppResult<()>;
}
