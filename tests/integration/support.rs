//! Shared fixtures for integration tests.

use std::sync::Arc;

use chat_companion::services::remote::adapters::recording::RecordingBackend;
use chat_companion::services::remote::RemoteGateway;
use chat_companion::{AppConfig, AppState};
use chat_companion_core::InboundEvent;

pub const CHAT: i64 = 77;

/// Gateway over a fresh recording backend with all built-in commands.
pub fn gateway(config: AppConfig) -> (RemoteGateway, Arc<RecordingBackend>) {
    let backend = Arc::new(RecordingBackend::new());
    let state = AppState::new(config, backend.clone()).unwrap();
    let gateway = state.into_gateway(backend.clone()).unwrap();
    (gateway, backend)
}

/// Operator message in the test chat.
pub fn operator(message_id: i64, text: &str) -> InboundEvent {
    let mut event = InboundEvent::outgoing(CHAT, message_id, text);
    event.sender_id = 1;
    event
}

/// Message from someone else in the test chat.
pub fn stranger(message_id: i64, text: &str) -> InboundEvent {
    let mut event = InboundEvent::outgoing(CHAT, message_id, text);
    event.is_outgoing = false;
    event.sender_id = 2;
    event
}

/// Dispatch `event` and wait for its handler, if one ran.
pub async fn run(gateway: &RemoteGateway, event: InboundEvent) -> bool {
    match gateway.dispatch(event).await {
        Some(handle) => {
            handle.await.unwrap();
            true
        }
        None => false,
    }
}
