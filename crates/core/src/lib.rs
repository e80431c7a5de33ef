//! Chat Companion Core
//!
//! Foundational traits, event types, and error types for the Chat Companion
//! workspace. This crate has zero dependencies on application-level code
//! (Telegram, subprocesses, configuration files, etc.).
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `event` - Read-only view of one received message (`InboundEvent`)
//! - `backend` - Messaging backend capability trait (`MessagingBackend`, `BackendError`)
//! - `streaming` - Live report buffer and edit outcomes (`StreamBuffer`, `EditOutcome`)
//!
//! ## Design Principles
//!
//! 1. **Zero external dependencies beyond serde/async-trait/thiserror** - keeps build times minimal
//! 2. **Trait-based abstractions** - handlers and tests only see the narrow backend surface
//! 3. **Unidirectional dependency** - this crate depends on nothing else in the workspace

pub mod backend;
pub mod error;
pub mod event;
pub mod streaming;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Events ─────────────────────────────────────────────────────────────
pub use event::{ChatId, InboundEvent, MessageId};

// ── Messaging Backend ──────────────────────────────────────────────────
pub use backend::{BackendError, MessagingBackend, OutgoingFile, UserQuery, UserRecord};

// ── Streaming Types ────────────────────────────────────────────────────
pub use streaming::{visible_len, EditOutcome, StreamBuffer, DEFAULT_SIZE_LIMIT};
