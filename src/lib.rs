//! Chat Companion - Rust Library
//!
//! A chat-driven remote-control agent. It includes:
//! - Command handlers invoked from operator messages
//! - The dispatch engine (router, registry, capture wrapper, gateway)
//! - The execution engine (process controller, streaming reporter, SSH backend)
//! - Configuration storage, data models and utilities

pub mod commands;
pub mod models;
pub mod services;
pub mod state;
pub mod storage;
pub mod utils;

pub use models::settings::{AppConfig, StreamingPolicy};
pub use state::AppState;
pub use utils::error::{AppError, AppResult};
