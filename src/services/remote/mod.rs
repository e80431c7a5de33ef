//! Remote Control
//!
//! Chat-driven command dispatch. Telegram is the primary adapter.
//!
//! ## Architecture
//!
//! ```text
//! Telegram → RemoteAdapter → mpsc → RemoteGateway
//!                                      ↓
//!                            CommandRouter.resolve()
//!                                      ↓
//!                    ExceptionCapture.run(handler(ctx, event))
//!                                      ↓
//!                     ResponseMapper → MessagingBackend edit/reply
//! ```

pub mod adapters;
pub mod capture;
pub mod command_router;
pub mod gateway;
pub mod registry;
pub mod response_mapper;
pub mod types;

pub use capture::ExceptionCapture;
pub use command_router::{CommandRouter, RouteMatch};
pub use gateway::RemoteGateway;
pub use registry::CommandRegistry;
pub use response_mapper::ResponseMapper;
pub use types::*;
