//! Services
//!
//! Business logic services for the application.
//! Services handle the core functionality and are called by commands.

pub mod exec;
pub mod presence;
pub mod remote;
pub mod upload;

pub use exec::{ProcessController, StreamingReporter};
pub use presence::{Presence, PresenceState};
pub use remote::{CommandRegistry, CommandRouter, ExceptionCapture, RemoteGateway};
