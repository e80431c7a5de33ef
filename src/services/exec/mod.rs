//! Execution Engine
//!
//! Process execution under a deadline and size ceiling, and the live-message
//! reporter that streams its output to the chat.

pub mod controller;
pub mod remote;
pub mod throttler;

pub use controller::{
    CommandLine, ExecMode, ExecutionReport, KillReason, NullSink, ProcessController,
    ProcessSession, ReportSink, Termination,
};
pub use remote::{shell_quote, OpenSshBackend, RemoteSessionBackend};
pub use throttler::{StreamingReporter, CONNECTING_TEXT, OUTPUT_FILE_NAME};
