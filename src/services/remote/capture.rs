//! Exception Capture
//!
//! Wraps a command handler so that backend rate limiting is swallowed after
//! a log note, and any other failure is optionally written to a capture log
//! before being propagated unchanged.

use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fs::OpenOptions;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chat_companion_core::InboundEvent;
use chrono::{DateTime, Local};

use crate::models::settings::AppConfig;
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::ensure_dir;

/// Human-readable wait, `H:MM:SS`.
pub fn format_wait(wait: Duration) -> String {
    let secs = wait.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Capture wrapper configuration.
#[derive(Debug, Clone)]
pub struct ExceptionCapture {
    debug: bool,
    logs_dir: PathBuf,
}

impl ExceptionCapture {
    pub fn new(debug: bool, logs_dir: impl Into<PathBuf>) -> Self {
        Self {
            debug,
            logs_dir: logs_dir.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.debug_mode, config.logs_dir.clone())
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    /// Run `handler_fut` for the command `handler`.
    ///
    /// Returns `Ok(Some(value))` on success and `Ok(None)` when the backend
    /// asked us to back off. Every other error is returned as-is, after being
    /// written to a capture log when debug mode is on.
    pub async fn run<T, F>(
        &self,
        handler: &str,
        event: &InboundEvent,
        handler_fut: F,
    ) -> AppResult<Option<T>>
    where
        F: Future<Output = AppResult<T>>,
    {
        let err = match handler_fut.await {
            Ok(value) => return Ok(Some(value)),
            Err(err) => err,
        };

        if let Some(wait) = err.rate_limit() {
            tracing::info!(
                "[Capture] We have reached a flood limitation. You won't be able to edit your messages for {}.",
                format_wait(wait)
            );
            return Ok(None);
        }

        if self.debug {
            match self.record(handler, event, &err) {
                Ok(path) => tracing::debug!("[Capture] Wrote {}", path.display()),
                Err(e) => tracing::warn!("[Capture] Could not write capture log: {}", e),
            }
        }
        Err(err)
    }

    /// Write one capture log for `err`. Returns the file written.
    pub fn record(&self, handler: &str, event: &InboundEvent, err: &AppError) -> AppResult<PathBuf> {
        ensure_dir(&self.logs_dir)?;
        let now = Local::now();
        let path = self
            .logs_dir
            .join(log_file_name(now, err.kind(), handler));
        let report = render_report(now, handler, event, err, &Backtrace::force_capture());

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(report.as_bytes())?;
        Ok(path)
    }
}

/// `<timestamp>_<kind>_<handler>.log`, safe on every filesystem.
pub fn log_file_name(time: DateTime<Local>, kind: &str, handler: &str) -> String {
    let handler: String = handler
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("{}_{}_{}.log", time.format("%m_%d_%H%M%S_%3f"), kind, handler)
}

fn render_report(
    time: DateTime<Local>,
    handler: &str,
    event: &InboundEvent,
    err: &AppError,
    backtrace: &Backtrace,
) -> String {
    let mut out = format!("Exception thrown, {}: {}\n", err.kind(), err);
    out.push_str(&format!("Handler: {}\nTime: {}\n\n", handler, time.to_rfc3339()));

    out.push_str("Caused by:\n");
    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    let mut depth = 0;
    while let Some(cause) = source {
        out.push_str(&format!("  {}: {}\n", depth, cause));
        source = cause.source();
        depth += 1;
    }

    out.push_str("\nEvent:\n");
    if let Ok(serde_json::Value::Object(fields)) = serde_json::to_value(event) {
        for (name, value) in fields {
            let value = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            out.push_str(&format!("    {} = {}\n", name, value.replace('\n', "\\n")));
        }
    }

    out.push_str("\nBacktrace:\n");
    out.push_str(&backtrace.to_string());
    out.push('\n');
    out
}
