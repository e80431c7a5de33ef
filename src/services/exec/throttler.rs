//! Streaming Report Throttler
//!
//! Mirrors a growing execution report into one live chat message. Every
//! intermediate state is an edit of the same message; edits are issued one
//! at a time in output order. A failed edit stops streaming and leaves the
//! last delivered text visible.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chat_companion_core::{
    visible_len, ChatId, EditOutcome, MessageId, MessagingBackend, OutgoingFile, StreamBuffer,
};
use tokio::time::Instant;

use super::controller::{ExecutionReport, KillReason, ProcessSession, ReportSink, Termination};
use crate::services::remote::response_mapper::ResponseMapper;
use crate::utils::error::AppResult;

/// Text shown while the process is being launched.
pub const CONNECTING_TEXT: &str = "<code>Connecting..</code>";

/// File name used when the report is delivered as an attachment.
pub const OUTPUT_FILE_NAME: &str = "output.txt";

/// Room kept for the PID line and the kill notice.
const FOOTER_RESERVE: usize = 64;

/// Live-message reporter for one execution.
pub struct StreamingReporter {
    backend: Arc<dyn MessagingBackend>,
    chat_id: ChatId,
    message_id: MessageId,
    header: String,
    /// Text the live message is left showing after file delivery
    source_text: String,
    throttle: Duration,
    pid: Option<u32>,
    last_edit_at: Option<Instant>,
    last_text: Option<String>,
    stopped: bool,
}

impl StreamingReporter {
    /// Take over `trigger` as the live message and show the connecting state.
    ///
    /// When the trigger cannot be edited a reply is posted instead, and that
    /// reply becomes the live message.
    pub async fn open(
        backend: Arc<dyn MessagingBackend>,
        chat_id: ChatId,
        trigger: MessageId,
        header: String,
        source_text: String,
        throttle: Duration,
    ) -> AppResult<Self> {
        let message_id = backend
            .update_message(chat_id, trigger, CONNECTING_TEXT)
            .await?;
        Ok(Self {
            backend,
            chat_id,
            message_id,
            header,
            source_text,
            throttle,
            pid: None,
            last_edit_at: None,
            last_text: Some(CONNECTING_TEXT.to_string()),
            stopped: false,
        })
    }

    /// Identity of the live message.
    pub fn message_id(&self) -> MessageId {
        self.message_id
    }

    /// Characters of the size ceiling taken by text around the output.
    pub fn reserved_len(&self) -> usize {
        visible_len(&self.header) + FOOTER_RESERVE
    }

    /// Full message text for the given output.
    pub fn render(&self, content: &str) -> String {
        let mut text = self.header.clone();
        if let Some(pid) = self.pid {
            text.push_str(&format!("<b>PID:</b> <code>{}</code>\n", pid));
        }
        text.push_str("\n<b>Output:</b>\n");
        text.push_str(&ResponseMapper::pre(content));
        text
    }

    fn render_killed(&self, content: &str, reason: KillReason) -> String {
        format!(
            "{}\n<b>Process killed:</b> <code>{}</code>",
            self.render(content),
            reason
        )
    }

    /// Push `text` to the live message.
    ///
    /// Identical text is not re-sent. Any failure stops all later edits.
    pub async fn try_edit(&mut self, text: &str) -> EditOutcome {
        if self.stopped {
            return EditOutcome::Failed;
        }
        if self.last_text.as_deref() == Some(text) {
            return EditOutcome::Delivered;
        }
        match self
            .backend
            .edit_message(self.chat_id, self.message_id, text)
            .await
        {
            Ok(()) => {
                self.last_edit_at = Some(Instant::now());
                self.last_text = Some(text.to_string());
                EditOutcome::Delivered
            }
            Err(e) => {
                tracing::warn!(
                    "[Stream] Edit of message {} failed, streaming stopped: {}",
                    self.message_id,
                    e
                );
                self.stopped = true;
                EditOutcome::Failed
            }
        }
    }

    fn within_throttle_window(&self) -> bool {
        match self.last_edit_at {
            Some(at) => !self.throttle.is_zero() && at.elapsed() < self.throttle,
            None => false,
        }
    }

    /// Deliver the terminal state of `report`.
    ///
    /// Output that did not fit inline is sent as a file and the live message
    /// is left showing the source text.
    pub async fn finish(mut self, report: &ExecutionReport) -> AppResult<()> {
        match report.termination {
            Termination::Cancelled => Ok(()),
            Termination::SizeLimitKilled => {
                self.deliver_file(report, Some(KillReason::SizeLimit)).await
            }
            _ if report.is_truncated() => self.deliver_file(report, None).await,
            Termination::DeadlineKilled => {
                let text = self.render_killed(report.output.content(), KillReason::TimeLimit);
                self.final_edit(&text).await;
                Ok(())
            }
            Termination::Completed { .. } => {
                let text = self.render(report.output.content());
                self.final_edit(&text).await;
                Ok(())
            }
        }
    }

    async fn final_edit(&mut self, text: &str) {
        // The final state bypasses the coalescing window.
        self.last_edit_at = None;
        self.try_edit(text).await;
    }

    async fn deliver_file(
        &mut self,
        report: &ExecutionReport,
        reason: Option<KillReason>,
    ) -> AppResult<()> {
        if report.output.is_overflow_capped() {
            tracing::warn!(
                "[Stream] Output of session {} was cut at the capture limit",
                report.session.id
            );
        }
        let mut file = OutgoingFile::new(OUTPUT_FILE_NAME, report.output.full_output().into_bytes());
        if let Some(reason) = reason {
            file = file.with_caption(format!("Process killed: {}", reason));
        }
        self.backend
            .send_file(self.chat_id, file, Some(self.message_id))
            .await?;

        self.stopped = false;
        let pointer = ResponseMapper::code(&self.source_text);
        self.final_edit(&pointer).await;
        Ok(())
    }
}

#[async_trait]
impl ReportSink for StreamingReporter {
    async fn on_start(&mut self, session: &ProcessSession) {
        self.pid = session.pid;
    }

    async fn on_increment(&mut self, buffer: &StreamBuffer) -> EditOutcome {
        if self.stopped {
            return EditOutcome::Failed;
        }
        if self.within_throttle_window() {
            return EditOutcome::Coalesced;
        }
        let text = self.render(buffer.content());
        self.try_edit(&text).await
    }
}
