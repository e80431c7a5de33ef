//! Live Report Buffers
//!
//! `StreamBuffer` accumulates process output destined for a single chat
//! message that is edited in place. The buffer enforces a fixed size ceiling:
//! once a chunk would push the visible length past the ceiling, the buffer is
//! marked truncated and every later chunk is kept aside for file delivery
//! instead of being inlined. The kept-aside text has its own byte cap.

use serde::{Deserialize, Serialize};

/// Maximum visible length of one chat message.
pub const DEFAULT_SIZE_LIMIT: usize = 4096;

/// Result of one attempt to push the live report to the chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditOutcome {
    /// The edit reached the backend.
    Delivered,
    /// Deferred by the coalescing window; a later edit will carry it.
    Coalesced,
    /// The edit failed; streaming should stop.
    Failed,
}

impl EditOutcome {
    /// Whether the producer should keep streaming.
    pub fn should_continue(self) -> bool {
        !matches!(self, EditOutcome::Failed)
    }
}

/// Accumulated text of one live report.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamBuffer {
    content: String,
    content_len: usize,
    size_limit: usize,
    reserved: usize,
    truncated: bool,
    overflow: String,
    overflow_limit: usize,
    overflow_capped: bool,
}

impl StreamBuffer {
    pub fn new(size_limit: usize) -> Self {
        Self {
            content: String::new(),
            content_len: 0,
            size_limit,
            reserved: 0,
            truncated: false,
            overflow: String::new(),
            overflow_limit: usize::MAX,
            overflow_capped: false,
        }
    }

    /// Keep at most `bytes` of text that did not fit inline.
    pub fn with_overflow_limit(mut self, bytes: usize) -> Self {
        self.overflow_limit = bytes;
        self
    }

    /// Reserve `chars` of the ceiling for text rendered around the content
    /// (headers, captions).
    pub fn with_reserved(mut self, chars: usize) -> Self {
        self.reserved = chars;
        self
    }

    /// Append a chunk. Returns `false` when the chunk does not fit; the
    /// buffer is then truncated and the chunk is kept in the overflow.
    pub fn push(&mut self, chunk: &str) -> bool {
        if self.truncated {
            self.keep_overflow(chunk);
            return false;
        }
        let chunk_len = chunk.chars().count();
        if chunk_len > self.remaining() {
            self.truncated = true;
            self.keep_overflow(chunk);
            return false;
        }
        self.content.push_str(chunk);
        self.content_len += chunk_len;
        true
    }

    fn keep_overflow(&mut self, chunk: &str) {
        let room = self.overflow_limit.saturating_sub(self.overflow.len());
        if chunk.len() <= room {
            self.overflow.push_str(chunk);
            return;
        }
        let mut end = room;
        while !chunk.is_char_boundary(end) {
            end -= 1;
        }
        self.overflow.push_str(&chunk[..end]);
        self.overflow_capped = true;
    }

    /// Characters that still fit inline.
    pub fn remaining(&self) -> usize {
        self.size_limit
            .saturating_sub(self.reserved)
            .saturating_sub(self.content_len)
    }

    /// Inline content, never longer than the ceiling minus the reservation.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Visible length of the inline content in characters.
    pub fn len(&self) -> usize {
        self.content_len
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.overflow.is_empty()
    }

    pub fn size_limit(&self) -> usize {
        self.size_limit
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Whether text was dropped because the overflow cap was reached.
    pub fn is_overflow_capped(&self) -> bool {
        self.overflow_capped
    }

    /// Inline content followed by everything that did not fit.
    pub fn full_output(&self) -> String {
        let mut full = String::with_capacity(self.content.len() + self.overflow.len());
        full.push_str(&self.content);
        full.push_str(&self.overflow);
        full
    }
}

/// Visible length of an HTML-formatted message: tags are not counted and
/// each character entity counts as one character.
pub fn visible_len(html: &str) -> usize {
    let mut count = 0;
    let mut in_tag = false;
    let mut in_entity = false;
    for c in html.chars() {
        match c {
            '<' if !in_tag => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if in_tag => {}
            '&' => {
                in_entity = true;
                count += 1;
            }
            ';' if in_entity => in_entity = false,
            _ if in_entity && (c.is_ascii_alphanumeric() || c == '#') => {}
            _ => {
                in_entity = false;
                count += 1;
            }
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_within_limit() {
        let mut buffer = StreamBuffer::new(10);
        assert!(buffer.push("hello"));
        assert!(buffer.push("world"));
        assert_eq!(buffer.content(), "helloworld");
        assert_eq!(buffer.len(), 10);
        assert!(!buffer.is_truncated());
    }

    #[test]
    fn test_push_over_limit_truncates() {
        let mut buffer = StreamBuffer::new(8);
        assert!(buffer.push("1234\n"));
        assert!(!buffer.push("5678\n"));
        assert!(buffer.is_truncated());
        assert_eq!(buffer.content(), "1234\n");
        assert_eq!(buffer.full_output(), "1234\n5678\n");

        // Later chunks never reach the inline content.
        assert!(!buffer.push("x"));
        assert_eq!(buffer.content(), "1234\n");
        assert_eq!(buffer.full_output(), "1234\n5678\nx");
    }

    #[test]
    fn test_reserved_space_counts_against_limit() {
        let mut buffer = StreamBuffer::new(10).with_reserved(6);
        assert!(buffer.push("abcd"));
        assert!(!buffer.push("e"));
    }

    #[test]
    fn test_overflow_is_capped() {
        let mut buffer = StreamBuffer::new(4).with_overflow_limit(6);
        assert!(buffer.push("abc"));
        assert!(!buffer.push("defgh"));
        assert!(!buffer.push("ijkl"));
        assert_eq!(buffer.full_output(), "abcdefghi");
        assert!(buffer.is_overflow_capped());

        assert!(!buffer.push("more"));
        assert_eq!(buffer.full_output(), "abcdefghi");
    }

    #[test]
    fn test_overflow_cap_respects_char_boundaries() {
        let mut buffer = StreamBuffer::new(1).with_overflow_limit(3);
        assert!(!buffer.push("éé"));
        assert_eq!(buffer.full_output(), "é");
    }

    #[test]
    fn test_remaining() {
        let mut buffer = StreamBuffer::new(10).with_reserved(3);
        assert_eq!(buffer.remaining(), 7);
        buffer.push("abcd");
        assert_eq!(buffer.remaining(), 3);
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let mut buffer = StreamBuffer::new(4);
        assert!(buffer.push("ééé"));
        assert_eq!(buffer.len(), 3);
        assert!(buffer.push("é"));
        assert!(!buffer.push("é"));
    }

    #[test]
    fn test_visible_len() {
        assert_eq!(visible_len("plain"), 5);
        assert_eq!(visible_len("<b>bold</b>"), 4);
        assert_eq!(visible_len("a &lt; b"), 5);
        assert_eq!(visible_len("<pre>x &amp;&amp; y</pre>"), 6);
    }

    #[test]
    fn test_edit_outcome_should_continue() {
        assert!(EditOutcome::Delivered.should_continue());
        assert!(EditOutcome::Coalesced.should_continue());
        assert!(!EditOutcome::Failed.should_continue());
    }
}
