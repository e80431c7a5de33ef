//! Response Mapper
//!
//! Formats command results as HTML chat messages.

use chat_companion_core::UserRecord;

use crate::utils::error::AppError;

/// Units used by `convert_file_size`, one per power of 1024.
const SIZE_UNITS: [&str; 5] = ["bytes", "kilobytes", "megabytes", "gigabytes", "terabytes"];

/// Response formatter for chat display.
pub struct ResponseMapper;

impl ResponseMapper {
    /// Escape text for HTML parse mode.
    pub fn escape_html(text: &str) -> String {
        let mut escaped = String::with_capacity(text.len());
        for c in text.chars() {
            match c {
                '&' => escaped.push_str("&amp;"),
                '<' => escaped.push_str("&lt;"),
                '>' => escaped.push_str("&gt;"),
                '"' => escaped.push_str("&quot;"),
                _ => escaped.push(c),
            }
        }
        escaped
    }

    /// `<code>` span with escaped content.
    pub fn code(text: &str) -> String {
        format!("<code>{}</code>", Self::escape_html(text))
    }

    /// `<pre>` block with escaped content, or nothing for empty text.
    pub fn pre(text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }
        format!("<pre>{}</pre>", Self::escape_html(text))
    }

    /// Format an error for display.
    pub fn format_error(error: &AppError) -> String {
        format!(
            "<b>Error:</b> {}",
            Self::escape_html(&Self::truncate(&error.to_string(), 512))
        )
    }

    /// Header shown above live terminal output.
    pub fn terminal_header(command: &str, remote_endpoint: Option<&str>) -> String {
        let mut header = String::from("<b>Query:</b>\n");
        header.push_str(&Self::code(command));
        header.push('\n');
        if let Some(endpoint) = remote_endpoint {
            header.push_str(&format!("<b>Host:</b> {}\n", Self::code(endpoint)));
        }
        header
    }

    /// `.exec` result block.
    pub fn exec_result(code: &str, label: &str, body: &str) -> String {
        format!(
            "<b>Query:</b>\n{}\n\n<b>{}:</b>\n{}",
            Self::pre(code),
            label,
            Self::pre(body)
        )
    }

    pub fn format_version(bot_version: &str, library: &str, library_version: &str) -> String {
        format!(
            "<i>Bot Version</i> = {}\n\n<i>{} Version</i> = {}",
            Self::code(bot_version),
            Self::escape_html(library),
            Self::code(library_version)
        )
    }

    /// User record as shown by `.info`.
    pub fn format_user_info(user: &UserRecord) -> String {
        let mut reply = String::from("<b>User Info:</b>\n");
        reply.push_str(&format!(
            "\nFirst Name: {}",
            Self::escape_html(&user.first_name)
        ));
        if let Some(last_name) = &user.last_name {
            reply.push_str(&format!("\nLast Name: {}", Self::escape_html(last_name)));
        }
        if let Some(username) = &user.username {
            reply.push_str(&format!("\nUsername: @{}", Self::escape_html(username)));
        }
        reply.push_str(&format!(
            "\nPermanent user link: <a href=\"tg://user?id={}\">link</a>",
            user.id
        ));
        if let Some(bio) = user.bio.as_deref().filter(|b| !b.is_empty()) {
            reply.push_str(&format!(
                "\n\n<b>About User:</b>\n{}",
                Self::escape_html(bio)
            ));
        }
        if !user.is_self {
            if let Some(count) = user.common_chats_count {
                reply.push_str(&format!(
                    "\n\nYou have <code>{}</code> chats in common with this user",
                    count
                ));
            }
        }
        reply
    }

    /// Scale a byte count by powers of 1024, rounded to two decimals.
    pub fn convert_file_size(size: u64) -> (f64, &'static str) {
        let mut value = size as f64;
        let mut unit = 0;
        while value > 1024.0 && unit < SIZE_UNITS.len() - 1 {
            value /= 1024.0;
            unit += 1;
        }
        ((value * 100.0).round() / 100.0, SIZE_UNITS[unit])
    }

    /// Status shown while a file or folder is uploaded.
    pub fn uploading(kind: &str, name: &str, size: u64) -> String {
        let (value, unit) = Self::convert_file_size(size);
        format!(
            "<b>Uploading</b>:\n\n  <i>{} Name:</i> {}\n  <i>Size</i>: <code>{}</code> {}\n",
            kind,
            Self::code(name),
            value,
            unit
        )
    }

    /// Truncate to `max_len` characters, marking the cut with an ellipsis.
    pub fn truncate(text: &str, max_len: usize) -> String {
        if text.chars().count() <= max_len {
            return text.to_string();
        }
        if max_len <= 3 {
            return "...".to_string();
        }
        let kept: String = text.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}
