//! Presence State
//!
//! Operator away-from-keyboard status. Only the operator's own messages
//! change it: `.afk` sets it when unset, any other operator message clears it.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Current operator presence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Presence {
    #[default]
    Available,
    Away { reason: String },
}

/// Process-wide presence, shared by the gateway and the `afk` command.
#[derive(Debug, Default)]
pub struct PresenceState {
    inner: Mutex<Presence>,
}

impl PresenceState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Presence> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Mark the operator away. Returns `false` when already away; the
    /// existing reason is kept.
    pub fn set_away(&self, reason: impl Into<String>) -> bool {
        let mut presence = self.lock();
        if matches!(*presence, Presence::Away { .. }) {
            return false;
        }
        *presence = Presence::Away {
            reason: reason.into(),
        };
        true
    }

    /// Mark the operator available. Returns the reason when they were away.
    pub fn clear(&self) -> Option<String> {
        let mut presence = self.lock();
        match std::mem::take(&mut *presence) {
            Presence::Away { reason } => Some(reason),
            Presence::Available => None,
        }
    }

    pub fn current(&self) -> Presence {
        self.lock().clone()
    }

    pub fn is_away(&self) -> bool {
        matches!(*self.lock(), Presence::Away { .. })
    }

    /// Automatic reply for other users while away.
    pub fn auto_reply_text(&self) -> Option<String> {
        match &*self.lock() {
            Presence::Available => None,
            Presence::Away { reason } if reason.is_empty() => {
                Some("<b>I'm afk and I will be back soon</b>".to_string())
            }
            Presence::Away { reason } => Some(format!(
                "<b>I'm afk and I will be back soon</b>\n<i>Reason:</i> {}",
                crate::services::remote::response_mapper::ResponseMapper::escape_html(reason)
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_available() {
        let state = PresenceState::new();
        assert_eq!(state.current(), Presence::Available);
        assert!(!state.is_away());
        assert!(state.auto_reply_text().is_none());
    }

    #[test]
    fn test_set_away_only_when_unset() {
        let state = PresenceState::new();
        assert!(state.set_away("lunch"));
        assert!(!state.set_away("meeting"));
        assert_eq!(
            state.current(),
            Presence::Away {
                reason: "lunch".to_string()
            }
        );
    }

    #[test]
    fn test_clear_returns_reason_once() {
        let state = PresenceState::new();
        state.set_away("");
        assert_eq!(state.clear(), Some(String::new()));
        assert_eq!(state.clear(), None);
        assert!(!state.is_away());
    }

    #[test]
    fn test_auto_reply_text() {
        let state = PresenceState::new();
        state.set_away("");
        assert_eq!(
            state.auto_reply_text().as_deref(),
            Some("<b>I'm afk and I will be back soon</b>")
        );
        state.clear();
        state.set_away("at <work>");
        assert!(state.auto_reply_text().unwrap().ends_with("at &lt;work&gt;"));
    }
}
