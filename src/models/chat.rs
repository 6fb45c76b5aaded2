//! Chat thread identity, messages, and typing state.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Canonical, order-independent key for a two-party conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThreadKey {
    lo: String,
    hi: String,
}

impl ThreadKey {
    /// Normalize the unordered actor pair so that `(a, b)` and `(b, a)` map to
    /// the same key.
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Self {
        let (a, b) = (a.into(), b.into());
        if a <= b {
            Self { lo: a, hi: b }
        } else {
            Self { lo: b, hi: a }
        }
    }

    /// Whether the given actor is one of the two parties.
    pub fn involves(&self, actor_id: &str) -> bool {
        self.lo == actor_id || self.hi == actor_id
    }
}

impl std::fmt::Display for ThreadKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.lo, self.hi)
    }
}

/// A chat message as delivered by REST history or the live `new_message` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read_flag: bool,
}

/// One row of the conversation list fetched per role.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub counterpart_id: String,
    pub display_name: String,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default)]
    pub unread_count: u32,
}

/// How long a peer's typing indicator stays lit after the last `user_typing`
/// event, absent an explicit stop signal.
pub const TYPING_EXPIRY_SECS: i64 = 3;

/// Peer typing indicator with self-healing expiry: lost "stop" signals are
/// tolerated because the state times itself out.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypingState {
    expires_at: Option<DateTime<Utc>>,
}

impl TypingState {
    /// Re-arm the indicator from a `user_typing` event observed at `now`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.expires_at = Some(now + Duration::seconds(TYPING_EXPIRY_SECS));
    }

    /// Whether the peer counts as typing at `now`.
    pub fn is_typing(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(t) if now < t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_key_is_order_independent() {
        assert_eq!(ThreadKey::new("a", "b"), ThreadKey::new("b", "a"));
        assert_ne!(ThreadKey::new("a", "b"), ThreadKey::new("a", "c"));
    }

    #[test]
    fn thread_key_involves_both_parties() {
        let key = ThreadKey::new("u1", "u2");
        assert!(key.involves("u1"));
        assert!(key.involves("u2"));
        assert!(!key.involves("u3"));
    }

    #[test]
    fn typing_state_expires_after_window() {
        let t0 = Utc::now();
        let mut state = TypingState::default();
        assert!(!state.is_typing(t0));

        state.touch(t0);
        assert!(state.is_typing(t0 + Duration::milliseconds(2900)));
        assert!(!state.is_typing(t0 + Duration::milliseconds(3100)));
    }

    #[test]
    fn typing_state_rearms_on_touch() {
        let t0 = Utc::now();
        let mut state = TypingState::default();
        state.touch(t0);
        state.touch(t0 + Duration::seconds(2));
        assert!(state.is_typing(t0 + Duration::seconds(4)));
        assert!(!state.is_typing(t0 + Duration::seconds(6)));
    }
}
