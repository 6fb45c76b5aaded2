//! Chat session store: one instance per open two-party thread.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, instrument};

use crate::connection::ConnectionHandle;
use crate::error::ClientResult;
use crate::models::{Message, OutboundEvent, ThreadKey, TypingState};
use crate::rest::RestClient;

/// Minimum spacing between outbound typing hints, regardless of how many
/// local keystrokes occur inside the window.
pub const TYPING_HINT_DEBOUNCE_SECS: i64 = 2;

/// Ordered message history plus typing state for one thread.
///
/// History fetched over REST and live-pushed messages merge into a single
/// sequence: non-decreasing by `created_at`, unique by `id`, with live
/// delivery winning on conflicting fields. Events for other threads are
/// filtered out; scoping is this store's responsibility because one instance
/// exists per open thread.
pub struct ChatSessionStore {
    local_actor_id: String,
    counterpart_id: String,
    key: ThreadKey,
    messages: Vec<Message>,
    typing: TypingState,
    last_typing_hint_at: Option<DateTime<Utc>>,
}

impl ChatSessionStore {
    pub fn new(local_actor_id: impl Into<String>, counterpart_id: impl Into<String>) -> Self {
        let local_actor_id = local_actor_id.into();
        let counterpart_id = counterpart_id.into();
        let key = ThreadKey::new(local_actor_id.clone(), counterpart_id.clone());
        Self {
            local_actor_id,
            counterpart_id,
            key,
            messages: Vec::new(),
            typing: TypingState::default(),
            last_typing_hint_at: None,
        }
    }

    pub fn thread_key(&self) -> &ThreadKey {
        &self.key
    }

    pub fn counterpart_id(&self) -> &str {
        &self.counterpart_id
    }

    /// Messages in thread order (ascending by `created_at`).
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// One-shot REST history fetch, merged into the thread. On failure the
    /// error propagates (`HistoryLoadFailed`) and previously loaded history
    /// stays untouched.
    #[instrument(skip(self, rest), fields(thread = %self.key))]
    pub async fn load_history(&mut self, rest: &RestClient) -> ClientResult<()> {
        let history = rest.chat_history(&self.counterpart_id).await?;
        self.apply_history(history);
        Ok(())
    }

    /// Merge fetched history. Ids already present (typically from live
    /// delivery racing the fetch) keep their live copy.
    pub fn apply_history(&mut self, history: Vec<Message>) {
        for message in history {
            if !self.messages.iter().any(|m| m.id == message.id) {
                self.messages.push(message);
            }
        }
        self.sort_messages();
        debug!(count = self.messages.len(), "history merged");
    }

    /// Merge a live-pushed message. Messages whose participant pair is not
    /// this thread's pair are filtered out and reported as not accepted. A
    /// duplicate `id` (e.g. a server echo racing history) replaces the
    /// existing entry rather than appending a second copy.
    pub fn on_live_message(&mut self, message: Message) -> bool {
        if ThreadKey::new(message.sender_id.clone(), message.receiver_id.clone()) != self.key {
            debug!(id = %message.id, "live message for another thread; filtered");
            return false;
        }
        match self.messages.iter_mut().find(|m| m.id == message.id) {
            Some(existing) => *existing = message,
            None => self.messages.push(message),
        }
        self.sort_messages();
        true
    }

    /// Emit the message over the live connection. No optimistic local insert:
    /// the authoritative copy arrives via the server's `new_message` echo.
    pub fn send_message(&self, handle: &ConnectionHandle, body: impl Into<String>) -> ClientResult<()> {
        handle.send(OutboundEvent::PrivateMessage {
            sender_id: self.local_actor_id.clone(),
            receiver_id: self.counterpart_id.clone(),
            message: body.into(),
        })
    }

    /// Record a `user_typing` event. Only the thread counterpart lights the
    /// indicator; it self-expires without a stop signal.
    pub fn on_typing(&mut self, actor_id: &str) {
        self.on_typing_at(actor_id, Utc::now());
    }

    pub fn on_typing_at(&mut self, actor_id: &str, now: DateTime<Utc>) {
        if actor_id == self.counterpart_id {
            self.typing.touch(now);
        }
    }

    pub fn is_counterpart_typing(&self) -> bool {
        self.is_counterpart_typing_at(Utc::now())
    }

    pub fn is_counterpart_typing_at(&self, now: DateTime<Utc>) -> bool {
        self.typing.is_typing(now)
    }

    /// Emit a typing hint, at most once per debounce window. Returns whether
    /// an event actually went out.
    pub fn send_typing_hint(&mut self, handle: &ConnectionHandle) -> ClientResult<bool> {
        self.send_typing_hint_at(handle, Utc::now())
    }

    pub fn send_typing_hint_at(
        &mut self,
        handle: &ConnectionHandle,
        now: DateTime<Utc>,
    ) -> ClientResult<bool> {
        if !self.typing_hint_due(now) {
            return Ok(false);
        }
        handle.send(OutboundEvent::Typing {
            sender_id: self.local_actor_id.clone(),
            receiver_id: self.counterpart_id.clone(),
        })?;
        self.last_typing_hint_at = Some(now);
        Ok(true)
    }

    fn typing_hint_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_typing_hint_at {
            Some(last) => now - last >= Duration::seconds(TYPING_HINT_DEBOUNCE_SECS),
            None => true,
        }
    }

    fn sort_messages(&mut self) {
        self.messages.sort_by_key(|m| m.created_at);
    }
}
