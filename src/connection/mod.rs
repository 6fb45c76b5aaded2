//! Live connection: one duplex event stream per session.
//!
//! The manager owns the connect/close lifecycle and enforces the
//! one-connection-per-session invariant. The handle exposes named event
//! channels (`message`, `typing`, `location_update`, `new_emergency_request`)
//! for inbound push and typed sends for outbound events. Reconnection is left
//! to the transport: the handle only surfaces connected/disconnected state and
//! fails outbound sends fast while disconnected.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ClientError, ClientResult};
use crate::models::{EventChannel, LiveEvent, OutboundEvent, Session, WireFrame};

const CHANNEL_CAPACITY: usize = 64;

/// Unique id for one live connection, used to correlate log lines.
fn generate_connection_id() -> String {
    Uuid::new_v4().as_simple().to_string()
}

/// One broadcast sender per named channel; inbound frames fan out to whichever
/// consumers subscribed to that channel.
#[derive(Clone)]
struct ChannelSenders {
    message: broadcast::Sender<LiveEvent>,
    typing: broadcast::Sender<LiveEvent>,
    location_update: broadcast::Sender<LiveEvent>,
    new_emergency_request: broadcast::Sender<LiveEvent>,
}

impl ChannelSenders {
    fn new() -> Self {
        let (message, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (typing, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (location_update, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (new_emergency_request, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            message,
            typing,
            location_update,
            new_emergency_request,
        }
    }

    fn sender(&self, channel: EventChannel) -> &broadcast::Sender<LiveEvent> {
        match channel {
            EventChannel::Message => &self.message,
            EventChannel::Typing => &self.typing,
            EventChannel::LocationUpdate => &self.location_update,
            EventChannel::NewEmergencyRequest => &self.new_emergency_request,
        }
    }

    /// Parse one inbound frame and fan it out. Unknown events are skipped,
    /// malformed payloads logged; neither tears the connection down.
    fn dispatch(&self, text: &str) {
        match serde_json::from_str::<WireFrame>(text) {
            Ok(frame) => match LiveEvent::from_frame(&frame) {
                Ok(Some(event)) => {
                    let _ = self.sender(event.channel()).send(event);
                }
                Ok(None) => debug!(event = %frame.event, "skipping unknown live event"),
                Err(e) => warn!(event = %frame.event, error = %e, "malformed live payload"),
            },
            Err(e) => warn!(error = %e, "unparseable live frame"),
        }
    }
}

struct HandleInner {
    connection_id: String,
    out_tx: mpsc::UnboundedSender<String>,
    connected: Arc<watch::Sender<bool>>,
    closed: AtomicBool,
    /// Dropped on close so broadcast receivers observe channel closure. The
    /// reader task holds the other clone and is aborted at the same time.
    channels: std::sync::Mutex<Option<ChannelSenders>>,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

/// Handle to one live connection. Cloneable; all clones share the underlying
/// connection and the close state.
#[derive(Clone)]
pub struct ConnectionHandle {
    inner: Arc<HandleInner>,
}

impl ConnectionHandle {
    fn from_parts(
        out_tx: mpsc::UnboundedSender<String>,
        connected: Arc<watch::Sender<bool>>,
        channels: ChannelSenders,
        tasks: Vec<JoinHandle<()>>,
    ) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                connection_id: generate_connection_id(),
                out_tx,
                connected,
                closed: AtomicBool::new(false),
                channels: std::sync::Mutex::new(Some(channels)),
                tasks: std::sync::Mutex::new(tasks),
            }),
        }
    }

    /// In-memory handle with no transport behind it: outbound frames land on
    /// the returned receiver as serialized text, and inbound frames are
    /// injected through the [`LoopbackFeed`]. Used by tests and offline demos.
    pub fn loopback() -> (Self, mpsc::UnboundedReceiver<String>, LoopbackFeed) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (connected_tx, _) = watch::channel(true);
        let connected = Arc::new(connected_tx);
        let channels = ChannelSenders::new();
        let feed = LoopbackFeed {
            channels: channels.clone(),
            connected: connected.clone(),
        };
        let handle = Self::from_parts(out_tx, connected, channels, Vec::new());
        (handle, out_rx, feed)
    }

    /// Subscribe to a named event channel. Each call yields an independent
    /// [`Subscription`] whose `cancel` must be invoked (or the subscription
    /// dropped) on the owning view's teardown path.
    pub fn subscribe(&self, channel: EventChannel) -> ClientResult<Subscription> {
        let guard = self
            .inner
            .channels
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let senders = guard.as_ref().ok_or(ClientError::ConnectionClosed)?;
        Ok(Subscription {
            rx: senders.sender(channel).subscribe(),
            cancelled: false,
        })
    }

    /// Emit an outbound event. Fails with `ConnectionClosed` after `close`,
    /// and with `NotConnected` while the transport is down; outbound events
    /// are never buffered across a disconnect.
    pub fn send(&self, event: OutboundEvent) -> ClientResult<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(ClientError::ConnectionClosed);
        }
        if !*self.inner.connected.borrow() {
            return Err(ClientError::NotConnected);
        }
        let text = serde_json::to_string(&event.to_frame())?;
        self.inner
            .out_tx
            .send(text)
            .map_err(|_| ClientError::NotConnected)
    }

    /// Observable connected/disconnected state of the underlying transport.
    pub fn connected(&self) -> watch::Receiver<bool> {
        self.inner.connected.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        !self.inner.closed.load(Ordering::SeqCst) && *self.inner.connected.borrow()
    }

    /// Release the connection and unsubscribe every listener registered
    /// through this handle. Idempotent: the second and later calls are no-ops.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.connected.send_replace(false);
        self.inner
            .channels
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let tasks = std::mem::take(
            &mut *self.inner.tasks.lock().unwrap_or_else(|e| e.into_inner()),
        );
        for task in tasks {
            task.abort();
        }
        info!(connection_id = %self.inner.connection_id, "live connection closed");
    }

    /// Log-correlation id for this connection.
    pub fn connection_id(&self) -> &str {
        &self.inner.connection_id
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

/// Injects inbound frames into a loopback handle, standing in for the server
/// side of the stream.
pub struct LoopbackFeed {
    channels: ChannelSenders,
    connected: Arc<watch::Sender<bool>>,
}

impl LoopbackFeed {
    pub fn push(&self, frame: &WireFrame) {
        if let Ok(text) = serde_json::to_string(frame) {
            self.channels.dispatch(&text);
        }
    }

    /// Flip the simulated transport state, as a real stream drop or
    /// re-establishment would.
    pub fn set_connected(&self, up: bool) {
        self.connected.send_replace(up);
    }
}

/// One subscription to one named channel. Cancel is idempotent; after
/// cancellation `recv` yields `None` forever.
pub struct Subscription {
    rx: broadcast::Receiver<LiveEvent>,
    cancelled: bool,
}

impl Subscription {
    /// Next event on this channel, or `None` once the subscription is
    /// cancelled or the connection closed. Lagged consumers skip missed
    /// events rather than erroring.
    pub async fn recv(&mut self) -> Option<LiveEvent> {
        loop {
            if self.cancelled {
                return None;
            }
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "live subscription lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }
}

/// Owns the connect/close lifecycle; at most one open connection per session.
pub struct ConnectionManager {
    live_url: String,
    active: Mutex<Option<ConnectionHandle>>,
}

impl ConnectionManager {
    pub fn new(live_url: impl Into<String>) -> Self {
        Self {
            live_url: live_url.into(),
            active: Mutex::new(None),
        }
    }

    /// Establish the live connection for a session and run the identify
    /// handshake (`authenticate` with the actor id). Any previously open
    /// connection is closed first.
    pub async fn open(&self, session: &Session) -> ClientResult<ConnectionHandle> {
        if !session.is_authenticated() {
            return Err(ClientError::AuthRequired);
        }

        let mut active = self.active.lock().await;
        if let Some(prev) = active.take() {
            debug!("closing prior connection before reopening");
            prev.close();
        }

        let (ws, _) = connect_async(self.live_url.as_str()).await?;
        let (mut sink, mut stream) = ws.split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        let (connected_tx, _) = watch::channel(true);
        let connected = Arc::new(connected_tx);

        let writer = tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                if sink.send(WsMessage::Text(text)).await.is_err() {
                    break;
                }
            }
        });

        let channels = ChannelSenders::new();
        let dispatch = channels.clone();
        let reader_connected = connected.clone();
        let reader = tokio::spawn(async move {
            while let Some(Ok(msg)) = stream.next().await {
                match msg {
                    WsMessage::Text(text) => dispatch.dispatch(&text),
                    WsMessage::Close(_) => break,
                    _ => {}
                }
            }
            reader_connected.send_replace(false);
            info!("live transport disconnected");
        });

        let handle = ConnectionHandle::from_parts(out_tx, connected, channels, vec![writer, reader]);

        handle.send(OutboundEvent::Authenticate {
            actor_id: session.actor_id.clone(),
        })?;
        info!(
            connection_id = %handle.connection_id(),
            actor_id = %session.actor_id,
            "live connection opened"
        );

        *active = Some(handle.clone());
        Ok(handle)
    }

    /// Close a handle and release the manager's active slot. Idempotent.
    pub async fn close(&self, handle: &ConnectionHandle) {
        handle.close();
        let mut active = self.active.lock().await;
        if let Some(current) = active.as_ref() {
            if Arc::ptr_eq(&current.inner, &handle.inner) {
                *active = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn send_after_close_fails_with_connection_closed() {
        let (handle, _out_rx, _feed) = ConnectionHandle::loopback();
        handle.close();
        let err = handle
            .send(OutboundEvent::Typing {
                sender_id: "a".to_string(),
                receiver_id: "b".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, ClientError::ConnectionClosed));
    }

    #[tokio::test]
    async fn send_while_disconnected_fails_with_not_connected() {
        let (handle, mut out_rx, feed) = ConnectionHandle::loopback();
        feed.set_connected(false);

        let err = handle
            .send(OutboundEvent::Typing {
                sender_id: "a".to_string(),
                receiver_id: "b".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, ClientError::NotConnected));
        // Disconnected is not closed: the handle stays usable.
        assert!(!handle.is_closed());
        assert!(out_rx.try_recv().is_err());

        // Once the transport is back, sends go through again.
        feed.set_connected(true);
        handle
            .send(OutboundEvent::Typing {
                sender_id: "a".to_string(),
                receiver_id: "b".to_string(),
            })
            .unwrap();
        assert!(out_rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn open_without_valid_session_fails_with_auth_required() {
        let manager = ConnectionManager::new("ws://localhost:0");
        let session = Session::new("u1", "", crate::models::Role::Customer);
        // The guard fires before any connect attempt.
        assert!(matches!(
            manager.open(&session).await,
            Err(ClientError::AuthRequired)
        ));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (handle, _out_rx, _feed) = ConnectionHandle::loopback();
        handle.close();
        handle.close();
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn subscribe_after_close_fails() {
        let (handle, _out_rx, _feed) = ConnectionHandle::loopback();
        handle.close();
        assert!(matches!(
            handle.subscribe(EventChannel::Message),
            Err(ClientError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn inbound_frames_reach_the_matching_channel() {
        let (handle, _out_rx, feed) = ConnectionHandle::loopback();
        let mut sub = handle.subscribe(EventChannel::Typing).unwrap();

        feed.push(&WireFrame {
            event: "user_typing".to_string(),
            data: json!({ "userId": "u7" }),
        });

        match sub.recv().await {
            Some(LiveEvent::UserTyping { user_id }) => assert_eq!(user_id, "u7"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn cancelled_subscription_yields_none() {
        let (handle, _out_rx, feed) = ConnectionHandle::loopback();
        let mut sub = handle.subscribe(EventChannel::Typing).unwrap();
        sub.cancel();
        sub.cancel();

        feed.push(&WireFrame {
            event: "user_typing".to_string(),
            data: json!({ "userId": "u7" }),
        });
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn outbound_send_serializes_exact_frame() {
        let (handle, mut out_rx, _feed) = ConnectionHandle::loopback();
        handle
            .send(OutboundEvent::LocationUpdate {
                user_id: "u1".to_string(),
                latitude: 1.5,
                longitude: 2.5,
            })
            .unwrap();

        let text = out_rx.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["event"], "location_update");
        assert_eq!(value["data"]["userId"], "u1");
        assert_eq!(value["data"]["latitude"], 1.5);
    }
}
