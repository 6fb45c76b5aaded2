//! Presence broadcasting: forward each local position to both sinks.
//!
//! Every position is pushed to the REST collaborator (persist) and emitted on
//! the live connection. The two sinks are independent best-effort paths, not
//! a transaction: a failed persist never blocks the live emit and vice-versa.
//! No debounce or throttle is applied; if positions outpace the network the
//! transport may drop emits, which is an accepted degradation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::connection::ConnectionHandle;
use crate::models::{OutboundEvent, Position, Session};
use crate::rest::RestClient;

/// Consumes a position feed and fans each reading out to REST + live. Does
/// not own the underlying geolocation watch; cancelling that stays the
/// caller's responsibility.
pub struct PresenceBroadcaster {
    task: JoinHandle<()>,
    stopped: Arc<AtomicBool>,
}

impl PresenceBroadcaster {
    /// Start forwarding. The feed is whatever the caller wires the tracker's
    /// watch callback into; the broadcaster stops when the feed closes or
    /// `stop` is called.
    pub fn start(
        session: &Session,
        mut positions: mpsc::UnboundedReceiver<Position>,
        rest: RestClient,
        handle: ConnectionHandle,
    ) -> Self {
        let actor_id = session.actor_id.clone();
        let stopped = Arc::new(AtomicBool::new(false));

        let task = tokio::spawn(async move {
            while let Some(position) = positions.recv().await {
                // Live emit first; it is cheap and latency-sensitive.
                if let Err(e) = handle.send(OutboundEvent::LocationUpdate {
                    user_id: actor_id.clone(),
                    latitude: position.latitude,
                    longitude: position.longitude,
                }) {
                    warn!(error = %e, "live location emit failed");
                }

                // Persist in the background so a slow backend never stalls
                // the feed.
                let rest = rest.clone();
                tokio::spawn(async move {
                    if let Err(e) = rest.update_location(&position).await {
                        warn!(error = %e, "location persist failed");
                    }
                });
            }
        });

        info!("presence broadcaster started");
        Self { task, stopped }
    }

    /// Unsubscribe from the feed. Idempotent; the tracker's own watch is not
    /// cancelled here.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.task.abort();
        info!("presence broadcaster stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}
