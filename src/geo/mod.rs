//! Geolocation: cancellable, observable position feed over a device source.
//!
//! The device (or platform positioning API) sits behind [`PositionSource`];
//! the tracker turns it into a bounded single read and a continuous watch
//! whose cancel handle is a first-class, required part of every exit path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{ClientError, ClientResult};
use crate::models::Position;

/// A device-level position provider. Readings are delivered in acquisition
/// order; an error terminates the feed until a new watch is initiated.
#[async_trait]
pub trait PositionSource: Send + 'static {
    /// Block until the next reading is available.
    async fn next_reading(&mut self) -> ClientResult<Position>;
}

/// Cancel handle for a continuous watch. `cancel` is idempotent; after it
/// returns, neither the update nor the error callback fires again even if the
/// device keeps producing readings.
pub struct WatchToken {
    cancelled: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl WatchToken {
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        self.task.abort();
        debug!("geolocation watch cancelled");
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Wraps a position source into one-shot reads and cancellable watches.
pub struct GeoTracker<S: PositionSource> {
    source: Arc<Mutex<S>>,
    read_timeout: Duration,
}

impl<S: PositionSource> GeoTracker<S> {
    pub fn new(source: S, read_timeout: Duration) -> Self {
        Self {
            source: Arc::new(Mutex::new(source)),
            read_timeout,
        }
    }

    /// Single position read with a bounded timeout. A slow or absent provider
    /// surfaces `LocationUnavailable` rather than hanging the caller. The
    /// source lock is acquired inside the timed future: a watch parked in
    /// `next_reading` holds the lock, and the timeout must cover that wait
    /// too.
    pub async fn get_once(&self) -> ClientResult<Position> {
        let read = async {
            let mut source = self.source.lock().await;
            source.next_reading().await
        };
        match tokio::time::timeout(self.read_timeout, read).await {
            Ok(Ok(position)) => Ok(position),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ClientError::LocationUnavailable(format!(
                "no reading within {:?}",
                self.read_timeout
            ))),
        }
    }

    /// Begin continuous tracking. Each reading invokes `on_update` in
    /// acquisition order; a source error invokes `on_error` once and
    /// terminates the watch, which must then be re-initiated by the caller.
    ///
    /// The returned token MUST be cancelled on every exit path of the owning
    /// view; a leaked watch keeps firing into torn-down state.
    pub fn watch<U, E>(&self, on_update: U, on_error: E) -> WatchToken
    where
        U: Fn(Position) + Send + 'static,
        E: FnOnce(ClientError) + Send + 'static,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let source = self.source.clone();

        let task = tokio::spawn(async move {
            let mut on_error = Some(on_error);
            loop {
                let reading = {
                    let mut source = source.lock().await;
                    source.next_reading().await
                };
                if flag.load(Ordering::SeqCst) {
                    return;
                }
                match reading {
                    Ok(position) => on_update(position),
                    Err(e) => {
                        warn!(error = %e, "position source failed; watch terminated");
                        if let Some(on_error) = on_error.take() {
                            on_error(e);
                        }
                        return;
                    }
                }
            }
        });

        info!("geolocation watch started");
        WatchToken { cancelled, task }
    }
}

/// Deterministic source for demos and tests: emits readings around a fixed
/// origin at a fixed interval, drifting slightly each tick.
pub struct SimulatedPositionSource {
    latitude: f64,
    longitude: f64,
    interval: Duration,
    tick: u64,
}

impl SimulatedPositionSource {
    pub fn new(latitude: f64, longitude: f64, interval: Duration) -> Self {
        Self {
            latitude,
            longitude,
            interval,
            tick: 0,
        }
    }
}

#[async_trait]
impl PositionSource for SimulatedPositionSource {
    async fn next_reading(&mut self) -> ClientResult<Position> {
        if self.tick > 0 {
            tokio::time::sleep(self.interval).await;
        }
        self.tick += 1;
        // ~11m of drift per tick, wandering back and forth.
        let wobble = ((self.tick % 20) as f64 - 10.0) * 0.0001;
        Ok(Position::at(
            self.latitude + wobble,
            self.longitude + wobble / 2.0,
            Utc::now(),
        ))
    }
}

/// Source backed by an in-memory channel; the test (or a platform bridge)
/// pushes readings in.
pub struct ChannelPositionSource {
    rx: tokio::sync::mpsc::UnboundedReceiver<ClientResult<Position>>,
}

impl ChannelPositionSource {
    pub fn new() -> (
        tokio::sync::mpsc::UnboundedSender<ClientResult<Position>>,
        Self,
    ) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (tx, Self { rx })
    }
}

#[async_trait]
impl PositionSource for ChannelPositionSource {
    async fn next_reading(&mut self) -> ClientResult<Position> {
        match self.rx.recv().await {
            Some(reading) => reading,
            None => Err(ClientError::LocationUnavailable(
                "position provider gone".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn get_once_times_out_as_location_unavailable() {
        let (_tx, source) = ChannelPositionSource::new();
        let tracker = GeoTracker::new(source, Duration::from_millis(20));
        let err = tracker.get_once().await.unwrap_err();
        assert!(matches!(err, ClientError::LocationUnavailable(_)));
    }

    #[tokio::test]
    async fn get_once_times_out_while_a_starved_watch_holds_the_source() {
        let (_tx, source) = ChannelPositionSource::new();
        let tracker = GeoTracker::new(source, Duration::from_millis(50));

        // The watch loop parks in next_reading with the source locked.
        let token = tracker.watch(|_| {}, |_| {});
        tokio::time::sleep(Duration::from_millis(10)).await;

        let bounded = tokio::time::timeout(Duration::from_millis(500), tracker.get_once()).await;
        match bounded {
            Ok(Err(ClientError::LocationUnavailable(_))) => {}
            Ok(other) => panic!("expected LocationUnavailable, got {:?}", other),
            Err(_) => panic!("get_once exceeded its read timeout while a watch was active"),
        }
        token.cancel();
    }

    #[tokio::test]
    async fn get_once_returns_pushed_reading() {
        let (tx, source) = ChannelPositionSource::new();
        tx.send(Ok(Position::new(10.0, 20.0))).unwrap();
        let tracker = GeoTracker::new(source, Duration::from_millis(200));
        let position = tracker.get_once().await.unwrap();
        assert_eq!(position.latitude, 10.0);
    }

    #[tokio::test]
    async fn watch_delivers_readings_in_order() {
        let (tx, source) = ChannelPositionSource::new();
        let tracker = GeoTracker::new(source, Duration::from_secs(1));
        let (seen_tx, mut seen_rx) = tokio::sync::mpsc::unbounded_channel();

        let token = tracker.watch(
            move |p: Position| {
                let _ = seen_tx.send(p.latitude);
            },
            |_| {},
        );

        tx.send(Ok(Position::new(1.0, 0.0))).unwrap();
        tx.send(Ok(Position::new(2.0, 0.0))).unwrap();
        assert_eq!(seen_rx.recv().await, Some(1.0));
        assert_eq!(seen_rx.recv().await, Some(2.0));
        token.cancel();
    }

    #[tokio::test]
    async fn no_callback_after_cancel() {
        let (tx, source) = ChannelPositionSource::new();
        let tracker = GeoTracker::new(source, Duration::from_secs(1));
        let count = Arc::new(AtomicUsize::new(0));
        let count_in_cb = count.clone();

        let token = tracker.watch(
            move |_| {
                count_in_cb.fetch_add(1, Ordering::SeqCst);
            },
            |_| {},
        );

        tx.send(Ok(Position::new(1.0, 0.0))).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        token.cancel();
        token.cancel();

        // The device keeps producing; the consumer must stay silent.
        tx.send(Ok(Position::new(2.0, 0.0))).unwrap();
        tx.send(Ok(Position::new(3.0, 0.0))).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn source_error_fires_on_error_and_terminates_watch() {
        let (tx, source) = ChannelPositionSource::new();
        let tracker = GeoTracker::new(source, Duration::from_secs(1));
        let (err_tx, mut err_rx) = tokio::sync::mpsc::unbounded_channel();
        let count = Arc::new(AtomicUsize::new(0));
        let count_in_cb = count.clone();

        let _token = tracker.watch(
            move |_| {
                count_in_cb.fetch_add(1, Ordering::SeqCst);
            },
            move |e| {
                let _ = err_tx.send(e.to_string());
            },
        );

        tx.send(Err(ClientError::LocationUnavailable(
            "permission revoked".to_string(),
        )))
        .unwrap();
        let err = err_rx.recv().await.unwrap();
        assert!(err.contains("permission revoked"));

        // Watch is dead; further readings never reach on_update.
        tx.send(Ok(Position::new(5.0, 5.0))).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
