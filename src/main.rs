//! Headless live agent: wires the full client lifecycle end to end.
//!
//! Opens the live connection for a session taken from the environment, logs
//! every inbound push event, and broadcasts a simulated position feed until
//! interrupted. Teardown releases every handle exactly once: broadcaster,
//! geolocation watch, subscriptions, connection.

use std::time::Duration;

use roadcall::config::Config;
use roadcall::geo::SimulatedPositionSource;
use roadcall::map::{self, MapContext};
use roadcall::models::{EventChannel, Role, Session};
use roadcall::{ConnectionManager, GeoTracker, PresenceBroadcaster, RestClient, RosterStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("config: {}", e))?;

    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_level))?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let session = Session::new(
        std::env::var("ACTOR_ID").unwrap_or_else(|_| "agent-1".to_string()),
        std::env::var("AUTH_TOKEN").unwrap_or_else(|_| "dev-token".to_string()),
        Role::Mechanic,
    );
    let rest = RestClient::new(config.backend_url.clone(), &session);

    let manager = ConnectionManager::new(config.live_url.clone());
    let handle = manager.open(&session).await?;

    let mut messages = handle.subscribe(EventChannel::Message)?;
    let mut emergencies = handle.subscribe(EventChannel::NewEmergencyRequest)?;
    let message_task = tokio::spawn(async move {
        while let Some(event) = messages.recv().await {
            tracing::info!(?event, "inbound message event");
        }
    });
    let emergency_task = tokio::spawn(async move {
        while let Some(event) = emergencies.recv().await {
            tracing::info!(?event, "inbound emergency event");
        }
    });

    let tracker = GeoTracker::new(
        SimulatedPositionSource::new(48.2082, 16.3738, Duration::from_secs(5)),
        Duration::from_millis(config.location_timeout_ms),
    );
    // Bootstrap the roster from a REST snapshot around the first reading. A
    // failed fetch is a transient condition, not a startup failure.
    let mut roster = RosterStore::new();
    match tracker.get_once().await {
        Ok(position) => {
            match rest
                .nearby_providers(position.latitude, position.longitude, config.nearby_radius_km)
                .await
            {
                Ok(entries) => {
                    roster.snapshot(entries);
                    let markers = map::project(&roster.entries(), &MapContext::Browse);
                    tracing::info!(markers = markers.len(), "roster bootstrapped");
                }
                Err(e) => tracing::warn!(error = %e, "nearby snapshot failed"),
            }
        }
        Err(e) => tracing::warn!(error = %e, "no initial position"),
    }

    let (position_tx, position_rx) = tokio::sync::mpsc::unbounded_channel();
    let watch = tracker.watch(
        move |position| {
            let _ = position_tx.send(position);
        },
        |e| tracing::warn!(error = %e, "position feed terminated"),
    );
    let broadcaster = PresenceBroadcaster::start(&session, position_rx, rest, handle.clone());

    tracing::info!(actor_id = %session.actor_id, "live agent running; ctrl-c to stop");
    tokio::signal::ctrl_c().await?;

    broadcaster.stop();
    watch.cancel();
    manager.close(&handle).await;
    message_task.abort();
    emergency_task.abort();
    tracing::info!("live agent stopped");
    Ok(())
}
