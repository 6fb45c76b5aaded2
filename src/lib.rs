//! Real-time client core for a vehicle-service marketplace.
//!
//! Provides the live-connection, geolocation, presence-broadcast, roster and
//! chat-session machinery behind the marketplace's chat, map and emergency
//! assistance views. The REST backend and the directions service are external
//! collaborators.

pub mod broadcaster;
pub mod config;
pub mod connection;
pub mod error;
pub mod geo;
pub mod map;
pub mod models;
pub mod rest;
pub mod stores;

pub use broadcaster::PresenceBroadcaster;
pub use config::Config;
pub use connection::{ConnectionHandle, ConnectionManager, Subscription};
pub use error::{ClientError, ClientResult};
pub use geo::{GeoTracker, PositionSource, WatchToken};
pub use rest::RestClient;
pub use stores::{ChatSessionStore, RosterStore};
