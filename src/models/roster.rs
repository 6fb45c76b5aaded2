//! Positions and the nearby-counterpart roster entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single geolocation reading. Immutable once captured; later readings
/// supersede rather than mutate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub captured_at: DateTime<Utc>,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            captured_at: Utc::now(),
        }
    }

    pub fn at(latitude: f64, longitude: f64, captured_at: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            captured_at,
        }
    }
}

/// One nearby counterpart (chat participant or responder) as tracked for a map
/// or list view. `distance_km` comes from the server with each snapshot and is
/// left stale across live-only merges.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub actor_id: String,
    pub display_name: String,
    pub role: super::Role,
    pub position: Position,
    pub distance_km: Option<f64>,
    pub available: bool,
    pub last_seen_at: DateTime<Utc>,
}
