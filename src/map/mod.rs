//! Map projection: store snapshots in, renderable markers out, plus route
//! computation against the external directions service.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use tracing::{debug, instrument};

use crate::error::{ClientError, ClientResult};
use crate::models::{EmergencyRequest, Position, RosterEntry};

/// One renderable map marker.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub actor_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub title: String,
    pub description: String,
}

/// What the map is currently centered on: a chat with one counterpart or an
/// emergency dispatch.
#[derive(Debug, Clone)]
pub enum MapContext {
    Browse,
    Chat { counterpart_id: String },
    Emergency(EmergencyRequest),
}

/// Pure projection from current store snapshots to a marker list. Recomputed
/// on every store change; holds no state of its own.
pub fn project(entries: &[&RosterEntry], context: &MapContext) -> Vec<Marker> {
    let mut markers: Vec<Marker> = entries
        .iter()
        .map(|entry| {
            let highlighted = matches!(
                context,
                MapContext::Chat { counterpart_id } if *counterpart_id == entry.actor_id
            );
            let mut description = match entry.distance_km {
                Some(d) => format!("{:.1} km away", d),
                None => "distance unknown".to_string(),
            };
            if !entry.available {
                description.push_str(&format!(", last seen {}", entry.last_seen_at.to_rfc3339()));
            }
            if highlighted {
                description.push_str(", in conversation");
            }
            Marker {
                actor_id: entry.actor_id.clone(),
                latitude: entry.position.latitude,
                longitude: entry.position.longitude,
                title: entry.display_name.clone(),
                description,
            }
        })
        .collect();

    if let MapContext::Emergency(request) = context {
        markers.push(Marker {
            actor_id: request.requester_id.clone(),
            latitude: request.position.latitude,
            longitude: request.position.longitude,
            title: "Assistance requested".to_string(),
            description: format!("request {} ({:?})", request.id, request.status),
        });
    }

    markers
}

/// Memoizing wrapper around [`project`]: identical inputs reuse the previous
/// marker list instead of rebuilding it.
#[derive(Default)]
pub struct MapProjector {
    cache: Option<(u64, Vec<Marker>)>,
}

impl MapProjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project(&mut self, entries: &[&RosterEntry], context: &MapContext) -> &[Marker] {
        let fingerprint = Self::fingerprint(entries, context);
        let hit = matches!(self.cache, Some((cached, _)) if cached == fingerprint);
        if !hit {
            self.cache = Some((fingerprint, project(entries, context)));
        } else {
            debug!("marker projection cache hit");
        }
        &self.cache.as_ref().expect("cache populated above").1
    }

    fn fingerprint(entries: &[&RosterEntry], context: &MapContext) -> u64 {
        let mut hasher = DefaultHasher::new();
        for entry in entries {
            entry.actor_id.hash(&mut hasher);
            entry.position.latitude.to_bits().hash(&mut hasher);
            entry.position.longitude.to_bits().hash(&mut hasher);
            entry.last_seen_at.hash(&mut hasher);
            entry.available.hash(&mut hasher);
        }
        match context {
            MapContext::Browse => 0u8.hash(&mut hasher),
            MapContext::Chat { counterpart_id } => {
                1u8.hash(&mut hasher);
                counterpart_id.hash(&mut hasher);
            }
            MapContext::Emergency(request) => {
                2u8.hash(&mut hasher);
                request.id.hash(&mut hasher);
                request.position.latitude.to_bits().hash(&mut hasher);
                request.position.longitude.to_bits().hash(&mut hasher);
            }
        }
        hasher.finish()
    }
}

/// Route geometry as a sequence of `(latitude, longitude)` points.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutePolyline {
    pub points: Vec<(f64, f64)>,
}

/// Client for the external directions service. A failed or empty route is
/// non-fatal: the map renders markers without an overlay.
#[derive(Clone)]
pub struct RouteClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RouteClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Compute a driving route between two positions. Any network or
    /// no-route failure collapses into `RouteUnavailable`.
    #[instrument(skip(self, origin, destination))]
    pub async fn compute_route(
        &self,
        origin: Position,
        destination: Position,
    ) -> ClientResult<RoutePolyline> {
        let url = format!("{}/v2/directions/driving-car", self.base_url);
        let response = self
            .http
            .get(&url)
            .header("Authorization", &self.api_key)
            .query(&[
                ("start", format!("{},{}", origin.longitude, origin.latitude)),
                (
                    "end",
                    format!("{},{}", destination.longitude, destination.latitude),
                ),
            ])
            .send()
            .await
            .map_err(|e| ClientError::RouteUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ClientError::RouteUnavailable(format!(
                "directions service returned {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ClientError::RouteUnavailable(e.to_string()))?;
        Self::parse_geometry(&body)
    }

    /// Extract the first route's GeoJSON coordinates (`[lon, lat]` pairs).
    fn parse_geometry(body: &serde_json::Value) -> ClientResult<RoutePolyline> {
        let coordinates = body["features"][0]["geometry"]["coordinates"]
            .as_array()
            .ok_or_else(|| ClientError::RouteUnavailable("no route geometry".to_string()))?;

        let points = coordinates
            .iter()
            .filter_map(|pair| {
                let lon = pair.get(0)?.as_f64()?;
                let lat = pair.get(1)?.as_f64()?;
                Some((lat, lon))
            })
            .collect::<Vec<_>>();

        if points.is_empty() {
            return Err(ClientError::RouteUnavailable("empty route".to_string()));
        }
        Ok(RoutePolyline { points })
    }
}
