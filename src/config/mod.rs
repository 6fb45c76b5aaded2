//! Application configuration loaded from environment.

/// Client configuration loaded from `.env` and environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// REST backend base URL (e.g. `http://localhost:5000`). The `/api`
    /// prefix is appended per request.
    pub backend_url: String,
    /// Live-connection WebSocket URL (e.g. `ws://localhost:5000/live`).
    pub live_url: String,
    /// External directions service base URL.
    pub routing_url: String,
    /// API credential for the directions service.
    pub routing_api_key: String,
    /// Bounded timeout for a single-shot geolocation read, in milliseconds.
    pub location_timeout_ms: u64,
    /// Default search radius for nearby-counterpart snapshots, in km.
    pub nearby_radius_km: f64,
    /// Log level: `error`, `warn`, `info`, `debug`, `trace`.
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment. Call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        let backend_url = std::env::var("BACKEND_URL")
            .unwrap_or_else(|_| "http://localhost:5000".to_string());
        let live_url =
            std::env::var("LIVE_URL").unwrap_or_else(|_| "ws://localhost:5000/live".to_string());
        let routing_url = std::env::var("ROUTING_URL")
            .unwrap_or_else(|_| "https://api.openrouteservice.org".to_string());
        let routing_api_key = std::env::var("ROUTING_API_KEY").unwrap_or_default();

        let location_timeout_ms = std::env::var("LOCATION_TIMEOUT_MS")
            .unwrap_or_else(|_| "10000".to_string())
            .parse()
            .map_err(|_| ConfigLoadError::InvalidLocationTimeout)?;
        let nearby_radius_km = std::env::var("NEARBY_RADIUS_KM")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| ConfigLoadError::InvalidNearbyRadius)?;

        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            backend_url,
            live_url,
            routing_url,
            routing_api_key,
            location_timeout_ms,
            nearby_radius_km,
            log_level,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Invalid LOCATION_TIMEOUT_MS")]
    InvalidLocationTimeout,
    #[error("Invalid NEARBY_RADIUS_KM")]
    InvalidNearbyRadius,
}
