//! Client error taxonomy for robust error handling.

use thiserror::Error;

/// Errors surfaced by the real-time client core.
///
/// Transport and REST failures are expected to be caught at the point of call
/// and turned into a transient user notification; none of these is fatal to
/// the application except a missing session.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// No valid session; the caller must (re-)authenticate first.
    #[error("Authentication required")]
    AuthRequired,

    /// The handle was closed; operations on it are no longer valid.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Transport currently disconnected; outbound sends fail fast rather than
    /// queue.
    #[error("Not connected")]
    NotConnected,

    /// Permission denied, device failure, or bounded read timeout.
    #[error("Location unavailable: {0}")]
    LocationUnavailable(String),

    /// Chat history fetch failed; previously loaded history stays untouched.
    #[error("History load failed: {0}")]
    HistoryLoadFailed(String),

    /// Directions service failed or found no route; markers render without an
    /// overlay.
    #[error("Route unavailable: {0}")]
    RouteUnavailable(String),

    /// Generic REST failure wrapping status and message.
    #[error("Remote request failed ({status:?}): {message}")]
    RemoteRequestFailed {
        status: Option<u16>,
        message: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::RemoteRequestFailed {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
