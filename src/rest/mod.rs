//! REST collaborator: the remote marketplace backend under `{backend}/api`.
//!
//! Every call carries the session token as a bearer header. Failures map into
//! the standard error taxonomy; callers surface them as transient
//! notifications and stay interactive.

use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::error::{ClientError, ClientResult};
use crate::models::{
    ConversationSummary, EmergencyRequest, Message, Position, Role, RosterEntry, Session,
};

/// Thin typed wrapper over the backend's REST surface.
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    auth_token: String,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>, session: &Session) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_token: session.auth_token.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    async fn check<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::RemoteRequestFailed {
                status: Some(status.as_u16()),
                message,
            });
        }
        Ok(response.json().await?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(&self.auth_token)
            .send()
            .await?;
        Self::check(response).await
    }

    // --- Chat ---

    /// Conversation list for the given role.
    #[instrument(skip(self))]
    pub async fn chat_conversations(&self, role: Role) -> ClientResult<Vec<ConversationSummary>> {
        self.get_json(&format!("/chat/role/{}", role.as_str())).await
    }

    /// Full message history with one counterpart, ascending by `createdAt`.
    /// Failures surface as `HistoryLoadFailed` so the store can leave any
    /// previously loaded history untouched.
    #[instrument(skip(self))]
    pub async fn chat_history(&self, counterpart_id: &str) -> ClientResult<Vec<Message>> {
        self.get_json(&format!("/chat/history/{}", counterpart_id))
            .await
            .map_err(|e| match e {
                ClientError::HistoryLoadFailed(_) => e,
                other => ClientError::HistoryLoadFailed(other.to_string()),
            })
    }

    // --- Location ---

    /// Nearby service providers around a position; `distanceKm` is computed
    /// server-side and trusted as-is.
    #[instrument(skip(self))]
    pub async fn nearby_providers(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    ) -> ClientResult<Vec<RosterEntry>> {
        let response = self
            .http
            .get(self.url("/location/nearby"))
            .bearer_auth(&self.auth_token)
            .query(&[
                ("latitude", latitude),
                ("longitude", longitude),
                ("radius", radius_km),
            ])
            .send()
            .await?;
        Self::check(response).await
    }

    /// Persist the local actor's position.
    #[instrument(skip(self, position), fields(latitude = position.latitude, longitude = position.longitude))]
    pub async fn update_location(&self, position: &Position) -> ClientResult<()> {
        let response = self
            .http
            .post(self.url("/location/update"))
            .bearer_auth(&self.auth_token)
            .json(position)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::RemoteRequestFailed {
                status: Some(status.as_u16()),
                message,
            });
        }
        debug!("location persisted");
        Ok(())
    }

    // --- Emergency assistance ---

    /// Raise a new assistance request at the given position.
    #[instrument(skip(self, position))]
    pub async fn create_emergency(&self, position: &Position) -> ClientResult<EmergencyRequest> {
        let response = self
            .http
            .post(self.url("/emergency/request"))
            .bearer_auth(&self.auth_token)
            .json(position)
            .send()
            .await?;
        Self::check(response).await
    }

    #[instrument(skip(self))]
    pub async fn accept_emergency(&self, id: &str) -> ClientResult<EmergencyRequest> {
        self.put_json(&format!("/emergency/accept/{}", id)).await
    }

    #[instrument(skip(self))]
    pub async fn complete_emergency(&self, id: &str) -> ClientResult<EmergencyRequest> {
        self.put_json(&format!("/emergency/complete/{}", id)).await
    }

    /// Open requests near the responder.
    pub async fn nearby_emergencies(&self) -> ClientResult<Vec<EmergencyRequest>> {
        self.get_json("/emergency/nearby-requests").await
    }

    /// Requests this responder has claimed.
    pub async fn provider_emergencies(&self) -> ClientResult<Vec<EmergencyRequest>> {
        self.get_json("/emergency/provider-requests").await
    }

    /// Requests this requester has raised.
    pub async fn user_emergencies(&self) -> ClientResult<Vec<EmergencyRequest>> {
        self.get_json("/emergency/user-requests").await
    }

    async fn put_json<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let response = self
            .http
            .put(self.url(path))
            .bearer_auth(&self.auth_token)
            .send()
            .await?;
        Self::check(response).await
    }
}
