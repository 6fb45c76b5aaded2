//! Roadside emergency assistance requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Position;

/// Lifecycle of an emergency request. Transitions happen server-side via
/// responder accept/complete; the client only re-fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EmergencyStatus {
    Pending,
    Inprogress,
    Completed,
}

/// An assistance request raised by a stranded requester, optionally claimed by
/// a responder. Never deleted client-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyRequest {
    pub id: String,
    pub requester_id: String,
    #[serde(default)]
    pub responder_id: Option<String>,
    pub position: Position,
    pub status: EmergencyStatus,
    pub created_at: DateTime<Utc>,
}

impl EmergencyRequest {
    pub fn is_open(&self) -> bool {
        self.status == EmergencyStatus::Pending
    }
}
