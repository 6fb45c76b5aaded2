//! Authenticated session identity.

use serde::{Deserialize, Serialize};

/// Actor role within the marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Vendor,
    Mechanic,
    Admin,
}

impl Role {
    /// Path segment used by the REST conversation-list endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Vendor => "vendor",
            Role::Mechanic => "mechanic",
            Role::Admin => "admin",
        }
    }
}

/// Logged-in session. Owned by the application's auth lifecycle; one live
/// connection is permitted per session at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub actor_id: String,
    pub auth_token: String,
    pub role: Role,
}

impl Session {
    pub fn new(actor_id: impl Into<String>, auth_token: impl Into<String>, role: Role) -> Self {
        Self {
            actor_id: actor_id.into(),
            auth_token: auth_token.into(),
            role,
        }
    }

    /// A session is usable for opening connections only while it carries a token.
    pub fn is_authenticated(&self) -> bool {
        !self.auth_token.is_empty() && !self.actor_id.is_empty()
    }
}
