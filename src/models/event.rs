//! Wire-level events for the live connection.
//!
//! Event names and payload shapes are fixed by the unmodified server and must
//! be preserved bit-for-bit. Every frame travels as a `{ "event": ..., "data":
//! ... }` JSON envelope.

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{EmergencyRequest, Message};

/// Raw frame envelope as it crosses the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireFrame {
    pub event: String,
    pub data: serde_json::Value,
}

/// Outbound events the client may emit.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    /// Post-connect identify step; payload is the bare actor id.
    Authenticate { actor_id: String },
    PrivateMessage {
        sender_id: String,
        receiver_id: String,
        message: String,
    },
    Typing {
        sender_id: String,
        receiver_id: String,
    },
    LocationUpdate {
        user_id: String,
        latitude: f64,
        longitude: f64,
    },
}

impl OutboundEvent {
    /// Encode into the wire envelope with the server's exact event names.
    pub fn to_frame(&self) -> WireFrame {
        match self {
            OutboundEvent::Authenticate { actor_id } => WireFrame {
                event: "authenticate".to_string(),
                data: json!(actor_id),
            },
            OutboundEvent::PrivateMessage {
                sender_id,
                receiver_id,
                message,
            } => WireFrame {
                event: "private_message".to_string(),
                data: json!({
                    "senderId": sender_id,
                    "receiverId": receiver_id,
                    "message": message,
                }),
            },
            OutboundEvent::Typing {
                sender_id,
                receiver_id,
            } => WireFrame {
                event: "typing".to_string(),
                data: json!({
                    "senderId": sender_id,
                    "receiverId": receiver_id,
                }),
            },
            OutboundEvent::LocationUpdate {
                user_id,
                latitude,
                longitude,
            } => WireFrame {
                event: "location_update".to_string(),
                data: json!({
                    "userId": user_id,
                    "latitude": latitude,
                    "longitude": longitude,
                }),
            },
        }
    }
}

/// Inbound events pushed by the server, already parsed into domain payloads.
#[derive(Debug, Clone)]
pub enum LiveEvent {
    NewMessage(Message),
    UserTyping {
        user_id: String,
    },
    ProviderLocationUpdate {
        user_id: String,
        latitude: f64,
        longitude: f64,
    },
    NewEmergencyRequest(EmergencyRequest),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserIdPayload {
    user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocationPayload {
    user_id: String,
    latitude: f64,
    longitude: f64,
}

impl LiveEvent {
    /// Parse a wire frame into a typed event. Unknown event names yield `None`
    /// (forward compatibility with server-side additions); malformed payloads
    /// for known events yield a serde error.
    pub fn from_frame(frame: &WireFrame) -> Result<Option<Self>, serde_json::Error> {
        let event = match frame.event.as_str() {
            "new_message" => LiveEvent::NewMessage(serde_json::from_value(frame.data.clone())?),
            "user_typing" => {
                let p: UserIdPayload = serde_json::from_value(frame.data.clone())?;
                LiveEvent::UserTyping { user_id: p.user_id }
            }
            "provider_location_update" => {
                let p: LocationPayload = serde_json::from_value(frame.data.clone())?;
                LiveEvent::ProviderLocationUpdate {
                    user_id: p.user_id,
                    latitude: p.latitude,
                    longitude: p.longitude,
                }
            }
            "new_emergency_request" => {
                LiveEvent::NewEmergencyRequest(serde_json::from_value(frame.data.clone())?)
            }
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    /// The named channel this event is delivered on.
    pub fn channel(&self) -> EventChannel {
        match self {
            LiveEvent::NewMessage(_) => EventChannel::Message,
            LiveEvent::UserTyping { .. } => EventChannel::Typing,
            LiveEvent::ProviderLocationUpdate { .. } => EventChannel::LocationUpdate,
            LiveEvent::NewEmergencyRequest(_) => EventChannel::NewEmergencyRequest,
        }
    }
}

/// Named subscription channels exposed by the connection handle. One
/// subscription per (consumer, channel) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventChannel {
    Message,
    Typing,
    LocationUpdate,
    NewEmergencyRequest,
}
