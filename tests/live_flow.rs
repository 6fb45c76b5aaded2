//! Integration tests over the in-memory loopback connection: channel fan-out,
//! store merges under live/REST interleaving, and teardown idempotence.

use chrono::{Duration, Utc};
use roadcall::connection::ConnectionHandle;
use roadcall::models::{
    EmergencyStatus, EventChannel, LiveEvent, Message, OutboundEvent, Position, Role, RosterEntry,
    WireFrame,
};
use roadcall::stores::{ChatSessionStore, RosterStore};
use roadcall::ClientError;
use serde_json::json;

fn roster_entry(actor_id: &str, lat: f64, distance_km: Option<f64>) -> RosterEntry {
    RosterEntry {
        actor_id: actor_id.to_string(),
        display_name: format!("name-{}", actor_id),
        role: Role::Mechanic,
        position: Position::new(lat, 0.0),
        distance_km,
        available: true,
        last_seen_at: Utc::now(),
    }
}

#[tokio::test]
async fn live_message_flows_into_thread_and_deduplicates_against_history() {
    let (handle, _out_rx, feed) = ConnectionHandle::loopback();
    let mut sub = handle.subscribe(EventChannel::Message).unwrap();
    let mut store = ChatSessionStore::new("A", "B");

    let t0 = Utc::now();
    store.apply_history(vec![Message {
        id: "m1".to_string(),
        sender_id: "B".to_string(),
        receiver_id: "A".to_string(),
        body: "hi".to_string(),
        created_at: t0,
        read_flag: false,
    }]);

    // The server echoes the same message over the live channel.
    feed.push(&WireFrame {
        event: "new_message".to_string(),
        data: json!({
            "id": "m1",
            "senderId": "B",
            "receiverId": "A",
            "body": "hi",
            "createdAt": t0,
            "readFlag": false,
        }),
    });

    match sub.recv().await {
        Some(LiveEvent::NewMessage(message)) => {
            store.on_live_message(message);
        }
        other => panic!("unexpected event: {:?}", other),
    }

    assert_eq!(store.messages().len(), 1);
    sub.cancel();
    handle.close();
}

#[tokio::test]
async fn location_events_merge_into_roster_only_for_known_actors() {
    let (handle, _out_rx, feed) = ConnectionHandle::loopback();
    let mut sub = handle.subscribe(EventChannel::LocationUpdate).unwrap();
    let mut roster = RosterStore::new();

    // Ping before any snapshot: must be ignored.
    feed.push(&WireFrame {
        event: "provider_location_update".to_string(),
        data: json!({ "userId": "p1", "latitude": 10.0, "longitude": 20.0 }),
    });
    if let Some(LiveEvent::ProviderLocationUpdate {
        user_id,
        latitude,
        longitude,
    }) = sub.recv().await
    {
        roster.on_live_location_event(&user_id, Position::new(latitude, longitude));
    }
    assert!(roster.is_empty());

    // After the snapshot the same ping merges, distance stays stale.
    roster.snapshot(vec![roster_entry("p1", 1.0, Some(3.3))]);
    feed.push(&WireFrame {
        event: "provider_location_update".to_string(),
        data: json!({ "userId": "p1", "latitude": 11.0, "longitude": 21.0 }),
    });
    if let Some(LiveEvent::ProviderLocationUpdate {
        user_id,
        latitude,
        longitude,
    }) = sub.recv().await
    {
        roster.on_live_location_event(&user_id, Position::new(latitude, longitude));
    }

    let merged = roster.get("p1").unwrap();
    assert_eq!(merged.position.latitude, 11.0);
    assert_eq!(merged.distance_km, Some(3.3));

    sub.cancel();
    handle.close();
}

#[tokio::test]
async fn emergency_event_adds_roster_entry_without_rest_round_trip() {
    let (handle, _out_rx, feed) = ConnectionHandle::loopback();
    let mut sub = handle.subscribe(EventChannel::NewEmergencyRequest).unwrap();
    let mut roster = RosterStore::new();

    feed.push(&WireFrame {
        event: "new_emergency_request".to_string(),
        data: json!({
            "id": "e1",
            "requesterId": "u9",
            "responderId": null,
            "position": { "latitude": 5.0, "longitude": 6.0, "capturedAt": Utc::now() },
            "status": "PENDING",
            "createdAt": Utc::now(),
        }),
    });

    match sub.recv().await {
        Some(LiveEvent::NewEmergencyRequest(request)) => {
            assert_eq!(request.status, EmergencyStatus::Pending);
            roster.on_new_entry(RosterEntry {
                actor_id: request.requester_id.clone(),
                display_name: request.requester_id.clone(),
                role: Role::Customer,
                position: request.position,
                distance_km: None,
                available: true,
                last_seen_at: Utc::now(),
            });
        }
        other => panic!("unexpected event: {:?}", other),
    }

    assert_eq!(roster.len(), 1);
    assert!(roster.get("u9").is_some());

    sub.cancel();
    handle.close();
}

#[tokio::test]
async fn teardown_is_idempotent_and_post_close_operations_fail() {
    let (handle, _out_rx, _feed) = ConnectionHandle::loopback();
    let mut sub = handle.subscribe(EventChannel::Typing).unwrap();

    handle.close();
    handle.close();
    sub.cancel();
    sub.cancel();

    assert!(handle.is_closed());
    assert!(sub.recv().await.is_none());
    assert!(matches!(
        handle.send(OutboundEvent::Authenticate {
            actor_id: "a".to_string()
        }),
        Err(ClientError::ConnectionClosed)
    ));
    assert!(matches!(
        handle.subscribe(EventChannel::Message),
        Err(ClientError::ConnectionClosed)
    ));
}

#[tokio::test]
async fn typing_event_lights_indicator_and_expires() {
    let (handle, _out_rx, feed) = ConnectionHandle::loopback();
    let mut sub = handle.subscribe(EventChannel::Typing).unwrap();
    let mut store = ChatSessionStore::new("A", "B");

    feed.push(&WireFrame {
        event: "user_typing".to_string(),
        data: json!({ "userId": "B" }),
    });

    let t0 = Utc::now();
    if let Some(LiveEvent::UserTyping { user_id }) = sub.recv().await {
        store.on_typing_at(&user_id, t0);
    }

    assert!(store.is_counterpart_typing_at(t0 + Duration::milliseconds(2900)));
    assert!(!store.is_counterpart_typing_at(t0 + Duration::milliseconds(3100)));

    sub.cancel();
    handle.close();
}
