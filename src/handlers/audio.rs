//! Audio relay handlers.
//!
//! Payloads are opaque to the server; frames are stamped and fanned out to
//! the sender's room peers over their unbounded delivery channels, so a slow
//! peer never backs up the sender.

use crate::handlers::room::broadcast_to_room_except;
use crate::protocol::ServerMessage;
use crate::state::{epoch_ms, AppState};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Relay one audio frame to every other member of the sender's room.
///
/// Frames from unbound connections are dropped, not errored: the client may
/// still be mid-navigation between the landing and talk pages.
pub async fn handle_audio_data(state: Arc<AppState>, conn_id: &str, audio: serde_json::Value) {
    let room_name = {
        let Some(conn) = state.connections.get(conn_id) else {
            return;
        };
        let room = conn.room.read().await.clone();
        room
    };

    let Some(room_name) = room_name else {
        tracing::warn!(conn_id = %conn_id, "Audio received from client not in any room, dropped");
        return;
    };
    if !state.rooms.contains_key(&room_name) {
        tracing::warn!(conn_id = %conn_id, room = %room_name, "Audio received for missing room, dropped");
        return;
    }

    tracing::debug!(conn_id = %conn_id, room = %room_name, "Relaying audio frame");
    broadcast_to_room_except(
        &state,
        &room_name,
        conn_id,
        ServerMessage::AudioData {
            audio,
            sender_id: conn_id.to_string(),
            timestamp: epoch_ms(),
        },
    )
    .await;
}

/// Record a client's push-to-talk state and tell every other connection.
///
/// Kept global rather than room-scoped to match the long-standing client
/// behavior; the flag also feeds `isRequesting` in presence snapshots.
pub async fn handle_talking_status(state: Arc<AppState>, conn_id: &str, is_talking: bool) {
    if let Some(conn) = state.connections.get(conn_id) {
        conn.talking.store(is_talking, Ordering::Relaxed);
    }

    let message = ServerMessage::TalkingStatus {
        sender_id: conn_id.to_string(),
        is_talking,
    };
    for conn in state.connections.iter() {
        if conn.key() != conn_id {
            let _ = conn.sender.send(message.clone());
        }
    }
    tracing::debug!(conn_id = %conn_id, is_talking, "Talking status relayed");
}
