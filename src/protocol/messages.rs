//! Client-server message protocol definitions.
//!
//! Events ride as JSON text frames shaped `{"type": "...", "payload": ...}`,
//! with the kebab-case event names the browser client listens for.

use serde::{Deserialize, Serialize};

/// Client → server messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    // Connection
    Heartbeat,

    // Room Management
    CreateRoom {
        room_name: String,
        pin: String,
    },
    JoinRoom {
        room_name: String,
        pin: String,
        username: Option<String>,
    },
    LeaveRoom,
    GetParticipants,

    // Audio Relay
    AudioData {
        audio: serde_json::Value,
    },
    TalkingStatus {
        is_talking: bool,
    },
}

/// Server → client messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    // Connection
    Connected {
        socket_id: String,
    },
    HeartbeatAck,
    ClientCount(usize),

    // Room Events
    RoomCreated {
        room_name: String,
        pin: String,
    },
    RoomJoined {
        room_name: String,
        pin: String,
        client_count: usize,
        participants: Vec<Participant>,
    },
    RoomError {
        action: RoomAction,
        message: String,
    },
    RoomUpdate {
        #[serde(rename = "type")]
        kind: RoomUpdateKind,
        room_name: String,
        client_count: usize,
        participants: Vec<Participant>,
    },
    RoomParticipants {
        participants: Vec<Participant>,
    },

    // Audio Relay
    AudioData {
        audio: serde_json::Value,
        sender_id: String,
        timestamp: u64,
    },
    TalkingStatus {
        sender_id: String,
        is_talking: bool,
    },
}

/// Which request a `room-error` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomAction {
    Create,
    Join,
}

/// Membership change carried by a `room-update` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoomUpdateKind {
    UserJoined,
    UserLeft,
    UserDisconnected,
}

/// Snapshot of one room member, built on demand for presence UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub joined_at: u64,
    pub is_requesting: bool,
}
