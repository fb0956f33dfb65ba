//! Room lifecycle handlers.
//!
//! All membership changes for one room happen under that room's `inner`
//! write lock, and every delayed deletion re-checks live state at fire time.
//! Removal from the table goes through `remove_if` so a join that lands
//! between the decision and the removal keeps the room alive.

use crate::error::RoomError;
use crate::protocol::{Participant, RoomAction, RoomUpdateKind, ServerMessage};
use crate::state::{epoch_ms, AppState, Room};
use serde::Serialize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Outcome of a successful join, echoed back to the joiner.
#[derive(Debug)]
pub struct JoinInfo {
    pub client_count: usize,
    pub participants: Vec<Participant>,
}

/// Room creation request.
pub async fn handle_create_room(state: Arc<AppState>, conn_id: &str, room_name: &str, pin: &str) {
    match create_room(&state, room_name, pin, conn_id) {
        Ok(()) => {
            tracing::info!(conn_id = %conn_id, room = %room_name, "Room created");
            send_to_conn(
                &state,
                conn_id,
                ServerMessage::RoomCreated {
                    room_name: room_name.to_string(),
                    pin: pin.to_string(),
                },
            );
        }
        Err(err) => {
            tracing::warn!(conn_id = %conn_id, room = %room_name, error = %err, "Create rejected");
            send_room_error(&state, conn_id, err);
        }
    }
}

/// Insert a provisional room and arm its grace-period timer.
///
/// The creator is not added as a member; they send a separate join request
/// like everyone else.
pub fn create_room(
    state: &Arc<AppState>,
    name: &str,
    pin: &str,
    creator: &str,
) -> Result<(), RoomError> {
    if !is_valid_pin(pin) {
        return Err(RoomError::InvalidPin);
    }

    match state.rooms.entry(name.to_string()) {
        dashmap::mapref::entry::Entry::Occupied(_) => {
            Err(RoomError::RoomExists(name.to_string()))
        }
        dashmap::mapref::entry::Entry::Vacant(entry) => {
            entry.insert(Room::new(
                name.to_string(),
                pin.to_string(),
                creator.to_string(),
            ));
            spawn_grace_timer(state.clone(), name.to_string());
            Ok(())
        }
    }
}

/// PINs are 4-6 ASCII digits, exactly as the landing page enforces.
fn is_valid_pin(pin: &str) -> bool {
    (4..=6).contains(&pin.len()) && pin.bytes().all(|b| b.is_ascii_digit())
}

/// Room join request.
pub async fn handle_join_room(
    state: Arc<AppState>,
    conn_id: &str,
    room_name: &str,
    pin: &str,
    username: Option<String>,
) {
    match join_room(&state, room_name, pin, conn_id, username).await {
        Ok(info) => {
            tracing::info!(
                conn_id = %conn_id,
                room = %room_name,
                client_count = info.client_count,
                "Joined room"
            );
            send_to_conn(
                &state,
                conn_id,
                ServerMessage::RoomJoined {
                    room_name: room_name.to_string(),
                    pin: pin.to_string(),
                    client_count: info.client_count,
                    participants: info.participants.clone(),
                },
            );
            broadcast_to_room_except(
                &state,
                room_name,
                conn_id,
                ServerMessage::RoomUpdate {
                    kind: RoomUpdateKind::UserJoined,
                    room_name: room_name.to_string(),
                    client_count: info.client_count,
                    participants: info.participants,
                },
            )
            .await;
        }
        Err(err) => {
            tracing::warn!(conn_id = %conn_id, room = %room_name, error = %err, "Join rejected");
            send_room_error(&state, conn_id, err);
        }
    }
}

/// Add a connection to a room after PIN check.
///
/// The first join clears the provisional/grace flags, which neuters the
/// pending grace timer without cancelling it.
pub async fn join_room(
    state: &Arc<AppState>,
    name: &str,
    pin: &str,
    conn_id: &str,
    username: Option<String>,
) -> Result<JoinInfo, RoomError> {
    let client_count = {
        let room = state
            .rooms
            .get(name)
            .ok_or_else(|| RoomError::RoomNotFound(name.to_string()))?;

        // Exact string compare, no normalization
        if room.pin != pin {
            return Err(RoomError::BadPin);
        }

        let mut inner = room.inner.write().await;
        inner.members.insert(conn_id.to_string(), epoch_ms());
        if inner.in_grace_period {
            inner.in_grace_period = false;
            inner.provisional = false;
            tracing::info!(room = %name, "Room is now active (grace period cleared)");
        }
        inner.members.len()
    };

    if let Some(conn) = state.connections.get(conn_id) {
        *conn.room.write().await = Some(name.to_string());
        if username.is_some() {
            *conn.username.write().await = username;
        }
    }

    let participants = participants(state, name).await;
    Ok(JoinInfo {
        client_count,
        participants,
    })
}

/// Explicit leave. Idempotent; unbound connections are a no-op.
///
/// Unlike a disconnect, leaving gets no reconnection window: the last member
/// walking out deletes the room on the spot.
pub async fn handle_leave_room(state: Arc<AppState>, conn_id: &str) {
    let room_name = bound_room(&state, conn_id).await;
    let Some(room_name) = room_name else {
        return;
    };

    let remaining = remove_member(&state, &room_name, conn_id).await;

    match remaining {
        Some(0) => {
            if remove_room_if_empty(&state, &room_name).await {
                tracing::info!(room = %room_name, "Room deleted (empty)");
            }
        }
        Some(count) => {
            tracing::info!(conn_id = %conn_id, room = %room_name, remaining = count, "Left room");
            let participants = participants(&state, &room_name).await;
            broadcast_to_room(
                &state,
                &room_name,
                ServerMessage::RoomUpdate {
                    kind: RoomUpdateKind::UserLeft,
                    room_name: room_name.clone(),
                    client_count: count,
                    participants,
                },
            )
            .await;
        }
        None => {}
    }

    clear_binding(&state, conn_id).await;
}

/// Room-side cleanup for an abrupt disconnect.
///
/// An active room emptied by a disconnect gets a short reconnection window;
/// a room still in its creation grace period already has a pending deletion
/// check and must not get a second timer.
pub async fn handle_disconnect_room(state: Arc<AppState>, conn_id: &str) {
    let room_name = bound_room(&state, conn_id).await;
    let Some(room_name) = room_name else {
        return;
    };

    let outcome = {
        let Some(room) = state.rooms.get(&room_name) else {
            clear_binding(&state, conn_id).await;
            return;
        };
        let mut inner = room.inner.write().await;
        if inner.members.remove(conn_id).is_none() {
            None
        } else if inner.members.is_empty() {
            Some((0, inner.in_grace_period))
        } else {
            Some((inner.members.len(), false))
        }
    };

    match outcome {
        Some((0, in_grace)) => {
            if in_grace {
                tracing::info!(room = %room_name, "Room empty but still within grace period");
            } else {
                tracing::info!(
                    room = %room_name,
                    timeout = ?state.config.room.empty_timeout,
                    "Room empty, deletion scheduled"
                );
                spawn_empty_timer(state.clone(), room_name.clone());
            }
        }
        Some((count, _)) => {
            tracing::info!(conn_id = %conn_id, room = %room_name, remaining = count, "Removed from room");
            let participants = participants(&state, &room_name).await;
            broadcast_to_room(
                &state,
                &room_name,
                ServerMessage::RoomUpdate {
                    kind: RoomUpdateKind::UserDisconnected,
                    room_name: room_name.clone(),
                    client_count: count,
                    participants,
                },
            )
            .await;
        }
        None => {}
    }

    clear_binding(&state, conn_id).await;
}

/// Participants request from a client; replies with the sender's own room.
pub async fn handle_get_participants(state: Arc<AppState>, conn_id: &str) {
    let participants = match bound_room(&state, conn_id).await {
        Some(room_name) => participants(&state, &room_name).await,
        None => Vec::new(),
    };
    send_to_conn(&state, conn_id, ServerMessage::RoomParticipants { participants });
}

/// Build the presence snapshot for a room, ordered by join time.
pub async fn participants(state: &Arc<AppState>, room_name: &str) -> Vec<Participant> {
    let members: Vec<(String, u64)> = match state.rooms.get(room_name) {
        Some(room) => {
            let inner = room.inner.read().await;
            inner
                .members
                .iter()
                .map(|(id, joined)| (id.clone(), *joined))
                .collect()
        }
        None => return Vec::new(),
    };

    let mut out = Vec::with_capacity(members.len());
    for (id, joined_at) in members {
        if let Some(conn) = state.connections.get(&id) {
            let username = conn.username.read().await.clone();
            out.push(Participant {
                id,
                username,
                joined_at,
                is_requesting: conn.talking.load(Ordering::Relaxed),
            });
        }
    }
    out.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then_with(|| a.id.cmp(&b.id)));
    out
}

/// One row of the diagnostic room listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub name: String,
    pub client_count: usize,
    pub created_at: u64,
    pub is_provisional: bool,
    pub in_grace_period: bool,
}

/// Snapshot of every room for the debug endpoint. Read-only.
pub async fn room_list(state: &Arc<AppState>) -> Vec<RoomSummary> {
    let names: Vec<String> = state.rooms.iter().map(|r| r.key().clone()).collect();
    let mut out = Vec::with_capacity(names.len());
    for name in names {
        if let Some(room) = state.rooms.get(&name) {
            let inner = room.inner.read().await;
            out.push(RoomSummary {
                name: room.name.clone(),
                client_count: inner.members.len(),
                created_at: room.created_at,
                is_provisional: inner.provisional,
                in_grace_period: inner.in_grace_period,
            });
        }
    }
    out
}

/// Message to everyone in a room.
pub async fn broadcast_to_room(state: &AppState, room_name: &str, message: ServerMessage) {
    if let Some(room) = state.rooms.get(room_name) {
        let inner = room.inner.read().await;
        for conn_id in inner.members.keys() {
            if let Some(conn) = state.connections.get(conn_id) {
                let _ = conn.sender.send(message.clone());
            }
        }
    }
}

/// Message to everyone in a room except one connection.
pub async fn broadcast_to_room_except(
    state: &AppState,
    room_name: &str,
    except_conn_id: &str,
    message: ServerMessage,
) {
    if let Some(room) = state.rooms.get(room_name) {
        let inner = room.inner.read().await;
        for conn_id in inner.members.keys() {
            if conn_id != except_conn_id {
                if let Some(conn) = state.connections.get(conn_id) {
                    let _ = conn.sender.send(message.clone());
                }
            }
        }
    }
}

/// Message to one connection. Delivery failures are swallowed.
pub fn send_to_conn(state: &AppState, conn_id: &str, message: ServerMessage) {
    if let Some(conn) = state.connections.get(conn_id) {
        let _ = conn.sender.send(message);
    }
}

fn send_room_error(state: &AppState, conn_id: &str, err: RoomError) {
    let action: RoomAction = err.action();
    send_to_conn(
        state,
        conn_id,
        ServerMessage::RoomError {
            action,
            message: err.to_string(),
        },
    );
}

async fn bound_room(state: &AppState, conn_id: &str) -> Option<String> {
    let conn = state.connections.get(conn_id)?;
    let room = conn.room.read().await.clone();
    room
}

async fn clear_binding(state: &AppState, conn_id: &str) {
    if let Some(conn) = state.connections.get(conn_id) {
        *conn.room.write().await = None;
    }
}

/// Drop a member under the room lock; returns the remaining count, or None
/// if the room or membership was already gone.
async fn remove_member(state: &AppState, room_name: &str, conn_id: &str) -> Option<usize> {
    let room = state.rooms.get(room_name)?;
    let mut inner = room.inner.write().await;
    inner.members.remove(conn_id)?;
    Some(inner.members.len())
}

/// Delete a room from the table only if it is still empty right now.
///
/// `try_read` failing means another task holds the room lock mid-mutation;
/// the room is kept and that task's own emptiness handling decides its fate.
async fn remove_room_if_empty(state: &AppState, room_name: &str) -> bool {
    state
        .rooms
        .remove_if(room_name, |_, room| {
            room.inner
                .try_read()
                .map(|inner| inner.members.is_empty())
                .unwrap_or(false)
        })
        .is_some()
}

/// One-shot timer reaping a provisional room nobody ever joined.
///
/// State is re-resolved at fire time; a join in the meantime cleared the
/// grace flag and the check fails.
fn spawn_grace_timer(state: Arc<AppState>, room_name: String) {
    let grace_period = state.config.room.grace_period;
    tokio::spawn(async move {
        tokio::time::sleep(grace_period).await;
        let removed = state
            .rooms
            .remove_if(&room_name, |_, room| {
                room.inner
                    .try_read()
                    .map(|inner| inner.members.is_empty() && inner.in_grace_period)
                    .unwrap_or(false)
            })
            .is_some();
        if removed {
            tracing::info!(room = %room_name, "Grace period expired, deleted empty room");
        }
    });
}

/// One-shot timer reaping a room left empty by a disconnect, unless someone
/// rejoined before it fires.
fn spawn_empty_timer(state: Arc<AppState>, room_name: String) {
    let empty_timeout = state.config.room.empty_timeout;
    tokio::spawn(async move {
        tokio::time::sleep(empty_timeout).await;
        let removed = state
            .rooms
            .remove_if(&room_name, |_, room| {
                room.inner
                    .try_read()
                    .map(|inner| inner.members.is_empty())
                    .unwrap_or(false)
            })
            .is_some();
        if removed {
            tracing::info!(room = %room_name, "Room deleted (empty timeout)");
        }
    });
}
