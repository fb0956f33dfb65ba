//! Connection registry handlers.
//!
//! Pure bookkeeping: no PIN or room validation lives here.

use crate::protocol::ServerMessage;
use crate::state::{AppState, Connection};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// Insert a new connection into the registry and hand back its id.
pub fn register_connection(state: &AppState, sender: UnboundedSender<ServerMessage>) -> String {
    let conn_id = Uuid::new_v4().to_string();
    state
        .connections
        .insert(conn_id.clone(), Connection::new(conn_id.clone(), sender));
    conn_id
}

/// New connection: register, greet, and update everyone's headcount.
pub async fn handle_connection(
    state: Arc<AppState>,
    sender: UnboundedSender<ServerMessage>,
) -> String {
    let conn_id = register_connection(&state, sender.clone());

    let _ = sender.send(ServerMessage::Connected {
        socket_id: conn_id.clone(),
    });
    broadcast_client_count(&state);

    tracing::info!(conn_id = %conn_id, "New client connected");
    conn_id
}

/// Connection teardown.
///
/// Room cleanup runs before unregistration so it can still read the
/// connection's last-bound room.
pub async fn handle_disconnect(state: Arc<AppState>, conn_id: &str) {
    crate::handlers::room::handle_disconnect_room(state.clone(), conn_id).await;
    state.connections.remove(conn_id);
    broadcast_client_count(&state);
    tracing::info!(conn_id = %conn_id, "Client disconnected");
}

/// Push the total connected-client count to every connection, room or not.
pub fn broadcast_client_count(state: &AppState) {
    let count = state.connections.len();
    for conn in state.connections.iter() {
        let _ = conn.sender.send(ServerMessage::ClientCount(count));
    }
}

/// Heartbeat round-trip.
pub fn handle_heartbeat(sender: &UnboundedSender<ServerMessage>) {
    let _ = sender.send(ServerMessage::HeartbeatAck);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::handlers::room::{create_room, join_room};
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState::new(Config::for_tests()))
    }

    fn last_client_count(rx: &mut UnboundedReceiver<ServerMessage>) -> Option<usize> {
        let mut last = None;
        while let Ok(msg) = rx.try_recv() {
            if let ServerMessage::ClientCount(n) = msg {
                last = Some(n);
            }
        }
        last
    }

    #[tokio::test]
    async fn connect_greets_and_broadcasts_count() {
        let state = test_state();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let a = handle_connection(state.clone(), tx_a).await;

        match rx_a.try_recv().unwrap() {
            ServerMessage::Connected { socket_id } => assert_eq!(socket_id, a),
            other => panic!("expected connected greeting, got {other:?}"),
        }
        assert_eq!(last_client_count(&mut rx_a), Some(1));

        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        handle_connection(state.clone(), tx_b).await;
        assert_eq!(last_client_count(&mut rx_a), Some(2));
        assert_eq!(last_client_count(&mut rx_b), Some(2));
    }

    #[tokio::test]
    async fn count_tracks_registry_size_across_interleavings() {
        let state = test_state();
        let mut conns = Vec::new();
        for _ in 0..5 {
            let (tx, rx) = mpsc::unbounded_channel();
            let id = handle_connection(state.clone(), tx).await;
            conns.push((id, rx));
        }
        assert_eq!(state.connections.len(), 5);

        // Drop every other connection, checking the broadcast after each.
        for i in [0usize, 2, 4] {
            let (id, _) = &conns[i];
            handle_disconnect(state.clone(), id).await;
        }
        assert_eq!(state.connections.len(), 2);
        let (_, rx_b) = &mut conns[1];
        assert_eq!(last_client_count(rx_b), Some(2));
    }

    #[tokio::test]
    async fn disconnect_cleans_room_before_unregistering() {
        let state = test_state();
        let (tx, _rx) = mpsc::unbounded_channel();
        let a = handle_connection(state.clone(), tx).await;
        create_room(&state, "R", "1234", &a).unwrap();
        join_room(&state, "R", "1234", &a, None).await.unwrap();

        handle_disconnect(state.clone(), &a).await;
        assert!(!state.connections.contains_key(&a));
        // Membership was removed even though the room lingers on its timer.
        let room = state.rooms.get("R").unwrap();
        assert!(room.inner.read().await.members.is_empty());
    }

    #[tokio::test]
    async fn heartbeat_is_acknowledged() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        handle_heartbeat(&tx);
        assert!(matches!(rx.try_recv(), Ok(ServerMessage::HeartbeatAck)));
    }
}
