//! Application state management.

use crate::config::Config;
use crate::protocol::ServerMessage;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc::UnboundedSender, RwLock};

/// Global application state.
///
/// The two tables are the only cross-connection mutable resources. Rooms are
/// keyed by name (case-sensitive), connections by their socket id.
pub struct AppState {
    /// Room table (room_name -> Room)
    pub rooms: DashMap<String, Room>,
    /// Connection registry (conn_id -> Connection)
    pub connections: DashMap<String, Connection>,
    /// Settings
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            rooms: DashMap::new(),
            connections: DashMap::new(),
            config: Arc::new(config),
        }
    }
}

/// A named, PIN-protected broadcast group.
///
/// The PIN and creation metadata are immutable after insertion; everything
/// that changes over the room's life sits behind one lock so membership
/// mutation and the "is it empty now" decision stay atomic per room.
pub struct Room {
    pub name: String,
    pub pin: String,
    pub created_at: u64,
    pub created_by: String,
    pub inner: RwLock<RoomInner>,
}

/// Mutable portion of a room.
pub struct RoomInner {
    /// Member conn_id -> joined-at timestamp (epoch ms)
    pub members: HashMap<String, u64>,
    /// True until the first member joins
    pub provisional: bool,
    /// True while the post-creation grace timer is still relevant
    pub in_grace_period: bool,
}

impl Room {
    pub fn new(name: String, pin: String, created_by: String) -> Self {
        Self {
            name,
            pin,
            created_at: epoch_ms(),
            created_by,
            inner: RwLock::new(RoomInner {
                members: HashMap::new(),
                provisional: true,
                in_grace_period: true,
            }),
        }
    }
}

/// One live duplex channel to a client.
pub struct Connection {
    pub id: String,
    /// Bound room name; a lookup key into the room table, never ownership
    pub room: RwLock<Option<String>>,
    pub username: RwLock<Option<String>>,
    /// Push-to-talk state, reflected as `isRequesting` in snapshots
    pub talking: AtomicBool,
    pub sender: UnboundedSender<ServerMessage>,
    #[allow(dead_code)]
    pub connected_at: Instant,
}

impl Connection {
    pub fn new(id: String, sender: UnboundedSender<ServerMessage>) -> Self {
        Self {
            id,
            room: RwLock::new(None),
            username: RwLock::new(None),
            talking: AtomicBool::new(false),
            sender,
            connected_at: Instant::now(),
        }
    }
}

/// Milliseconds since the Unix epoch, `Date.now()` style.
pub fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
