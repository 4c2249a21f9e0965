//! Room Manager
//!
//! Per-connection room membership and room-to-connection resolution. A
//! room is a fan-out address, not a persisted entity: it resolves to
//! whichever connections are joined at delivery time. No authorization
//! happens here; for group rooms the dispatcher must have checked
//! membership before calling `join`.

use std::collections::HashSet;
use std::fmt;

use dashmap::DashMap;

use super::registry::ConnectionId;

/// Logical fan-out address.
///
/// `User` rooms exist implicitly for direct delivery and personal
/// notifications; `Group` rooms are joined on demand after a membership
/// check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomId {
    User(i64),
    Group(i64),
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomId::User(id) => write!(f, "user:{}", id),
            RoomId::Group(id) => write!(f, "group:{}", id),
        }
    }
}

/// Room membership maps, sharded per key.
#[derive(Default)]
pub struct RoomManager {
    room_connections: DashMap<RoomId, HashSet<ConnectionId>>,
    connection_rooms: DashMap<ConnectionId, HashSet<RoomId>>,
}

impl RoomManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent add.
    pub fn join(&self, connection_id: ConnectionId, room: RoomId) {
        self.room_connections
            .entry(room)
            .or_default()
            .insert(connection_id);
        self.connection_rooms
            .entry(connection_id)
            .or_default()
            .insert(room);
    }

    /// Idempotent remove.
    pub fn leave(&self, connection_id: ConnectionId, room: RoomId) {
        if let Some(mut set) = self.room_connections.get_mut(&room) {
            set.remove(&connection_id);
        }
        if let Some(mut set) = self.connection_rooms.get_mut(&connection_id) {
            set.remove(&room);
        }
    }

    /// Resolve a room to its live connections. An empty room is not an
    /// error: messages to offline recipients are still persisted.
    pub fn connections_in_room(&self, room: RoomId) -> Vec<ConnectionId> {
        self.room_connections
            .get(&room)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether the connection is currently joined to the room.
    pub fn is_in_room(&self, connection_id: ConnectionId, room: RoomId) -> bool {
        self.room_connections
            .get(&room)
            .map(|set| set.contains(&connection_id))
            .unwrap_or(false)
    }

    /// Drop every room membership of a connection (teardown path).
    pub fn drop_connection(&self, connection_id: ConnectionId) {
        if let Some((_, rooms)) = self.connection_rooms.remove(&connection_id) {
            for room in rooms {
                if let Some(mut set) = self.room_connections.get_mut(&room) {
                    set.remove(&connection_id);
                }
            }
        }
    }
}
