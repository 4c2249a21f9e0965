//! Connection Registry
//!
//! Tracks which users have live connections, independent of rooms. A user
//! may hold several concurrent connections (devices); presence is a
//! property of the set, not of any single connection.

use std::collections::HashSet;

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::protocol::ServerEvent;

/// Identifier of one live transport session
pub type ConnectionId = Uuid;

struct ConnectionEntry {
    user_id: i64,
    sender: mpsc::UnboundedSender<ServerEvent>,
}

/// Result of removing a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Disconnected {
    pub user_id: i64,
    /// True iff this was the user's last connection
    pub went_offline: bool,
}

/// In-memory registry of live connections, sharded maps so unrelated users
/// never serialize on each other.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, ConnectionEntry>,
    user_connections: DashMap<i64, HashSet<ConnectionId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for a user.
    ///
    /// Returns true iff the user transitioned offline -> online, i.e. the
    /// connection set was empty before this call.
    pub fn register(
        &self,
        user_id: i64,
        connection_id: ConnectionId,
        sender: mpsc::UnboundedSender<ServerEvent>,
    ) -> bool {
        self.connections
            .insert(connection_id, ConnectionEntry { user_id, sender });

        let mut set = self.user_connections.entry(user_id).or_default();
        let came_online = set.is_empty();
        set.insert(connection_id);

        tracing::debug!(user_id, connection_id = %connection_id, came_online, "Connection registered");
        came_online
    }

    /// Remove a connection. Unknown IDs are a no-op (idempotent).
    pub fn unregister(&self, connection_id: ConnectionId) -> Option<Disconnected> {
        let (_, entry) = self.connections.remove(&connection_id)?;

        let went_offline = {
            let mut set = self.user_connections.entry(entry.user_id).or_default();
            set.remove(&connection_id);
            set.is_empty()
        };
        if went_offline {
            self.user_connections
                .remove_if(&entry.user_id, |_, set| set.is_empty());
        }

        tracing::debug!(
            user_id = entry.user_id,
            connection_id = %connection_id,
            went_offline,
            "Connection unregistered"
        );

        Some(Disconnected {
            user_id: entry.user_id,
            went_offline,
        })
    }

    /// All live connection IDs for a user.
    pub fn connections_for_user(&self, user_id: i64) -> Vec<ConnectionId> {
        self.user_connections
            .get(&user_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// A user is online iff it owns at least one live connection.
    pub fn is_online(&self, user_id: i64) -> bool {
        self.user_connections
            .get(&user_id)
            .map(|set| !set.is_empty())
            .unwrap_or(false)
    }

    /// Best-effort delivery to one connection. A connection racing with its
    /// own teardown is simply skipped, never an error.
    pub fn send_to(&self, connection_id: ConnectionId, event: ServerEvent) {
        if let Some(entry) = self.connections.get(&connection_id) {
            let _ = entry.sender.send(event);
        }
    }

    /// Best-effort delivery to every live connection.
    pub fn broadcast(&self, event: ServerEvent) {
        for entry in self.connections.iter() {
            let _ = entry.sender.send(event.clone());
        }
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> mpsc::UnboundedSender<ServerEvent> {
        let (tx, _rx) = mpsc::unbounded_channel();
        tx
    }

    #[test]
    fn user_is_online_iff_it_owns_a_connection() {
        let registry = ConnectionRegistry::new();
        assert!(!registry.is_online(1));

        let conn = Uuid::new_v4();
        assert!(registry.register(1, conn, sender()));
        assert!(registry.is_online(1));
        assert_eq!(registry.connections_for_user(1), vec![conn]);

        let result = registry.unregister(conn).unwrap();
        assert!(result.went_offline);
        assert!(!registry.is_online(1));
        assert!(registry.connections_for_user(1).is_empty());
    }

    #[test]
    fn second_connection_does_not_come_online_again() {
        let registry = ConnectionRegistry::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        assert!(registry.register(1, first, sender()));
        assert!(!registry.register(1, second, sender()));

        // Closing one of two connections keeps the user online.
        let result = registry.unregister(first).unwrap();
        assert!(!result.went_offline);
        assert!(registry.is_online(1));

        let result = registry.unregister(second).unwrap();
        assert!(result.went_offline);
        assert!(!registry.is_online(1));
    }

    #[test]
    fn unregister_unknown_connection_is_noop() {
        let registry = ConnectionRegistry::new();
        assert_eq!(registry.unregister(Uuid::new_v4()), None);
    }

    #[test]
    fn send_to_delivers_to_the_right_connection() {
        let registry = ConnectionRegistry::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let conn_a = Uuid::new_v4();
        let conn_b = Uuid::new_v4();
        registry.register(1, conn_a, tx_a);
        registry.register(2, conn_b, tx_b);

        registry.send_to(conn_a, ServerEvent::user_online(9));

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }
}
