//! Session manager - connections and room membership
//!
//! Bookkeeping is scoped to the gateway instance and released explicitly
//! on disconnect.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use log::{debug, info};
use uuid::Uuid;

use super::connection::ClientConnection;

pub struct SessionManager {
    /// Active connections by connection id
    connections: DashMap<Uuid, ClientConnection>,
    /// Room name -> member connection ids
    rooms: DashMap<String, HashSet<Uuid>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            rooms: DashMap::new(),
        }
    }

    /// Register an authenticated connection
    pub fn register(&self, connection: ClientConnection) -> Uuid {
        let id = connection.id;
        info!("Session registered: conn={} user={}", id, connection.user_id);
        self.connections.insert(id, connection);
        id
    }

    /// Drop a connection and leave every room it occupied
    pub fn unregister(&self, id: Uuid) {
        if self.connections.remove(&id).is_some() {
            info!("Session unregistered: conn={}", id);
        }
        self.rooms.retain(|_, members| {
            members.remove(&id);
            !members.is_empty()
        });
    }

    /// Join a connection to a room
    pub fn join(&self, id: Uuid, room: &str) {
        self.rooms.entry(room.to_string()).or_default().insert(id);
        debug!("conn={} joined room '{}'", id, room);
    }

    /// Leave a room; leaving a room the connection does not occupy is a no-op
    pub fn leave(&self, id: Uuid, room: &str) {
        if let Some(mut members) = self.rooms.get_mut(room) {
            members.remove(&id);
        }
        debug!("conn={} left room '{}'", id, room);
    }

    pub fn is_member(&self, id: Uuid, room: &str) -> bool {
        self.rooms
            .get(room)
            .map(|members| members.contains(&id))
            .unwrap_or(false)
    }

    /// Push a frame to one connection
    pub fn send_to(&self, id: Uuid, frame: String) -> Result<(), String> {
        match self.connections.get(&id) {
            Some(conn) => conn.send(frame),
            None => Err(format!("Connection not registered: {}", id)),
        }
    }

    /// Deliver a frame to every member of a room
    pub fn send_to_room(&self, room: &str, frame: &str) {
        let members: Vec<Uuid> = match self.rooms.get(room) {
            Some(members) => members.iter().copied().collect(),
            None => return,
        };
        for id in members {
            if let Some(conn) = self.connections.get(&id) {
                if conn.send(frame.to_string()).is_err() {
                    debug!("Dropping frame for closing conn={}", id);
                }
            }
        }
    }

    /// Deliver a frame to every connected client
    pub fn broadcast_all(&self, frame: &str) {
        for conn in self.connections.iter() {
            let _ = conn.send(frame.to_string());
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn room_size(&self, room: &str) -> usize {
        self.rooms.get(room).map(|members| members.len()).unwrap_or(0)
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe session manager
pub type SharedSessionManager = Arc<SessionManager>;

pub fn create_session_manager() -> SharedSessionManager {
    Arc::new(SessionManager::new())
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::auth::{AuthContext, Role};

    fn connect(user: &str) -> (ClientConnection, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let ctx = AuthContext {
            user_id: user.to_string(),
            email: format!("{}@example.com", user),
            role: Role::Customer,
            entity_id: Some("ent-1".to_string()),
            branch_id: None,
        };
        (ClientConnection::new(&ctx, tx), rx)
    }

    #[test]
    fn join_leave_and_membership() {
        let sessions = SessionManager::new();
        let (conn, _rx) = connect("u1");
        let id = sessions.register(conn);

        sessions.join(id, "entity:ent-1");
        assert!(sessions.is_member(id, "entity:ent-1"));
        assert_eq!(sessions.room_size("entity:ent-1"), 1);

        sessions.leave(id, "entity:ent-1");
        assert!(!sessions.is_member(id, "entity:ent-1"));

        // leaving an unoccupied room is a no-op
        sessions.leave(id, "branch:nowhere");
    }

    #[test]
    fn unregister_releases_all_rooms() {
        let sessions = SessionManager::new();
        let (conn, _rx) = connect("u1");
        let id = sessions.register(conn);
        sessions.join(id, "entity:ent-1");
        sessions.join(id, "user:u1");

        sessions.unregister(id);
        assert_eq!(sessions.connection_count(), 0);
        assert_eq!(sessions.room_size("entity:ent-1"), 0);
        assert_eq!(sessions.room_size("user:u1"), 0);
    }

    #[test]
    fn room_delivery_reaches_members_only() {
        let sessions = SessionManager::new();
        let (conn_a, mut rx_a) = connect("a");
        let (conn_b, mut rx_b) = connect("b");
        let id_a = sessions.register(conn_a);
        let _id_b = sessions.register(conn_b);

        sessions.join(id_a, "branch:br-1");
        sessions.send_to_room("branch:br-1", "hello");

        assert_eq!(rx_a.try_recv().unwrap(), "hello");
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn broadcast_reaches_everyone() {
        let sessions = SessionManager::new();
        let (conn_a, mut rx_a) = connect("a");
        let (conn_b, mut rx_b) = connect("b");
        sessions.register(conn_a);
        sessions.register(conn_b);

        sessions.broadcast_all("ping");
        assert_eq!(rx_a.try_recv().unwrap(), "ping");
        assert_eq!(rx_b.try_recv().unwrap(), "ping");
    }
}
