use axum::extract::ws::Message;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::RwLock;
use uuid::Uuid;

pub mod events;
pub mod handlers;
pub mod message_types;

struct Connection {
    user_id: Uuid,
    tx: UnboundedSender<Message>,
    rooms: HashSet<Uuid>,
}

#[derive(Default)]
struct RegistryInner {
    connections: HashMap<Uuid, Connection>,
    // chat_id -> connection ids joined to that room
    rooms: HashMap<Uuid, HashSet<Uuid>>,
}

/// In-memory index of live connections: connection -> user and
/// room -> connections. Owned by `AppState` and injected where needed;
/// holds no durable state and is rebuilt empty on restart (clients
/// reconnect and backfill over the history API).
#[derive(Default, Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an authenticated connection; the returned receiver is the
    /// connection's outbound channel.
    pub async fn register(&self, conn_id: Uuid, user_id: Uuid) -> UnboundedReceiver<Message> {
        let (tx, rx) = unbounded_channel();
        let mut guard = self.inner.write().await;
        guard.connections.insert(
            conn_id,
            Connection {
                user_id,
                tx,
                rooms: HashSet::new(),
            },
        );
        rx
    }

    /// Bind a connection to a chat room. No-op if the connection is gone.
    pub async fn join(&self, conn_id: Uuid, chat_id: Uuid) {
        let mut guard = self.inner.write().await;
        if let Some(conn) = guard.connections.get_mut(&conn_id) {
            conn.rooms.insert(chat_id);
            guard.rooms.entry(chat_id).or_default().insert(conn_id);
        }
    }

    pub async fn leave(&self, conn_id: Uuid, chat_id: Uuid) {
        let mut guard = self.inner.write().await;
        if let Some(conn) = guard.connections.get_mut(&conn_id) {
            conn.rooms.remove(&chat_id);
        }
        if let Some(room) = guard.rooms.get_mut(&chat_id) {
            room.remove(&conn_id);
            if room.is_empty() {
                guard.rooms.remove(&chat_id);
            }
        }
    }

    /// Remove a connection from every room and drop its channel.
    pub async fn disconnect(&self, conn_id: Uuid) {
        let mut guard = self.inner.write().await;
        if let Some(conn) = guard.connections.remove(&conn_id) {
            for chat_id in conn.rooms {
                if let Some(room) = guard.rooms.get_mut(&chat_id) {
                    room.remove(&conn_id);
                    if room.is_empty() {
                        guard.rooms.remove(&chat_id);
                    }
                }
            }
        }
    }

    /// Send to one connection (error acks).
    pub async fn send_to(&self, conn_id: Uuid, msg: Message) {
        let guard = self.inner.read().await;
        if let Some(conn) = guard.connections.get(&conn_id) {
            let _ = conn.tx.send(msg);
        }
    }

    /// Fan a message out to every connection in the room.
    pub async fn broadcast(&self, chat_id: Uuid, msg: Message) {
        self.broadcast_filtered(chat_id, None, msg).await
    }

    /// Fan out to the room excluding one connection (typing relays).
    pub async fn broadcast_except(&self, chat_id: Uuid, except: Uuid, msg: Message) {
        self.broadcast_filtered(chat_id, Some(except), msg).await
    }

    async fn broadcast_filtered(&self, chat_id: Uuid, except: Option<Uuid>, msg: Message) {
        let guard = self.inner.read().await;
        if let Some(room) = guard.rooms.get(&chat_id) {
            for conn_id in room {
                if Some(*conn_id) == except {
                    continue;
                }
                if let Some(conn) = guard.connections.get(conn_id) {
                    // A closed receiver means the connection task is
                    // tearing down; disconnect() will clean the maps.
                    let _ = conn.tx.send(msg.clone());
                }
            }
        }
    }

    pub async fn user_of(&self, conn_id: Uuid) -> Option<Uuid> {
        let guard = self.inner.read().await;
        guard.connections.get(&conn_id).map(|c| c.user_id)
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }

    pub async fn room_size(&self, chat_id: Uuid) -> usize {
        self.inner
            .read()
            .await
            .rooms
            .get(&chat_id)
            .map(|r| r.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Message {
        Message::Text(s.to_string())
    }

    #[tokio::test]
    async fn join_and_broadcast_reaches_all_room_members() {
        let registry = ConnectionRegistry::new();
        let chat = Uuid::new_v4();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        let mut rx_a = registry.register(a, Uuid::new_v4()).await;
        let mut rx_b = registry.register(b, Uuid::new_v4()).await;
        registry.join(a, chat).await;
        registry.join(b, chat).await;

        registry.broadcast(chat, text("hello")).await;

        assert!(matches!(rx_a.recv().await, Some(Message::Text(t)) if t == "hello"));
        assert!(matches!(rx_b.recv().await, Some(Message::Text(t)) if t == "hello"));
    }

    #[tokio::test]
    async fn broadcast_except_skips_the_sender() {
        let registry = ConnectionRegistry::new();
        let chat = Uuid::new_v4();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        let mut rx_a = registry.register(a, Uuid::new_v4()).await;
        let mut rx_b = registry.register(b, Uuid::new_v4()).await;
        registry.join(a, chat).await;
        registry.join(b, chat).await;

        registry.broadcast_except(chat, a, text("typing")).await;

        assert!(matches!(rx_b.recv().await, Some(Message::Text(t)) if t == "typing"));
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn leave_stops_delivery() {
        let registry = ConnectionRegistry::new();
        let chat = Uuid::new_v4();
        let a = Uuid::new_v4();

        let mut rx_a = registry.register(a, Uuid::new_v4()).await;
        registry.join(a, chat).await;
        registry.leave(a, chat).await;

        registry.broadcast(chat, text("after-leave")).await;
        assert!(rx_a.try_recv().is_err());
        assert_eq!(registry.room_size(chat).await, 0);
    }

    #[tokio::test]
    async fn disconnect_clears_every_room() {
        let registry = ConnectionRegistry::new();
        let (chat1, chat2) = (Uuid::new_v4(), Uuid::new_v4());
        let a = Uuid::new_v4();

        let _rx = registry.register(a, Uuid::new_v4()).await;
        registry.join(a, chat1).await;
        registry.join(a, chat2).await;
        registry.disconnect(a).await;

        assert_eq!(registry.connection_count().await, 0);
        assert_eq!(registry.room_size(chat1).await, 0);
        assert_eq!(registry.room_size(chat2).await, 0);
        assert!(registry.user_of(a).await.is_none());
    }

    #[tokio::test]
    async fn a_user_can_hold_multiple_connections_in_one_room() {
        let registry = ConnectionRegistry::new();
        let chat = Uuid::new_v4();
        let user = Uuid::new_v4();
        let (c1, c2) = (Uuid::new_v4(), Uuid::new_v4());

        let mut rx1 = registry.register(c1, user).await;
        let mut rx2 = registry.register(c2, user).await;
        registry.join(c1, chat).await;
        registry.join(c2, chat).await;

        registry.broadcast(chat, text("both")).await;

        assert!(rx1.recv().await.is_some());
        assert!(rx2.recv().await.is_some());
    }
}
