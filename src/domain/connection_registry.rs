//! Concurrent storage of live connections and their push senders.
//!
//! [`ConnectionRegistry`] maps each [`ChannelToken`] to its [`Connection`]
//! row and the sender half of the session's event channel. Pushes are
//! addressed through [`ConnectionRegistry::push`]; an address with no live
//! connection silently drops the event.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{RwLock, mpsc};
use utoipa::ToSchema;

use super::{ChannelEvent, ChannelToken, UserRef};
use crate::error::GatewayError;

/// One live transport session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Connection {
    /// Channel token of the session.
    pub channel: ChannelToken,
    /// Owning user, `None` for anonymous connections.
    pub user: Option<UserRef>,
    /// Handshake timestamp.
    pub created_at: DateTime<Utc>,
}

impl Connection {
    /// Creates a connection row stamped with the current time.
    #[must_use]
    pub fn new(channel: ChannelToken, user: Option<UserRef>) -> Self {
        Self {
            channel,
            user,
            created_at: Utc::now(),
        }
    }
}

/// Sender half of a session's event channel.
pub type ChannelSender = mpsc::UnboundedSender<ChannelEvent>;

#[derive(Debug)]
struct ConnectionEntry {
    connection: Connection,
    sender: ChannelSender,
}

/// Central store for all live connections.
///
/// # Concurrency
///
/// - Lookups and pushes take the read lock and never block each other.
/// - Inserts and removals take the write lock.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ChannelToken, ConnectionEntry>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection together with its push sender.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ChannelExists`] if the channel is already
    /// registered.
    pub async fn insert(
        &self,
        connection: Connection,
        sender: ChannelSender,
    ) -> Result<(), GatewayError> {
        let channel = connection.channel;
        let mut map = self.connections.write().await;
        if map.contains_key(&channel) {
            return Err(GatewayError::ChannelExists(channel));
        }
        map.insert(channel, ConnectionEntry { connection, sender });
        Ok(())
    }

    /// Returns `true` if `channel` has a live connection.
    pub async fn contains(&self, channel: ChannelToken) -> bool {
        self.connections.read().await.contains_key(&channel)
    }

    /// Removes the connection for `channel`. Removing an absent channel is
    /// a no-op returning `None`.
    pub async fn remove(&self, channel: ChannelToken) -> Option<Connection> {
        let mut map = self.connections.write().await;
        map.remove(&channel).map(|entry| entry.connection)
    }

    /// Delivers an event to the session owning `channel`.
    ///
    /// Returns `false` when the channel is gone or its session stopped
    /// reading; the event is dropped in both cases.
    pub async fn push(&self, channel: ChannelToken, event: ChannelEvent) -> bool {
        let map = self.connections.read().await;
        let Some(entry) = map.get(&channel) else {
            tracing::debug!(%channel, event = event.name(), "push to unknown channel dropped");
            return false;
        };
        if entry.sender.send(event).is_err() {
            tracing::debug!(%channel, "push to closed session dropped");
            return false;
        }
        true
    }

    /// Returns all live connections, oldest first.
    pub async fn list(&self) -> Vec<Connection> {
        let map = self.connections.read().await;
        let mut rows: Vec<Connection> = map.values().map(|e| e.connection.clone()).collect();
        rows.sort_by_key(|c| c.created_at);
        rows
    }

    /// Returns the number of live connections.
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Returns `true` if no connection is live.
    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::DdpPush;

    fn removed_push() -> ChannelEvent {
        ChannelEvent::HandleDdp(DdpPush::Removed {
            id: "1".to_string(),
            parent: "root".to_string(),
        })
    }

    #[tokio::test]
    async fn insert_and_list() {
        let registry = ConnectionRegistry::new();
        let channel = ChannelToken::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let result = registry
            .insert(Connection::new(channel, Some(UserRef::new("bob"))), tx)
            .await;
        assert!(result.is_ok());

        let live = registry.list().await;
        let Some(conn) = live.first() else {
            panic!("connection should be live");
        };
        assert_eq!(conn.channel, channel);
        assert_eq!(conn.user, Some(UserRef::new("bob")));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn duplicate_channel_is_rejected() {
        let registry = ConnectionRegistry::new();
        let channel = ChannelToken::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let _ = registry.insert(Connection::new(channel, None), tx.clone()).await;
        let second = registry.insert(Connection::new(channel, None), tx).await;
        assert!(matches!(second, Err(GatewayError::ChannelExists(_))));
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let channel = ChannelToken::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let _ = registry.insert(Connection::new(channel, None), tx).await;

        assert!(registry.remove(channel).await.is_some());
        assert!(registry.remove(channel).await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn push_reaches_session() {
        let registry = ConnectionRegistry::new();
        let channel = ChannelToken::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _ = registry.insert(Connection::new(channel, None), tx).await;

        assert!(registry.push(channel, removed_push()).await);
        assert_eq!(rx.recv().await, Some(removed_push()));
    }

    #[tokio::test]
    async fn push_to_removed_channel_is_dropped() {
        let registry = ConnectionRegistry::new();
        let channel = ChannelToken::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let _ = registry.insert(Connection::new(channel, None), tx).await;
        let _ = registry.remove(channel).await;

        assert!(!registry.push(channel, removed_push()).await);
    }

    #[tokio::test]
    async fn push_after_session_stopped_reading() {
        let registry = ConnectionRegistry::new();
        let channel = ChannelToken::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = registry.insert(Connection::new(channel, None), tx).await;
        drop(rx);

        assert!(!registry.push(channel, removed_push()).await);
    }
}
