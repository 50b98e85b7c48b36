//! Active subscriptions across all connections.
//!
//! A [`Subscription`] links a channel, a publication name and the parent
//! component that asked for the data. Rows are never updated: they are
//! created by `subscribe` and removed by `unsubscribe` or by the cascade
//! that follows a connection's removal.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use utoipa::ToSchema;

use super::ChannelToken;

/// Process-unique subscription identifier, issued in increasing order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Wraps a raw id.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A client's interest in one publication, scoped to one parent component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Subscription {
    /// Generated identifier.
    pub id: SubscriptionId,
    /// Name of the publication.
    pub publication: String,
    /// Owning channel.
    pub channel: ChannelToken,
    /// Component id that requested the data.
    pub parent: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Central store for all active subscriptions.
#[derive(Debug)]
pub struct SubscriptionRegistry {
    subscriptions: RwLock<HashMap<SubscriptionId, Subscription>>,
    next_id: AtomicU64,
}

impl SubscriptionRegistry {
    /// Creates an empty registry. The first issued id is `1`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Returns the subscription of `channel` to `publication` for `parent`,
    /// creating it with a freshly issued id if none exists.
    ///
    /// The flag is `true` when the row was created by this call. At most one
    /// row exists per (channel, publication, parent).
    pub async fn get_or_create(
        &self,
        channel: ChannelToken,
        publication: &str,
        parent: &str,
    ) -> (Subscription, bool) {
        let mut map = self.subscriptions.write().await;
        if let Some(existing) = map.values().find(|s| {
            s.channel == channel && s.publication == publication && s.parent == parent
        }) {
            return (existing.clone(), false);
        }

        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let subscription = Subscription {
            id,
            publication: publication.to_string(),
            channel,
            parent: parent.to_string(),
            created_at: Utc::now(),
        };
        map.insert(id, subscription.clone());
        (subscription, true)
    }

    /// Removes one subscription by id.
    pub async fn remove(&self, id: SubscriptionId) -> Option<Subscription> {
        self.subscriptions.write().await.remove(&id)
    }

    /// Removes the subscriptions of `channel` to `publication`, narrowed to
    /// one parent component when `parent` is given.
    pub async fn remove_matching(
        &self,
        channel: ChannelToken,
        publication: &str,
        parent: Option<&str>,
    ) -> Vec<Subscription> {
        let mut map = self.subscriptions.write().await;
        let ids: Vec<SubscriptionId> = map
            .values()
            .filter(|s| {
                s.channel == channel
                    && s.publication == publication
                    && parent.is_none_or(|p| s.parent == p)
            })
            .map(|s| s.id)
            .collect();
        ids.iter().filter_map(|id| map.remove(id)).collect()
    }

    /// Removes every subscription owned by `channel` (connection cascade).
    pub async fn remove_for_channel(&self, channel: ChannelToken) -> Vec<Subscription> {
        let mut map = self.subscriptions.write().await;
        let ids: Vec<SubscriptionId> = map
            .values()
            .filter(|s| s.channel == channel)
            .map(|s| s.id)
            .collect();
        ids.iter().filter_map(|id| map.remove(id)).collect()
    }

    /// Returns all subscriptions to `publication`, oldest first.
    pub async fn for_publication(&self, publication: &str) -> Vec<Subscription> {
        let map = self.subscriptions.read().await;
        let mut subs: Vec<Subscription> = map
            .values()
            .filter(|s| s.publication == publication)
            .cloned()
            .collect();
        subs.sort_by_key(|s| s.id);
        subs
    }

    /// Returns the number of subscriptions owned by `channel`.
    pub async fn count_for_channel(&self, channel: ChannelToken) -> usize {
        let map = self.subscriptions.read().await;
        map.values().filter(|s| s.channel == channel).count()
    }

    /// Returns the total number of subscriptions.
    pub async fn len(&self) -> usize {
        self.subscriptions.read().await.len()
    }

    /// Returns `true` if there are no subscriptions.
    pub async fn is_empty(&self) -> bool {
        self.subscriptions.read().await.is_empty()
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
