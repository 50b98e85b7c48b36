//! Per-subscription diffing and DDP push emission.
//!
//! Each started subscription owns a snapshot of the records last sent to
//! its channel. A re-scan compares the fresh fetch with the snapshot and
//! pushes the differences. The snapshot lock is held across diff and push,
//! so events for one subscription are delivered in the order they were
//! computed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock, broadcast};

use super::{Publication, PublicationRegistry, Record};
use crate::domain::{
    ChannelEvent, ConnectionRegistry, DataChange, DdpPush, Subscription, SubscriptionId,
    SubscriptionRegistry,
};
use crate::error::GatewayError;

/// Record id → content last pushed to the subscriber.
type Snapshot = IndexMap<String, Value>;

/// Runs publications on behalf of subscriptions.
#[derive(Debug)]
pub struct PublicationRunner {
    publications: Arc<PublicationRegistry>,
    connections: Arc<ConnectionRegistry>,
    subscriptions: Arc<SubscriptionRegistry>,
    snapshots: RwLock<HashMap<SubscriptionId, Arc<Mutex<Snapshot>>>>,
    fetch_timeout: Duration,
}

impl PublicationRunner {
    /// Creates a runner over the shared registries.
    #[must_use]
    pub fn new(
        publications: Arc<PublicationRegistry>,
        connections: Arc<ConnectionRegistry>,
        subscriptions: Arc<SubscriptionRegistry>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            publications,
            connections,
            subscriptions,
            snapshots: RwLock::new(HashMap::new()),
            fetch_timeout,
        }
    }

    /// Returns the publication registry this runner reads from.
    #[must_use]
    pub fn publications(&self) -> &Arc<PublicationRegistry> {
        &self.publications
    }

    /// Performs the initial scan for `sub`: one `inserted` push per
    /// matching record. Returns the number of events emitted.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PublicationNotFound`] for an unknown
    /// publication, or the fetch failure. No snapshot is kept on error.
    pub async fn start(&self, sub: &Subscription) -> Result<usize, GatewayError> {
        let publication = self.publications.get(&sub.publication)?;

        let slot = Arc::new(Mutex::new(Snapshot::new()));
        let mut snapshot = slot.lock().await;
        self.snapshots
            .write()
            .await
            .insert(sub.id, Arc::clone(&slot));

        let records = match self.fetch(publication.as_ref(), &sub.publication).await {
            Ok(records) => records,
            Err(err) => {
                drop(snapshot);
                self.snapshots.write().await.remove(&sub.id);
                return Err(err);
            }
        };

        let emitted = self
            .apply(publication.as_ref(), sub, &mut snapshot, records)
            .await;
        tracing::debug!(sub_id = %sub.id, publication = %sub.publication, emitted, "subscription started");
        Ok(emitted)
    }

    /// Stops pushing for a subscription and drops its snapshot.
    ///
    /// Waits for an in-flight re-scan of that subscription to finish, so no
    /// event for it is emitted after this returns.
    pub async fn stop(&self, id: SubscriptionId) {
        let slot = self.snapshots.write().await.remove(&id);
        if let Some(slot) = slot {
            let _guard = slot.lock().await;
            tracing::debug!(sub_id = %id, "subscription stopped");
        }
    }

    /// Re-fetches `publication` and pushes the differences to each of its
    /// subscriptions. Returns the number of events emitted.
    pub async fn refresh(&self, publication: &str) -> usize {
        let Ok(source) = self.publications.get(publication) else {
            tracing::debug!(publication, "refresh of unknown publication ignored");
            return 0;
        };
        let subs = self.subscriptions.for_publication(publication).await;
        if subs.is_empty() {
            return 0;
        }

        let records = match self.fetch(source.as_ref(), publication).await {
            Ok(records) => records,
            Err(err) => {
                tracing::warn!(publication, error = %err, "publication refresh failed");
                return 0;
            }
        };

        let mut emitted = 0;
        for sub in subs {
            let Some(slot) = self.snapshots.read().await.get(&sub.id).cloned() else {
                continue;
            };
            let mut snapshot = slot.lock().await;
            if !self.is_current(sub.id, &slot).await {
                continue;
            }
            emitted += self
                .apply(source.as_ref(), &sub, &mut snapshot, records.clone())
                .await;
        }
        emitted
    }

    /// Re-scans every registered publication.
    pub async fn refresh_all(&self) -> usize {
        let mut emitted = 0;
        for name in self.publications.names() {
            emitted += self.refresh(&name).await;
        }
        emitted
    }

    /// Consumes data-change notifications until the bus closes.
    pub async fn run(self: Arc<Self>, mut rx: broadcast::Receiver<DataChange>) {
        loop {
            match rx.recv().await {
                Ok(change) => {
                    let emitted = self.refresh(&change.publication).await;
                    tracing::trace!(publication = %change.publication, emitted, "data change applied");
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "publication runner lagged behind event bus");
                    self.refresh_all().await;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        tracing::debug!("publication runner stopped");
    }

    /// Returns the number of subscriptions with a live snapshot.
    pub async fn active_count(&self) -> usize {
        self.snapshots.read().await.len()
    }

    async fn is_current(&self, id: SubscriptionId, slot: &Arc<Mutex<Snapshot>>) -> bool {
        self.snapshots
            .read()
            .await
            .get(&id)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
    }

    async fn fetch(
        &self,
        publication: &dyn Publication,
        name: &str,
    ) -> Result<Vec<Record>, GatewayError> {
        tokio::time::timeout(self.fetch_timeout, publication.fetch())
            .await
            .map_err(|_| GatewayError::Timeout(format!("publication {name}")))?
    }

    /// Diffs `records` against `snapshot`, pushes the differences and
    /// replaces the snapshot. Duplicate ids keep their first occurrence.
    async fn apply(
        &self,
        publication: &dyn Publication,
        sub: &Subscription,
        snapshot: &mut Snapshot,
        records: Vec<Record>,
    ) -> usize {
        let mut next = Snapshot::with_capacity(records.len());
        let mut events = Vec::new();

        for record in records {
            if next.contains_key(&record.id) {
                continue;
            }
            match snapshot.get(&record.id) {
                None => events.push(DdpPush::Inserted {
                    instance: publication.render(&record, &sub.parent),
                }),
                Some(previous) if *previous != record.content => events.push(DdpPush::Changed {
                    instance: publication.render(&record, &sub.parent),
                }),
                Some(_) => {}
            }
            next.insert(record.id, record.content);
        }

        for id in snapshot.keys() {
            if !next.contains_key(id) {
                events.push(DdpPush::Removed {
                    id: id.clone(),
                    parent: sub.parent.clone(),
                });
            }
        }
        *snapshot = next;

        let emitted = events.len();
        for push in events {
            self.connections
                .push(sub.channel, ChannelEvent::HandleDdp(push))
                .await;
        }
        emitted
    }
}
