//! Gateway service: orchestrates registries, publications, methods and views.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::domain::{
    ChannelEvent, ChannelSender, ChannelToken, Connection, ConnectionRegistry, DdpPush, EventBus,
    Subscription, SubscriptionRegistry, UserRef,
};
use crate::error::GatewayError;
use crate::method::{MethodOutcome, MethodRegistry};
use crate::persistence::PostgresPersistence;
use crate::publication::{PublicationRegistry, PublicationRunner};
use crate::view::{GetUrlOutcome, RouteTable, ViewRouter};

/// Server configuration injected at startup: what clients can subscribe
/// to, call and navigate to.
#[derive(Debug, Default)]
pub struct Collaborators {
    /// Named publications.
    pub publications: PublicationRegistry,
    /// Named remote methods.
    pub methods: MethodRegistry,
    /// Ordered route table.
    pub routes: RouteTable,
}

/// Names of everything registered, as exposed by the catalog endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    /// Publication names, sorted.
    pub publications: Vec<String>,
    /// Method names, sorted.
    pub methods: Vec<String>,
    /// Route names, in declared order.
    pub routes: Vec<String>,
}

/// Orchestration layer shared by every session.
///
/// Owns the connection and subscription registries and coordinates the
/// publication runner, method registry and view router. Every operation
/// keyed by a channel is safe to call after that channel disconnected.
#[derive(Debug)]
pub struct GatewayService {
    connections: Arc<ConnectionRegistry>,
    subscriptions: Arc<SubscriptionRegistry>,
    runner: Arc<PublicationRunner>,
    methods: Arc<MethodRegistry>,
    views: ViewRouter,
    event_bus: EventBus,
    persistence: Option<PostgresPersistence>,
    call_timeout: Duration,
}

impl GatewayService {
    /// Creates a new `GatewayService`.
    #[must_use]
    pub fn new(collaborators: Collaborators, event_bus: EventBus, call_timeout: Duration) -> Self {
        let connections = Arc::new(ConnectionRegistry::new());
        let subscriptions = Arc::new(SubscriptionRegistry::new());
        let runner = Arc::new(PublicationRunner::new(
            Arc::new(collaborators.publications),
            Arc::clone(&connections),
            Arc::clone(&subscriptions),
            call_timeout,
        ));
        Self {
            connections,
            subscriptions,
            runner,
            methods: Arc::new(collaborators.methods),
            views: ViewRouter::new(Arc::new(collaborators.routes)),
            event_bus,
            persistence: None,
            call_timeout,
        }
    }

    /// Mirrors connection and subscription rows to PostgreSQL.
    #[must_use]
    pub fn with_persistence(mut self, persistence: PostgresPersistence) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Returns the connection registry.
    #[must_use]
    pub fn connections(&self) -> &Arc<ConnectionRegistry> {
        &self.connections
    }

    /// Returns the subscription registry.
    #[must_use]
    pub fn subscriptions(&self) -> &Arc<SubscriptionRegistry> {
        &self.subscriptions
    }

    /// Returns the publication runner.
    #[must_use]
    pub fn runner(&self) -> &Arc<PublicationRunner> {
        &self.runner
    }

    /// Returns the view router.
    #[must_use]
    pub fn views(&self) -> &ViewRouter {
        &self.views
    }

    /// Returns the data-change bus.
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Starts the background task applying data changes to subscriptions.
    pub fn spawn_runner(&self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(Arc::clone(&self.runner).run(self.event_bus.subscribe()))
    }

    /// Lists everything clients can reach.
    #[must_use]
    pub fn catalog(&self) -> Catalog {
        Catalog {
            publications: self.runner.publications().names(),
            methods: self.methods.names(),
            routes: self.views.routes().names(),
        }
    }

    /// Registers a live connection for `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ChannelExists`] if the channel is already
    /// registered.
    pub async fn connect(
        &self,
        channel: ChannelToken,
        user: Option<UserRef>,
        sender: ChannelSender,
    ) -> Result<Connection, GatewayError> {
        let connection = Connection::new(channel, user);
        self.connections.insert(connection.clone(), sender).await?;

        if let Some(db) = &self.persistence
            && let Err(err) = db.save_connection(&connection).await
        {
            tracing::warn!(%channel, error = %err, "failed to persist connection");
        }

        tracing::info!(%channel, user = ?connection.user, "client connected");
        Ok(connection)
    }

    /// Removes the connection for `channel`, its subscriptions and its
    /// view. Returns `false` if the channel was already gone.
    pub async fn disconnect(&self, channel: ChannelToken) -> bool {
        let removed = self.connections.remove(channel).await;

        let subs = self.subscriptions.remove_for_channel(channel).await;
        for sub in &subs {
            self.runner.stop(sub.id).await;
        }
        self.views.teardown(channel).await;

        if removed.is_none() {
            return false;
        }

        if let Some(db) = &self.persistence
            && let Err(err) = db.delete_connection(*channel.as_uuid()).await
        {
            tracing::warn!(%channel, error = %err, "failed to delete persisted connection");
        }

        tracing::info!(%channel, subscriptions = subs.len(), "client disconnected");
        true
    }

    /// Subscribes `channel` to `publication` on behalf of `parent` and runs
    /// the initial scan.
    ///
    /// Repeating the same (channel, publication, parent) returns the live
    /// subscription without scanning again.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ClientNotFound`] if the channel has no live
    /// connection, [`GatewayError::PublicationNotFound`] for an unknown
    /// publication, or the initial fetch failure.
    pub async fn subscribe(
        &self,
        channel: ChannelToken,
        publication: &str,
        parent: &str,
    ) -> Result<Subscription, GatewayError> {
        if !self.connections.contains(channel).await {
            return Err(GatewayError::ClientNotFound(channel));
        }
        if !self.runner.publications().contains(publication) {
            return Err(GatewayError::PublicationNotFound(publication.to_string()));
        }

        let (sub, created) = self
            .subscriptions
            .get_or_create(channel, publication, parent)
            .await;
        if !created {
            tracing::debug!(%channel, sub_id = %sub.id, publication, parent, "already subscribed");
            return Ok(sub);
        }
        if let Err(err) = self.runner.start(&sub).await {
            self.subscriptions.remove(sub.id).await;
            tracing::warn!(%channel, publication, error = %err, "subscription start failed");
            return Err(err);
        }

        if let Some(db) = &self.persistence
            && let Err(err) = db.save_subscription(&sub).await
        {
            tracing::warn!(sub_id = %sub.id, error = %err, "failed to persist subscription");
        }

        tracing::info!(%channel, sub_id = %sub.id, publication, parent, "subscribed");
        Ok(sub)
    }

    /// Removes the subscriptions of `channel` to `publication` (narrowed to
    /// `parent` when given) and stops their pushes.
    pub async fn unsubscribe(
        &self,
        channel: ChannelToken,
        publication: &str,
        parent: Option<&str>,
    ) -> Vec<Subscription> {
        let removed = self
            .subscriptions
            .remove_matching(channel, publication, parent)
            .await;
        for sub in &removed {
            self.runner.stop(sub.id).await;
        }

        if let Some(db) = &self.persistence {
            let ids: Vec<i64> = removed
                .iter()
                .filter_map(|s| i64::try_from(s.id.get()).ok())
                .collect();
            if let Err(err) = db.delete_subscriptions(&ids).await {
                tracing::warn!(%channel, error = %err, "failed to delete persisted subscriptions");
            }
        }

        tracing::info!(%channel, publication, removed = removed.len(), "unsubscribed");
        removed
    }

    /// Invokes the method registered as `name`.
    ///
    /// The method is looked up before `params` is inspected, so an unknown
    /// method is reported even when the argument is missing.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::MethodNotFound`], [`GatewayError::MissingField`]
    /// when `params` is absent, or [`GatewayError::Timeout`].
    pub async fn call_method(
        &self,
        name: &str,
        params: Option<Value>,
    ) -> Result<MethodOutcome, GatewayError> {
        let handler = self
            .methods
            .get(name)
            .ok_or_else(|| GatewayError::MethodNotFound(name.to_string()))?;
        let params = params.ok_or(GatewayError::MissingField("params"))?;

        let outcome = tokio::time::timeout(self.call_timeout, handler.call(params))
            .await
            .map_err(|_| GatewayError::Timeout(format!("method {name}")))?;
        tracing::debug!(method = name, success = outcome.is_success(), "method called");
        Ok(outcome)
    }

    /// Resolves a `geturl` request for `channel`.
    pub async fn get_url(&self, channel: ChannelToken, path: &str) -> Option<GetUrlOutcome> {
        self.views.get_url(channel, path).await
    }

    /// Delivers a `handle.ddp` event to `channel` from outside a session.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ClientNotFound`] if the channel is not live.
    pub async fn push(&self, channel: ChannelToken, push: DdpPush) -> Result<(), GatewayError> {
        if self
            .connections
            .push(channel, ChannelEvent::HandleDdp(push))
            .await
        {
            Ok(())
        } else {
            Err(GatewayError::ClientNotFound(channel))
        }
    }

    /// Writes `envelope` to the socket of `channel` unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ClientNotFound`] if the channel is not live.
    pub async fn send(&self, channel: ChannelToken, envelope: Value) -> Result<(), GatewayError> {
        if self
            .connections
            .push(channel, ChannelEvent::Send(envelope))
            .await
        {
            Ok(())
        } else {
            Err(GatewayError::ClientNotFound(channel))
        }
    }

    /// Announces that the data behind `publication` changed.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PublicationNotFound`] for an unknown name.
    pub fn notify_change(&self, publication: &str) -> Result<usize, GatewayError> {
        if !self.runner.publications().contains(publication) {
            return Err(GatewayError::PublicationNotFound(publication.to_string()));
        }
        Ok(self.event_bus.notify(publication))
    }
}
