//! Server-side views and the route table that selects them.
//!
//! Every connection holds at most one live [`View`]. A `geturl` request is
//! matched against the [`RouteTable`] in declared order; the [`ViewRouter`]
//! either navigates the live view in place or replaces it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use tokio::sync::Mutex;

use crate::domain::ChannelToken;
use crate::error::GatewayError;

/// Stateful page object bound to one connection.
#[async_trait]
pub trait View: Send + Sync {
    /// Called once after construction with the requested path.
    async fn on_create(&mut self, path: &str);

    /// In-place navigation to another path of the same route. Returning
    /// `false` rejects the navigation and no response is sent.
    async fn on_url(&mut self, path: &str) -> bool;

    /// Renders the view to markup.
    async fn render(&self) -> String;

    /// Called before the view is dropped.
    async fn on_destroy(&mut self) {}
}

/// Builds a view for a channel.
pub type ViewFactory = Arc<dyn Fn(ChannelToken) -> Box<dyn View> + Send + Sync>;

/// One entry of the route table.
#[derive(Clone)]
pub struct Route {
    name: String,
    pattern: Regex,
    factory: ViewFactory,
}

impl Route {
    /// Compiles `pattern` into a route named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if the pattern does not
    /// compile.
    pub fn new(
        name: impl Into<String>,
        pattern: &str,
        factory: ViewFactory,
    ) -> Result<Self, GatewayError> {
        let pattern = Regex::new(pattern)
            .map_err(|e| GatewayError::InvalidRequest(format!("route pattern {pattern}: {e}")))?;
        Ok(Self {
            name: name.into(),
            pattern,
            factory,
        })
    }

    /// Route name; two views share a route when their names are equal.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if the pattern matches at the start of `path`.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        self.pattern.find(path).is_some_and(|m| m.start() == 0)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("pattern", &self.pattern.as_str())
            .finish_non_exhaustive()
    }
}

/// Ordered list of routes; the first match wins.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a route built from a closure.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if the pattern does not
    /// compile or the name is already taken.
    pub fn route<F>(mut self, name: &str, pattern: &str, factory: F) -> Result<Self, GatewayError>
    where
        F: Fn(ChannelToken) -> Box<dyn View> + Send + Sync + 'static,
    {
        if self.routes.iter().any(|r| r.name == name) {
            return Err(GatewayError::InvalidRequest(format!(
                "route {name} already declared"
            )));
        }
        self.routes.push(Route::new(name, pattern, Arc::new(factory))?);
        Ok(self)
    }

    /// Returns the first route matching `path`.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.matches(path))
    }

    /// Returns the route names in declared order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.routes.iter().map(|r| r.name.clone()).collect()
    }
}

/// What a `geturl` request produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GetUrlOutcome {
    /// A new view was created; carries its markup.
    Rendered(String),
    /// The live view accepted an in-place navigation.
    Navigated,
}

struct ActiveView {
    route: String,
    view: Box<dyn View>,
}

/// Per-connection view slots, keyed by channel token.
pub struct ViewRouter {
    routes: Arc<RouteTable>,
    views: Mutex<HashMap<ChannelToken, ActiveView>>,
}

impl ViewRouter {
    /// Creates a router over `routes` with no live views.
    #[must_use]
    pub fn new(routes: Arc<RouteTable>) -> Self {
        Self {
            routes,
            views: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the route table.
    #[must_use]
    pub fn routes(&self) -> &Arc<RouteTable> {
        &self.routes
    }

    /// Resolves `path` for `channel`.
    ///
    /// Returns `None` when nothing should be sent back: no route matched,
    /// or the live view rejected an in-place navigation.
    pub async fn get_url(&self, channel: ChannelToken, path: &str) -> Option<GetUrlOutcome> {
        let Some(route) = self.routes.match_path(path) else {
            tracing::debug!(%channel, path, "no route matched");
            return None;
        };

        let current = self.views.lock().await.remove(&channel);
        match current {
            Some(mut active) if active.route == route.name => {
                let accepted = active.view.on_url(path).await;
                self.views.lock().await.insert(channel, active);
                tracing::debug!(%channel, path, accepted, "view navigated in place");
                accepted.then_some(GetUrlOutcome::Navigated)
            }
            previous => {
                if let Some(mut old) = previous {
                    old.view.on_destroy().await;
                    tracing::debug!(%channel, route = %old.route, "view destroyed");
                }
                let mut view = (route.factory)(channel);
                view.on_create(path).await;
                let markup = view.render().await;
                self.views.lock().await.insert(
                    channel,
                    ActiveView {
                        route: route.name.clone(),
                        view,
                    },
                );
                tracing::debug!(%channel, route = %route.name, "view created");
                Some(GetUrlOutcome::Rendered(markup))
            }
        }
    }

    /// Destroys the live view of `channel`, if any.
    pub async fn teardown(&self, channel: ChannelToken) -> bool {
        let active = self.views.lock().await.remove(&channel);
        match active {
            Some(mut active) => {
                active.view.on_destroy().await;
                true
            }
            None => false,
        }
    }

    /// Returns the route name of the live view of `channel`.
    pub async fn current_route(&self, channel: ChannelToken) -> Option<String> {
        self.views
            .lock()
            .await
            .get(&channel)
            .map(|active| active.route.clone())
    }
}

impl fmt::Debug for ViewRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewRouter")
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}


#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::testing::{Counters, table};
    use super::*;

    fn router() -> (ViewRouter, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let Ok(routes) = table(&counters) else {
            panic!("route table should build");
        };
        (ViewRouter::new(Arc::new(routes)), counters)
    }

    #[test]
    fn match_is_anchored_at_start() {
        let counters = Arc::new(Counters::default());
        let Ok(routes) = table(&counters) else {
            panic!("route table should build");
        };
        assert_eq!(routes.match_path("/items/3").map(Route::name), Some("item"));
        assert!(routes.match_path("/shop/items/3").is_none());
        assert_eq!(routes.names(), vec!["home".to_string(), "item".to_string()]);
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let result = RouteTable::new().route("bad", "(", |_| -> Box<dyn View> {
            panic!("factory must not run")
        });
        assert!(matches!(result, Err(GatewayError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn first_visit_renders() {
        let (router, counters) = router();
        let channel = ChannelToken::new();

        let outcome = router.get_url(channel, "/items/1").await;
        assert_eq!(
            outcome,
            Some(GetUrlOutcome::Rendered("<item>/items/1</item>".to_string()))
        );
        assert_eq!(router.current_route(channel).await.as_deref(), Some("item"));
        assert_eq!(counters.created(), 1);
    }

    #[tokio::test]
    async fn same_route_navigates_in_place() {
        let (router, counters) = router();
        let channel = ChannelToken::new();
        let _ = router.get_url(channel, "/items/1").await;

        let outcome = router.get_url(channel, "/items/2").await;
        assert_eq!(outcome, Some(GetUrlOutcome::Navigated));
        assert_eq!(counters.created(), 1);
        assert_eq!(counters.destroyed(), 0);
    }

    #[tokio::test]
    async fn rejected_navigation_is_silent_and_keeps_view() {
        let (router, counters) = router();
        let channel = ChannelToken::new();
        let _ = router.get_url(channel, "/items/1").await;

        assert_eq!(router.get_url(channel, "/items/deny").await, None);
        assert_eq!(router.current_route(channel).await.as_deref(), Some("item"));
        assert_eq!(counters.destroyed(), 0);
    }

    #[tokio::test]
    async fn other_route_replaces_view() {
        let (router, counters) = router();
        let channel = ChannelToken::new();
        let _ = router.get_url(channel, "/items/1").await;

        let outcome = router.get_url(channel, "/").await;
        assert_eq!(outcome, Some(GetUrlOutcome::Rendered("<home>/</home>".to_string())));
        assert_eq!(counters.destroyed(), 1);
        assert_eq!(counters.created(), 2);
    }

    #[tokio::test]
    async fn unmatched_path_is_silent() {
        let (router, _) = router();
        let channel = ChannelToken::new();
        assert_eq!(router.get_url(channel, "/nowhere").await, None);
        assert!(router.current_route(channel).await.is_none());
    }

    #[tokio::test]
    async fn teardown_runs_destroy_hook() {
        let (router, counters) = router();
        let channel = ChannelToken::new();
        let _ = router.get_url(channel, "/").await;

        assert!(router.teardown(channel).await);
        assert!(!router.teardown(channel).await);
        assert_eq!(counters.destroyed(), 1);
    }
}
