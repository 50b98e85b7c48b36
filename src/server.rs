//! Server assembly: collaborators, shared state and the Axum router.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::AppState;
use crate::config::GatewayConfig;
use crate::demo::{self, TaskStore};
use crate::domain::EventBus;
use crate::error::GatewayError;
use crate::persistence::PostgresPersistence;
use crate::service::{Collaborators, GatewayService};
use crate::session::handler::ws_handler;
use crate::session::identity;

/// Builds the shared state for `config`.
///
/// Registers the demo collaborators when enabled and attaches the
/// persistence mirror when one is given.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] if a route or the identity
/// header is invalid.
pub fn build_state(
    config: &GatewayConfig,
    persistence: Option<PostgresPersistence>,
) -> Result<AppState, GatewayError> {
    let event_bus = EventBus::new(config.event_bus_capacity);

    let collaborators = if config.demo_enabled {
        let store = Arc::new(TaskStore::new(event_bus.clone()));
        demo::collaborators(&store)?
    } else {
        Collaborators::default()
    };

    let mut service = GatewayService::new(collaborators, event_bus, config.call_timeout);
    if let Some(db) = persistence {
        service = service.with_persistence(db);
    }

    Ok(AppState {
        service: Arc::new(service),
        identity: Arc::from(identity::from_config(config)?),
    })
}

/// Builds the router: REST API, the WebSocket endpoint and the HTTP layers.
pub fn build_app(state: AppState, config: &GatewayConfig) -> Router {
    let layers = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(config.request_timeout));

    Router::new()
        .merge(api::build_router())
        .route(&config.ws_path, get(ws_handler))
        .layer(layers)
        .with_state(state)
}
