//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::service::GatewayService;
use crate::session::Identify;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Session orchestration shared by REST and WebSocket handlers.
    pub service: Arc<GatewayService>,
    /// Resolves the user behind a WebSocket upgrade.
    pub identity: Arc<dyn Identify>,
}
