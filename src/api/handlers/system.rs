//! System endpoints: health check and collaborator catalog.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::dto::CatalogResponse;
use crate::app_state::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
    connections: usize,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, live connection count and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            connections: state.service.connections().len().await,
        }),
    )
}

/// `GET /config/catalog` — List registered publications, methods and routes.
#[utoipa::path(
    get,
    path = "/config/catalog",
    tag = "System",
    summary = "List collaborators",
    description = "Returns the names of every publication, method and route a session can reach.",
    responses(
        (status = 200, description = "Collaborator catalog", body = CatalogResponse),
    )
)]
pub async fn catalog_handler(State(state): State<AppState>) -> impl IntoResponse {
    let catalog = state.service.catalog();
    (
        StatusCode::OK,
        Json(CatalogResponse {
            publications: catalog.publications,
            methods: catalog.methods,
            routes: catalog.routes,
        }),
    )
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/config/catalog", get(catalog_handler))
}
