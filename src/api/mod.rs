//! REST API layer: route handlers, DTOs, and router composition.
//!
//! Resource endpoints are mounted under `/api/v1`; health and catalog live
//! at the root. With the `swagger-ui` feature the OpenAPI document is
//! served at `/api-docs/openapi.json` and browsable at `/swagger-ui`.

pub mod dto;
pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI document for the REST surface.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "reactive-gateway",
        description = "Administrative REST surface of the reactive session gateway."
    ),
    paths(
        handlers::system::health_handler,
        handlers::system::catalog_handler,
        handlers::channels::list_connections,
        handlers::channels::push_ddp,
        handlers::channels::send_raw,
        handlers::channels::refresh_publication,
    ),
    components(schemas(
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
        crate::domain::DdpPush,
        dto::CatalogResponse,
        dto::ConnectionListResponse,
        dto::ConnectionSummaryDto,
        dto::PaginationMeta,
        dto::PushAcceptedResponse,
        dto::RefreshResponse,
        handlers::system::HealthResponse,
    )),
    tags(
        (name = "System", description = "Health and catalog"),
        (name = "Connections", description = "Live sessions and pushes"),
        (name = "Publications", description = "Data change announcements"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router
}
