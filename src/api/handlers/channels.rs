//! Connection listing, push injection and publication refresh handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    ConnectionListResponse, ConnectionSummaryDto, PaginationParams, PushAcceptedResponse,
    RefreshResponse,
};
use crate::app_state::AppState;
use crate::domain::{ChannelToken, DdpPush};
use crate::error::{ErrorResponse, GatewayError};

/// `GET /connections` — List live connections.
///
/// # Errors
///
/// Returns [`GatewayError`] on internal failures.
#[utoipa::path(
    get,
    path = "/api/v1/connections",
    tag = "Connections",
    summary = "List live connections",
    description = "Returns a paginated list of live sessions, oldest first, with their subscription counts.",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated connection list", body = ConnectionListResponse),
    )
)]
pub async fn list_connections(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, GatewayError> {
    let connections = state.service.connections().list().await;
    let (page, pagination) = params.paginate(connections);

    let mut data = Vec::with_capacity(page.len());
    for conn in page {
        let subscriptions = state
            .service
            .subscriptions()
            .count_for_channel(conn.channel)
            .await;
        data.push(ConnectionSummaryDto {
            channel: conn.channel,
            user: conn.user,
            created_at: conn.created_at,
            subscriptions,
        });
    }

    Ok(Json(ConnectionListResponse { data, pagination }))
}

/// `POST /channels/:channel/ddp` — Queue a `handle.ddp` push for a channel.
///
/// # Errors
///
/// Returns [`GatewayError::ClientNotFound`] if the channel is not live.
#[utoipa::path(
    post,
    path = "/api/v1/channels/{channel}/ddp",
    tag = "Connections",
    summary = "Push a record transition",
    description = "Delivers an `inserted`, `changed` or `removed` push to one live session, which forwards it as a `DDP` envelope.",
    params(
        ("channel" = uuid::Uuid, Path, description = "Channel token"),
    ),
    request_body = DdpPush,
    responses(
        (status = 202, description = "Push queued", body = PushAcceptedResponse),
        (status = 404, description = "Channel not live", body = ErrorResponse),
    )
)]
pub async fn push_ddp(
    State(state): State<AppState>,
    Path(channel): Path<ChannelToken>,
    Json(push): Json<DdpPush>,
) -> Result<impl IntoResponse, GatewayError> {
    let push_type = push.event_type_str().to_string();
    state.service.push(channel, push).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(PushAcceptedResponse { channel, push_type }),
    ))
}

/// `POST /channels/:channel/send` — Write a raw envelope to a channel.
///
/// # Errors
///
/// Returns [`GatewayError::ClientNotFound`] if the channel is not live, or
/// [`GatewayError::InvalidRequest`] if the body is not a JSON object.
#[utoipa::path(
    post,
    path = "/api/v1/channels/{channel}/send",
    tag = "Connections",
    summary = "Send a raw envelope",
    description = "Forwards an arbitrary JSON object to one live session, written to the socket unchanged.",
    params(
        ("channel" = uuid::Uuid, Path, description = "Channel token"),
    ),
    request_body = serde_json::Value,
    responses(
        (status = 202, description = "Envelope queued"),
        (status = 400, description = "Body is not an object", body = ErrorResponse),
        (status = 404, description = "Channel not live", body = ErrorResponse),
    )
)]
pub async fn send_raw(
    State(state): State<AppState>,
    Path(channel): Path<ChannelToken>,
    Json(envelope): Json<serde_json::Value>,
) -> Result<impl IntoResponse, GatewayError> {
    if !envelope.is_object() {
        return Err(GatewayError::InvalidRequest(
            "envelope must be a JSON object".to_string(),
        ));
    }
    state.service.send(channel, envelope).await?;
    Ok(StatusCode::ACCEPTED)
}

/// `POST /publications/:name/refresh` — Announce a data change.
///
/// # Errors
///
/// Returns [`GatewayError::PublicationNotFound`] for an unknown publication.
#[utoipa::path(
    post,
    path = "/api/v1/publications/{name}/refresh",
    tag = "Publications",
    summary = "Refresh a publication",
    description = "Publishes a data change for the publication; every subscription to it is re-scanned and diffed.",
    params(
        ("name" = String, Path, description = "Publication name"),
    ),
    responses(
        (status = 202, description = "Change announced", body = RefreshResponse),
        (status = 404, description = "Publication not found", body = ErrorResponse),
    )
)]
pub async fn refresh_publication(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let receivers = state.service.notify_change(&name)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(RefreshResponse {
            publication: name,
            receivers,
        }),
    ))
}

/// Connection and publication routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/connections", get(list_connections))
        .route("/channels/{channel}/ddp", post(push_ddp))
        .route("/channels/{channel}/send", post(send_raw))
        .route("/publications/{name}/refresh", post(refresh_publication))
}
