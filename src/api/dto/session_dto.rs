//! DTOs for the connection, push and publication endpoints.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::PaginationMeta;
use crate::domain::{ChannelToken, UserRef};

/// One live connection as listed by `GET /api/v1/connections`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConnectionSummaryDto {
    /// Channel token addressing the connection.
    pub channel: ChannelToken,
    /// Authenticated user, if any.
    pub user: Option<UserRef>,
    /// When the session connected.
    pub created_at: DateTime<Utc>,
    /// Number of active subscriptions owned by the channel.
    pub subscriptions: usize,
}

/// Paginated connection list.
#[derive(Debug, Serialize, ToSchema)]
pub struct ConnectionListResponse {
    /// Connections on this page, oldest first.
    pub data: Vec<ConnectionSummaryDto>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}

/// Acknowledgement of an injected push.
#[derive(Debug, Serialize, ToSchema)]
pub struct PushAcceptedResponse {
    /// Channel the push was queued for.
    pub channel: ChannelToken,
    /// Push type (`inserted`, `changed` or `removed`).
    pub push_type: String,
}

/// Result of a publication refresh request.
#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshResponse {
    /// Publication that was announced as changed.
    pub publication: String,
    /// Number of runners that received the announcement.
    pub receivers: usize,
}

/// Everything a client can reach.
#[derive(Debug, Serialize, ToSchema)]
pub struct CatalogResponse {
    /// Registered publication names, sorted.
    pub publications: Vec<String>,
    /// Registered method names, sorted.
    pub methods: Vec<String>,
    /// Route names in match order.
    pub routes: Vec<String>,
}
