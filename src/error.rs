//! Gateway error types with wire and HTTP mapping.
//!
//! [`GatewayError`] is the central error type for the gateway. Each variant
//! maps to a `{name, message}` pair carried in a WebSocket `Error` envelope
//! and to an HTTP status code with a structured JSON body for REST callers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::ChannelToken;

/// Structured JSON error response body.
///
/// All REST error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2003,
///     "message": "publication not found: tasks",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// The `params` of a WebSocket `Error` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WireError {
    /// Short error category shown to the client (e.g. `"Bad format"`).
    pub name: String,
    /// Human-readable detail.
    pub message: String,
}

impl WireError {
    /// Builds a wire error from its two parts.
    #[must_use]
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Server-side error enum with wire and HTTP mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                  |
/// |-----------|-----------------|------------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request              |
/// | 2000–2999 | State/Not Found | 404 Not Found / 409 Conflict |
/// | 3000–3999 | Server          | 500 / 504                    |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The frame could not be decoded as a JSON object. Fatal for the socket.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// A key expected by a request handler was absent.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A subscription request lacked one of its required keys.
    #[error("subscription field missing: {0}")]
    SubscriptionFieldMissing(&'static str),

    /// No live connection is registered for the channel.
    #[error("client not found for channel {0}")]
    ClientNotFound(ChannelToken),

    /// A connection already exists for the channel.
    #[error("channel already registered: {0}")]
    ChannelExists(ChannelToken),

    /// No method is registered under the given name.
    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// No publication is registered under the given name.
    #[error("publication not found: {0}")]
    PublicationNotFound(String),

    /// A publication's data source failed while fetching records.
    #[error("publication {name} failed: {reason}")]
    PublicationFailed {
        /// Publication name.
        name: String,
        /// Failure reported by the data source.
        reason: String,
    },

    /// A method or publication call exceeded the configured timeout.
    #[error("{0} timed out")]
    Timeout(String),

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::MalformedFrame(_) => 1002,
            Self::MissingField(_) | Self::SubscriptionFieldMissing(_) => 1003,
            Self::ClientNotFound(_) => 2001,
            Self::MethodNotFound(_) => 2002,
            Self::PublicationNotFound(_) => 2003,
            Self::ChannelExists(_) => 2004,
            Self::Internal(_) => 3000,
            Self::PersistenceError(_) => 3001,
            Self::PublicationFailed { .. } => 3002,
            Self::Timeout(_) => 3003,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_)
            | Self::MalformedFrame(_)
            | Self::MissingField(_)
            | Self::SubscriptionFieldMissing(_) => StatusCode::BAD_REQUEST,
            Self::ClientNotFound(_) | Self::MethodNotFound(_) | Self::PublicationNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Self::ChannelExists(_) => StatusCode::CONFLICT,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::PublicationFailed { .. } | Self::PersistenceError(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the `{name, message}` pair sent in an `Error` envelope.
    ///
    /// A [`GatewayError::MissingField`] never reveals which key was absent:
    /// every such failure is reported as the same generic `Bad format`.
    #[must_use]
    pub fn to_wire(&self) -> WireError {
        match self {
            Self::MissingField(_) | Self::MalformedFrame(_) => {
                WireError::new("Bad format", "\"params\" key not found")
            }
            Self::SubscriptionFieldMissing(key) => {
                WireError::new("Bad format", format!("Subscription {key} not found"))
            }
            Self::ClientNotFound(_) => WireError::new(
                "Client not found",
                "No client was found for this channel name",
            ),
            Self::MethodNotFound(name) => {
                WireError::new("Not found", format!("Method {name} not found"))
            }
            Self::PublicationNotFound(name) => {
                WireError::new("Not found", format!("Publication {name} not found"))
            }
            Self::PublicationFailed { name, .. } => {
                WireError::new("Publication error", format!("Publication {name} failed"))
            }
            Self::Timeout(what) => WireError::new("Timeout", format!("{what} timed out")),
            Self::ChannelExists(_)
            | Self::InvalidRequest(_)
            | Self::PersistenceError(_)
            | Self::Internal(_) => WireError::new("Server error", self.to_string()),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_hides_key_name() {
        let wire = GatewayError::MissingField("url").to_wire();
        assert_eq!(wire.name, "Bad format");
        assert_eq!(wire.message, "\"params\" key not found");
        assert!(!wire.message.contains("url"));
    }

    #[test]
    fn subscription_field_names_key() {
        let wire = GatewayError::SubscriptionFieldMissing("name").to_wire();
        assert_eq!(wire.message, "Subscription name not found");
    }

    #[test]
    fn method_not_found_wire_message() {
        let wire = GatewayError::MethodNotFound("tasks.add".to_string()).to_wire();
        assert_eq!(wire, WireError::new("Not found", "Method tasks.add not found"));
    }

    #[test]
    fn status_codes() {
        assert_eq!(
            GatewayError::PublicationNotFound("x".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            GatewayError::Timeout("method x".to_string()).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            GatewayError::ChannelExists(ChannelToken::new()).status_code(),
            StatusCode::CONFLICT
        );
    }
}
