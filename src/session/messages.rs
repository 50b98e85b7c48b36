//! WebSocket message types: request kinds and the outbound envelope.
//!
//! Inbound frames are JSON objects `{"_id", "type", "params"}` and are
//! validated field by field in [`super::protocol`]. Outbound frames are
//! built from [`OutboundEnvelope`].

use serde::Serialize;
use serde_json::{Value, json};

use crate::domain::DdpPush;
use crate::error::WireError;

/// Request types a client may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Start receiving a publication's records.
    Subscribe,
    /// Stop receiving a publication's records.
    Unsubscribe,
    /// Call a named server method.
    Method,
    /// Navigate to a path.
    GetUrl,
}

impl RequestKind {
    /// Parses the `type` field of an inbound envelope.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "subscribe" => Some(Self::Subscribe),
            "unsubscribe" => Some(Self::Unsubscribe),
            "method" => Some(Self::Method),
            "geturl" => Some(Self::GetUrl),
            _ => None,
        }
    }

    /// Returns the wire name of this request type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
            Self::Method => "method",
            Self::GetUrl => "geturl",
        }
    }
}

/// Discriminator for server → client envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutboundType {
    /// Sent once after the handshake.
    Connected,
    /// Positive response to a request.
    Success,
    /// Negative response to a request.
    Error,
    /// Uncorrelated push.
    #[serde(rename = "DDP")]
    Ddp,
    /// Acknowledgement of an `unsubscribe`.
    #[serde(rename = "unsubscribed")]
    Unsubscribed,
}

/// Top-level server → client envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundEnvelope {
    /// Correlation id copied from the request; absent on pushes.
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub msg_type: OutboundType,
    /// Free-form note, only used by the unsubscribe acknowledgement.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Variant-specific payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl OutboundEnvelope {
    /// `{"type": "Connected"}`.
    #[must_use]
    pub const fn connected() -> Self {
        Self {
            id: None,
            msg_type: OutboundType::Connected,
            message: None,
            params: None,
        }
    }

    /// Correlated `Success` carrying `params`.
    #[must_use]
    pub fn success(id: Value, params: Value) -> Self {
        Self {
            id: Some(id),
            msg_type: OutboundType::Success,
            message: None,
            params: Some(params),
        }
    }

    /// Correlated `Error` carrying an arbitrary payload.
    #[must_use]
    pub fn failure(id: Value, params: Value) -> Self {
        Self {
            id: Some(id),
            msg_type: OutboundType::Error,
            message: None,
            params: Some(params),
        }
    }

    /// Correlated `Error` carrying `{name, message}`.
    #[must_use]
    pub fn error(id: Value, error: &WireError) -> Self {
        Self::failure(
            id,
            json!({
                "name": error.name,
                "message": error.message,
            }),
        )
    }

    /// Acknowledgement of an `unsubscribe` for publication `name`.
    #[must_use]
    pub fn unsubscribed(id: Value, name: Value) -> Self {
        Self {
            id: Some(id),
            msg_type: OutboundType::Unsubscribed,
            message: Some("Got unsub".to_string()),
            params: Some(json!({ "name": name })),
        }
    }

    /// Uncorrelated `DDP` push for one record transition.
    #[must_use]
    pub fn ddp(push: DdpPush) -> Self {
        let params = match push {
            DdpPush::Inserted { instance } => json!({"type": "insert", "params": instance}),
            DdpPush::Changed { instance } => json!({"type": "change", "params": instance}),
            DdpPush::Removed { id, parent } => json!({
                "type": "remove",
                "params": {"_id": id, "parent": parent},
            }),
        };
        Self {
            id: None,
            msg_type: OutboundType::Ddp,
            message: None,
            params: Some(params),
        }
    }

    /// Serializes the envelope into a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn request_kind_round_trips_names() {
        for kind in [
            RequestKind::Subscribe,
            RequestKind::Unsubscribe,
            RequestKind::Method,
            RequestKind::GetUrl,
        ] {
            assert_eq!(RequestKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(RequestKind::parse("Subscribe"), None);
        assert_eq!(RequestKind::parse("login"), None);
    }

    #[test]
    fn connected_has_only_type() {
        assert_eq!(
            OutboundEnvelope::connected().to_value(),
            json!({"type": "Connected"})
        );
    }

    #[test]
    fn error_envelope_shape() {
        let env = OutboundEnvelope::error(json!("7"), &WireError::new("Bad message", "oops"));
        assert_eq!(
            env.to_value(),
            json!({"_id": "7", "type": "Error", "params": {"name": "Bad message", "message": "oops"}})
        );
    }

    #[test]
    fn unsubscribed_carries_message() {
        let env = OutboundEnvelope::unsubscribed(json!("3"), json!("tasks"));
        assert_eq!(
            env.to_value(),
            json!({"_id": "3", "type": "unsubscribed", "message": "Got unsub", "params": {"name": "tasks"}})
        );
    }

    #[test]
    fn ddp_translation() {
        let insert = OutboundEnvelope::ddp(DdpPush::Inserted {
            instance: json!({"_id": "1"}),
        });
        assert_eq!(
            insert.to_value(),
            json!({"type": "DDP", "params": {"type": "insert", "params": {"_id": "1"}}})
        );

        let change = OutboundEnvelope::ddp(DdpPush::Changed {
            instance: json!({"_id": "1"}),
        });
        assert_eq!(
            change.to_value().pointer("/params/type"),
            Some(&json!("change"))
        );

        let remove = OutboundEnvelope::ddp(DdpPush::Removed {
            id: "1".to_string(),
            parent: "root".to_string(),
        });
        assert_eq!(
            remove.to_value(),
            json!({"type": "DDP", "params": {"type": "remove", "params": {"_id": "1", "parent": "root"}}})
        );
    }
}
