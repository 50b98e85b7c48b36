//! Push events delivered to a live channel.
//!
//! A [`ChannelEvent`] travels from the publication runner (or the REST push
//! endpoint) through the connection registry to the session owning the
//! addressed channel. [`DataChange`] travels on the [`super::EventBus`] and
//! tells the runner that a publication's data source moved.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Payload of a `handle.ddp` event: one record lifecycle transition.
///
/// Deserializes from `{"type": "inserted", "instance": {...}}`,
/// `{"type": "changed", "instance": {...}}` or
/// `{"type": "removed", "_id": "...", "parent": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DdpPush {
    /// A record started matching the subscription.
    Inserted {
        /// Serialized component instance.
        instance: serde_json::Value,
    },
    /// A matching record's content changed.
    Changed {
        /// Serialized component instance.
        instance: serde_json::Value,
    },
    /// A record stopped matching the subscription.
    Removed {
        /// Record identifier.
        #[serde(rename = "_id")]
        id: String,
        /// Parent component that owned the subscription.
        parent: String,
    },
}

impl DdpPush {
    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::Inserted { .. } => "inserted",
            Self::Changed { .. } => "changed",
            Self::Removed { .. } => "removed",
        }
    }
}

/// Out-of-band event addressed to one channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// The `handle.ddp` event: translated into a `DDP` envelope by the session.
    HandleDdp(DdpPush),
    /// Raw send primitive: the value is written to the socket unchanged.
    Send(serde_json::Value),
}

impl ChannelEvent {
    /// Name of the event as seen by external publishers.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::HandleDdp(_) => "handle.ddp",
            Self::Send(_) => "send",
        }
    }
}

/// Notification that the records behind a publication may have changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataChange {
    /// Name of the affected publication.
    pub publication: String,
}

impl DataChange {
    /// Creates a change notification for `publication`.
    #[must_use]
    pub fn new(publication: impl Into<String>) -> Self {
        Self {
            publication: publication.into(),
        }
    }
}
