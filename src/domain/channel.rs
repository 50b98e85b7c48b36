//! Type-safe channel token and user reference.
//!
//! [`ChannelToken`] is a newtype wrapper around [`uuid::Uuid`] (v4) naming
//! one live transport session. It is the join key for the connection and
//! subscription registries and the address of every push.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Opaque identifier of one live WebSocket session.
///
/// Generated when the socket is upgraded and immutable thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct ChannelToken(uuid::Uuid);

impl ChannelToken {
    /// Creates a new random `ChannelToken` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Creates a `ChannelToken` from an existing [`uuid::Uuid`].
    #[must_use]
    pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for ChannelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChannelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<uuid::Uuid> for ChannelToken {
    fn from(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }
}

/// Identity of the user owning a connection, as resolved at handshake.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct UserRef(String);

impl UserRef {
    /// Wraps an identity string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn new_generates_unique_tokens() {
        assert_ne!(ChannelToken::new(), ChannelToken::new());
    }

    #[test]
    fn display_is_uuid_format() {
        let s = ChannelToken::new().to_string();
        assert_eq!(s.len(), 36);
        assert!(s.contains('-'));
    }

    #[test]
    fn parses_from_path_segment() {
        let token = ChannelToken::new();
        let json = format!("\"{token}\"");
        let Ok(parsed) = serde_json::from_str::<ChannelToken>(&json) else {
            panic!("token should deserialize");
        };
        assert_eq!(parsed, token);
    }

    #[test]
    fn user_ref_is_transparent() {
        let user = UserRef::new("alice");
        assert_eq!(serde_json::to_string(&user).ok().as_deref(), Some("\"alice\""));
        assert_eq!(user.as_str(), "alice");
    }
}
