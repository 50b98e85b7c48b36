//! Caller identity resolution for WebSocket upgrades.

use std::fmt;

use axum::http::HeaderMap;
use axum::http::header::HeaderName;

use crate::config::GatewayConfig;
use crate::domain::UserRef;
use crate::error::GatewayError;

/// Resolves the user behind an upgrade request, if any.
pub trait Identify: Send + Sync + fmt::Debug {
    /// Returns the caller's identity, or `None` for an anonymous session.
    fn identify(&self, headers: &HeaderMap) -> Option<UserRef>;
}

/// Every session is anonymous.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl Identify for Anonymous {
    fn identify(&self, _headers: &HeaderMap) -> Option<UserRef> {
        None
    }
}

/// Trusts a header set by an upstream proxy.
#[derive(Debug, Clone)]
pub struct HeaderIdentity {
    header: HeaderName,
}

impl HeaderIdentity {
    /// Reads the identity from header `name`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if `name` is not a valid
    /// header name.
    pub fn new(name: &str) -> Result<Self, GatewayError> {
        let header = HeaderName::try_from(name)
            .map_err(|e| GatewayError::InvalidRequest(format!("identity header {name}: {e}")))?;
        Ok(Self { header })
    }
}

impl Identify for HeaderIdentity {
    fn identify(&self, headers: &HeaderMap) -> Option<UserRef> {
        headers
            .get(&self.header)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(UserRef::new)
    }
}

/// Picks the identity strategy configured for this process.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] for an invalid header name.
pub fn from_config(config: &GatewayConfig) -> Result<Box<dyn Identify>, GatewayError> {
    match &config.identity_header {
        Some(name) => Ok(Box::new(HeaderIdentity::new(name)?)),
        None => Ok(Box::new(Anonymous)),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn header_identity_reads_trimmed_value() {
        let Ok(identity) = HeaderIdentity::new("x-user") else {
            panic!("valid header name");
        };
        let mut headers = HeaderMap::new();
        assert!(identity.identify(&headers).is_none());

        headers.insert("x-user", HeaderValue::from_static("  alice "));
        assert_eq!(
            identity.identify(&headers).map(|u| u.as_str().to_string()),
            Some("alice".to_string())
        );

        headers.insert("x-user", HeaderValue::from_static(""));
        assert!(identity.identify(&headers).is_none());
    }

    #[test]
    fn invalid_header_name_is_rejected() {
        assert!(HeaderIdentity::new("bad header").is_err());
    }

    #[test]
    fn config_without_header_is_anonymous() {
        let config = GatewayConfig::default();
        let Ok(identity) = from_config(&config) else {
            panic!("default config builds");
        };
        let mut headers = HeaderMap::new();
        headers.insert("x-user", HeaderValue::from_static("alice"));
        assert!(identity.identify(&headers).is_none());
    }
}
