//! WebSocket session layer: protocol state machine, message envelopes,
//! connection loop and identity resolution.
//!
//! The WebSocket endpoint (default `/ws`) carries the session protocol:
//! correlated `subscribe`, `unsubscribe`, `method` and `geturl` requests
//! plus uncorrelated `DDP` pushes.

pub mod connection;
pub mod handler;
pub mod identity;
pub mod messages;
pub mod protocol;

pub use identity::{Anonymous, HeaderIdentity, Identify};
pub use messages::{OutboundEnvelope, OutboundType, RequestKind};
pub use protocol::{SessionProtocol, SessionState};
