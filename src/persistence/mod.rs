//! Persistence layer: PostgreSQL mirror of connections and subscriptions.
//!
//! The in-memory registries are authoritative for live sessions. When
//! enabled, every connection and subscription row is mirrored to
//! PostgreSQL so operators can inspect live sessions, and rows left behind
//! by an unclean shutdown are reaped at startup.

pub mod postgres;

pub use postgres::PostgresPersistence;
