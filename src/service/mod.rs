//! Service layer: orchestrates session operations across the registries.
//!
//! [`GatewayService`] is the single coordinator used by both the WebSocket
//! sessions and the REST handlers.

pub mod gateway_service;

pub use gateway_service::{Catalog, Collaborators, GatewayService};
