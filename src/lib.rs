//! # reactive-gateway
//!
//! WebSocket session gateway for server-driven reactive UIs.
//!
//! Clients open a WebSocket session, subscribe to named publications and
//! receive `insert`/`change`/`remove` pushes as the underlying data moves,
//! call named server methods, and navigate server-side views by URL. A small
//! REST surface exposes health, the collaborator catalog, live connections
//! and push/refresh hooks.
//!
//! ## Architecture
//!
//! ```text
//! Clients (WebSocket, HTTP)
//!     │
//!     ├── Session protocol (session/)      REST handlers (api/)
//!     │
//!     ├── GatewayService (service/)
//!     │
//!     ├── ConnectionRegistry, SubscriptionRegistry, EventBus (domain/)
//!     ├── PublicationRunner (publication/)
//!     ├── MethodRegistry (method/)
//!     ├── ViewRouter (view/)
//!     │
//!     └── PostgreSQL mirror (persistence/, optional)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod demo;
pub mod domain;
pub mod error;
pub mod method;
pub mod persistence;
pub mod publication;
pub mod server;
pub mod service;
pub mod session;
pub mod view;
