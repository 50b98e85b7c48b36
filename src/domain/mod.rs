//! Domain layer: channel identity, registries, and push events.
//!
//! This module contains the server-side session model: channel tokens,
//! the connection and subscription registries shared by every session,
//! the events pushed to a channel, and the bus announcing data changes.

pub mod channel;
pub mod connection_registry;
pub mod ddp_event;
pub mod event_bus;
pub mod subscription_registry;

pub use channel::{ChannelToken, UserRef};
pub use connection_registry::{ChannelSender, Connection, ConnectionRegistry};
pub use ddp_event::{ChannelEvent, DataChange, DdpPush};
pub use event_bus::EventBus;
pub use subscription_registry::{Subscription, SubscriptionId, SubscriptionRegistry};
