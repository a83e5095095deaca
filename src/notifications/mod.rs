//! Notifications module
//!
//! Typed in-process pub/sub: producers publish `DomainEvent`s, the bus
//! derives per-event broadcast scope, and the realtime gateway relays the
//! generic broadcast topic to connected clients.
//!
//! Non-durable: no replay, no cross-process fan-out.

pub mod event_bus;
pub mod events;

pub use event_bus::{create_event_bus, BroadcastSubscriber, EventBus, EventSubscriber, SharedEventBus};
pub use events::*;
