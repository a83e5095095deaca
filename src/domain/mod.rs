//! Domain layer - entities, value types and repository interfaces

pub mod error;
pub mod money;
pub mod order;

pub use error::{DomainError, DomainResult};
pub use order::{encode_tracking_token, Order, OrderItem, OrderRepository, OrderStatus, SplitParticipant};
