//! Order aggregate and repository interface

pub mod model;
pub mod repository;

pub use model::{encode_tracking_token, Order, OrderItem, OrderStatus, SplitParticipant};
pub use repository::OrderRepository;
