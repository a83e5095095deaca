//! Application layer - the order lifecycle engine and its ports

pub mod audit;
pub mod order_service;

pub use audit::{AuditEntry, AuditSink, LogAuditSink};
pub use order_service::{CreateOrderRequest, NewOrderItem, OrderService, SplitShare};
