//! # Tably Ordering Platform
//!
//! Multi-tenant ordering core for retail and food-service venues.
//!
//! ## Architecture
//!
//! - **domain**: Order aggregate, money helpers, repository interfaces
//! - **application**: Order lifecycle engine and audit port
//! - **notifications**: Typed event bus and the domain event union
//! - **gateway**: Authenticated realtime WebSocket gateway with
//!   tenant/branch/user room scoping
//! - **auth**: Token verification and identity scope resolution
//! - **infrastructure**: Concrete storage adapters
//! - **shared**: Graceful shutdown plumbing

pub mod application;
pub mod auth;
pub mod config;
pub mod domain;
pub mod gateway;
pub mod infrastructure;
pub mod notifications;
pub mod shared;

pub use config::{default_config_path, AppConfig, Config};

// Re-export the main building blocks
pub use application::{CreateOrderRequest, LogAuditSink, NewOrderItem, OrderService, SplitShare};
pub use domain::{DomainError, DomainResult, Order, OrderStatus};
pub use gateway::GatewayServer;
pub use infrastructure::InMemoryOrderStore;
pub use notifications::{create_event_bus, Channel, DomainEvent, EventBus, SharedEventBus};
