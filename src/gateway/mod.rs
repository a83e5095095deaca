//! Realtime gateway
//!
//! Authenticated WebSocket connections bound to authorization-scoped
//! rooms, fed by the event bus broadcast topic.

pub mod connection;
pub mod protocol;
pub mod server;
pub mod session;

pub use connection::ClientConnection;
pub use server::GatewayServer;
pub use session::{create_session_manager, SessionManager, SharedSessionManager};
