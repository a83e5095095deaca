//! Authentication gate
//!
//! Port for verifying bearer tokens into an identity scope at handshake.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Platform roles, from widest to narrowest scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SuperAdmin,
    EntityOwner,
    Manager,
    Employee,
    Customer,
}

/// Identity resolved from a verified token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: String,
    pub email: String,
    pub role: Role,
    pub entity_id: Option<String>,
    pub branch_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication token")]
    MissingToken,
    #[error("Invalid authentication token")]
    InvalidToken,
    #[error("Token has expired")]
    ExpiredToken,
    #[error("Token verification timed out")]
    Timeout,
}

/// Verifies bearer tokens and resolves identity/role claims
#[async_trait]
pub trait AuthGate: Send + Sync {
    async fn verify(&self, token: &str) -> Result<AuthContext, AuthError>;
}
