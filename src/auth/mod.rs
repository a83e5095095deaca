//! Authentication - token verification and identity scope resolution

pub mod gate;
pub mod jwt;

pub use gate::{AuthContext, AuthError, AuthGate, Role};
pub use jwt::{create_token, verify_token, Claims, JwtAuthGate, JwtConfig};
