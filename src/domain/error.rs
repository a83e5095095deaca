//! Domain errors

use thiserror::Error;

/// Domain-level error types
#[derive(Debug, Error)]
pub enum DomainError {
    /// Malformed input (empty item list, negative price, split mismatch, ...)
    #[error("Validation: {0}")]
    Validation(String),

    /// Unknown order, participant or other aggregate
    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    /// Illegal transition, double payment, mutating a terminal order
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Infrastructure failure from the persistence collaborator
    #[error("Storage error: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn not_found(entity: &'static str, field: &'static str, value: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            field,
            value: value.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;
