//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Domain errors represent violations of the nested-set contract.
/// These are independent of how rows are stored.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Tree configuration cannot be used, detected once at setup time.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An operation received a node it cannot work with.
    #[error("invalid operand: {0}")]
    InvalidOperand(String),

    /// Stored indices do not describe a nested set anymore.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl DomainError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidOperand(msg.into())
    }

    pub fn violation(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
