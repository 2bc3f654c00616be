//! Application-level errors (wraps domain errors)

use thiserror::Error;

use crate::domain::DomainError;
use crate::infrastructure::error::StoreError;

/// Application errors wrap domain errors and add store-level context.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    /// A store call failed; the enclosing batch has been rolled back.
    #[error("persistence failed: {context}")]
    Persistence {
        context: String,
        #[source]
        source: StoreError,
    },

    #[error("config error: {message}")]
    Config { message: String },
}

impl ApplicationError {
    pub fn is_invalid_operand(&self) -> bool {
        matches!(self, ApplicationError::Domain(DomainError::InvalidOperand(_)))
    }

    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            ApplicationError::Domain(DomainError::InvariantViolation(_))
        )
    }
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
