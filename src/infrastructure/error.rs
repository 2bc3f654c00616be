//! Infrastructure-level errors: store backends and wiring

use std::path::PathBuf;

use thiserror::Error;

use crate::application::ApplicationError;
use crate::domain::NodeKey;

/// Failures reported by a `NodeStore` backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Structured uniqueness conflict, e.g. a second root in one tree.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("no batch is open")]
    NoBatch,

    #[error("a batch is already open")]
    BatchInProgress,

    #[error("unknown node: {0}")]
    UnknownNode(NodeKey),

    #[error("I/O error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt store {path}: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("store failure: {0}")]
    Backend(String),
}

impl StoreError {
    /// Create an I/O error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Infrastructure errors wrap application errors and add I/O-level concerns.
#[derive(Error, Debug)]
pub enum InfraError {
    #[error("{0}")]
    Application(#[from] ApplicationError),

    #[error("store error: {context}")]
    Store {
        context: String,
        #[source]
        source: StoreError,
    },

    #[error("I/O error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl InfraError {
    /// Create an I/O error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a store error with context.
    pub fn store(context: impl Into<String>, source: StoreError) -> Self {
        Self::Store {
            context: context.into(),
            source,
        }
    }
}

/// Result type for infrastructure layer operations.
pub type InfraResult<T> = Result<T, InfraError>;
