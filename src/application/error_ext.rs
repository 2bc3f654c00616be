//! Error conversion helpers for store calls
//!
//! Provides an extension trait for cleaner error handling with action context.

use crate::application::{ApplicationError, ApplicationResult};
use crate::infrastructure::error::StoreResult;

/// Extension trait for converting `StoreResult` to `ApplicationResult` with context.
pub trait StoreResultExt<T> {
    /// Add action context to a store error.
    ///
    /// # Example
    /// ```ignore
    /// store.persist(&row)
    ///     .with_store_context("shift row")?;
    /// ```
    fn with_store_context(self, action: &str) -> ApplicationResult<T>;
}

impl<T> StoreResultExt<T> for StoreResult<T> {
    fn with_store_context(self, action: &str) -> ApplicationResult<T> {
        self.map_err(|e| ApplicationError::Persistence {
            context: action.to_string(),
            source: e,
        })
    }
}
