//! Infrastructure layer: store backends and DI container
//!
//! This layer implements the `NodeStore` boundary and wires up services.

pub mod di;
pub mod error;
pub mod file_store;
pub mod memory_store;
pub mod traits;

pub use error::{InfraError, InfraResult, StoreError, StoreResult};
pub use file_store::FileStore;
pub use memory_store::MemoryStore;
pub use traits::NodeStore;
