//! Domain layer: nested-set entities and index arithmetic
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod arithmetic;
pub mod dump;
pub mod error;
pub mod node;
pub mod query;
pub mod tree_config;

pub use arithmetic::{check_numbering, TreeMode};
pub use dump::{Dump, DumpEntry};
pub use error::{DomainError, DomainResult};
pub use node::{Nested, Node, NodeKey, Partition, TreeId};
pub use query::{Field, Predicate, Query};
pub use tree_config::TreeConfig;
