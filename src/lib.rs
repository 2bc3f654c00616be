//! nestset: nested-set tree engine
//!
//! Hierarchies are stored as flat rows carrying `left`/`right` indices. A
//! node's descendants are exactly the rows whose indices fall strictly
//! between its own. One store can hold many independent trees, partitioned
//! by a tree-id column.
//!
//! Layers, innermost first: `domain` (pure index arithmetic and the dump
//! walk), `application` (tree operations against the `NodeStore` boundary),
//! `infrastructure` (store backends, wiring), `cli`.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
