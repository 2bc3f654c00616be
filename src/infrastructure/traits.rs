//! Row-store boundary trait
//!
//! The tree engine never reads or writes rows itself. It states what it needs
//! as typed queries against this trait, which lets the same engine run on the
//! in-memory store, the TOML file store, or any other backend.

use crate::domain::{Node, NodeKey, Partition, Query, TreeId};
use crate::infrastructure::error::StoreResult;

/// Row storage for nested-set nodes.
///
/// Methods take `&self`; implementations keep their state behind a lock so a
/// store can be shared as `Arc<dyn NodeStore>`.
///
/// Mutations issued by the engine are always wrapped in
/// `begin_batch`/`commit`, with `rollback` on the first error. A backend must
/// make the batch failure-atomic: after `rollback` every row is exactly as it
/// was at `begin_batch`.
pub trait NodeStore: Send + Sync {
    /// All rows in `partition` matching `query`, ascending by `query.order_by`.
    fn fetch_many(&self, partition: Partition, query: &Query) -> StoreResult<Vec<Node>>;

    /// First row of `fetch_many`.
    fn fetch_one(&self, partition: Partition, query: &Query) -> StoreResult<Option<Node>> {
        Ok(self.fetch_many(partition, query)?.into_iter().next())
    }

    /// Row by primary key, regardless of partition.
    fn fetch_by_key(&self, key: NodeKey) -> StoreResult<Option<Node>>;

    fn count_matching(&self, partition: Partition, query: &Query) -> StoreResult<usize> {
        Ok(self.fetch_many(partition, query)?.len())
    }

    /// Insert a new row (assigning its key) or overwrite an existing one.
    ///
    /// Inserting a node with `left == 1` into a partition that already has
    /// rows reports `StoreError::Conflict`.
    fn persist(&self, node: &Node) -> StoreResult<NodeKey>;

    /// Delete matching rows, returning how many were removed.
    fn delete_matching(&self, partition: Partition, query: &Query) -> StoreResult<usize>;

    /// Highest tree id in use, `None` for an empty store.
    fn max_tree_id(&self) -> StoreResult<Option<TreeId>>;

    fn begin_batch(&self) -> StoreResult<()>;

    fn commit(&self) -> StoreResult<()>;

    fn rollback(&self) -> StoreResult<()>;
}
