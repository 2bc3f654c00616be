//! In-memory `NodeStore` with snapshot-based batches.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, instrument};

use crate::domain::{Nested, Node, NodeKey, Partition, Query, TreeId};
use crate::infrastructure::error::{StoreError, StoreResult};
use crate::infrastructure::traits::NodeStore;

#[derive(Debug, Clone, Default)]
struct Rows {
    nodes: BTreeMap<NodeKey, Node>,
    next_key: u64,
}

#[derive(Debug, Default)]
struct State {
    rows: Rows,
    /// Copy taken at `begin_batch`, restored on `rollback`
    snapshot: Option<Rows>,
}

/// Rows kept in a `BTreeMap` keyed by primary key.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-filled with saved rows. Rows without a key are skipped.
    pub fn from_rows(rows: impl IntoIterator<Item = Node>) -> Self {
        let nodes: BTreeMap<NodeKey, Node> = rows
            .into_iter()
            .filter_map(|n| n.key().map(|k| (k, n)))
            .collect();
        let next_key = nodes.keys().next_back().map(|k| k.0 + 1).unwrap_or(1);
        Self {
            state: Mutex::new(State {
                rows: Rows { nodes, next_key },
                snapshot: None,
            }),
        }
    }

    fn state(&self) -> StoreResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Backend("store lock poisoned".into()))
    }

    /// Every row in key order, plus the next key to hand out.
    pub fn export(&self) -> StoreResult<(Vec<Node>, u64)> {
        let state = self.state()?;
        let next_key = state.rows.next_key.max(1);
        Ok((state.rows.nodes.values().cloned().collect(), next_key))
    }

    pub fn in_batch(&self) -> StoreResult<bool> {
        Ok(self.state()?.snapshot.is_some())
    }

    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.state()?.rows.nodes.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl NodeStore for MemoryStore {
    fn fetch_many(&self, partition: Partition, query: &Query) -> StoreResult<Vec<Node>> {
        let state = self.state()?;
        let mut rows: Vec<Node> = state
            .rows
            .nodes
            .values()
            .filter(|n| partition.contains(*n) && query.matches(*n))
            .cloned()
            .collect();
        rows.sort_by(|a, b| query.compare(a, b));
        Ok(rows)
    }

    fn fetch_by_key(&self, key: NodeKey) -> StoreResult<Option<Node>> {
        Ok(self.state()?.rows.nodes.get(&key).cloned())
    }

    fn count_matching(&self, partition: Partition, query: &Query) -> StoreResult<usize> {
        let state = self.state()?;
        Ok(state
            .rows
            .nodes
            .values()
            .filter(|n| partition.contains(*n) && query.matches(*n))
            .count())
    }

    #[instrument(level = "trace", skip(self, node), fields(node = %node))]
    fn persist(&self, node: &Node) -> StoreResult<NodeKey> {
        let mut state = self.state()?;
        let rows = &mut state.rows;

        if let Some(key) = node.key() {
            let slot = rows
                .nodes
                .get_mut(&key)
                .ok_or(StoreError::UnknownNode(key))?;
            *slot = node.clone();
            return Ok(key);
        }

        if node.left() == Some(1) {
            let partition = node.tree_id().map(Partition::Tree).unwrap_or(Partition::Whole);
            if rows.nodes.values().any(|n| partition.contains(n)) {
                return Err(StoreError::Conflict(format!(
                    "{} already has a root",
                    partition
                )));
            }
        }

        let key = NodeKey(rows.next_key.max(1));
        rows.next_key = key.0 + 1;
        let mut row = node.clone();
        row.assign_key(key);
        rows.nodes.insert(key, row);
        debug!("inserted row {}", key);
        Ok(key)
    }

    fn delete_matching(&self, partition: Partition, query: &Query) -> StoreResult<usize> {
        let mut state = self.state()?;
        let before = state.rows.nodes.len();
        state
            .rows
            .nodes
            .retain(|_, n| !(partition.contains(&*n) && query.matches(&*n)));
        Ok(before - state.rows.nodes.len())
    }

    fn max_tree_id(&self) -> StoreResult<Option<TreeId>> {
        Ok(self
            .state()?
            .rows
            .nodes
            .values()
            .filter_map(|n| n.tree_id())
            .max())
    }

    fn begin_batch(&self) -> StoreResult<()> {
        let mut state = self.state()?;
        if state.snapshot.is_some() {
            return Err(StoreError::BatchInProgress);
        }
        state.snapshot = Some(state.rows.clone());
        Ok(())
    }

    fn commit(&self) -> StoreResult<()> {
        let mut state = self.state()?;
        state.snapshot.take().ok_or(StoreError::NoBatch)?;
        Ok(())
    }

    fn rollback(&self) -> StoreResult<()> {
        let mut state = self.state()?;
        let snapshot = state.snapshot.take().ok_or(StoreError::NoBatch)?;
        state.rows = snapshot;
        debug!("batch rolled back");
        Ok(())
    }
}
