//! Tree service: the mutation façade over a `NodeStore`.
//!
//! Every mutation runs inside one store batch. Nodes passed in by callers are
//! treated as handles: their current row is re-read by key before any index
//! arithmetic, so a stale copy never drives a shift.

use std::sync::Arc;
use std::vec;

use itertools::Itertools;
use tracing::{debug, instrument, warn};

use crate::application::error_ext::StoreResultExt;
use crate::application::services::mover::{destination_for, Placement, SubtreeMover};
use crate::application::services::navigator::TreeNavigator;
use crate::application::services::shift::RangeShifter;
use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{
    check_numbering, DomainError, Dump, Field, Nested, Node, NodeKey, Partition, Predicate,
    Query, TreeConfig, TreeId, TreeMode,
};
use crate::infrastructure::error::StoreError;
use crate::infrastructure::traits::NodeStore;

/// Attempts at assigning a fresh tree id before giving up.
pub const DEFAULT_ROOT_RETRIES: u32 = 5;

/// Lazy dump over the rows of one subtree.
pub type SubtreeDump = Dump<vec::IntoIter<Node>>;

pub struct TreeService {
    store: Arc<dyn NodeStore>,
    config: Arc<TreeConfig>,
    max_root_retries: u32,
}

impl TreeService {
    /// Create a service. The configuration is validated here, once.
    pub fn new(store: Arc<dyn NodeStore>, config: Arc<TreeConfig>) -> ApplicationResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            max_root_retries: DEFAULT_ROOT_RETRIES,
        })
    }

    pub fn with_root_retries(mut self, attempts: u32) -> Self {
        self.max_root_retries = attempts;
        self
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn mode(&self) -> TreeMode {
        self.config.mode()
    }

    pub fn navigator(&self) -> TreeNavigator<'_> {
        TreeNavigator::new(self.store.as_ref(), self.mode())
    }

    /// Run `f` inside a store batch: commit on success, roll back otherwise.
    fn atomically<T>(
        &self,
        action: &str,
        f: impl FnOnce(&dyn NodeStore) -> ApplicationResult<T>,
    ) -> ApplicationResult<T> {
        let store = self.store.as_ref();
        store
            .begin_batch()
            .with_store_context(&format!("begin {}", action))?;

        let result = f(store).and_then(|value| {
            store
                .commit()
                .with_store_context(&format!("commit {}", action))?;
            Ok(value)
        });
        if let Err(e) = &result {
            debug!("{} failed, rolling back: {}", action, e);
            if let Err(rollback) = store.rollback() {
                warn!("rollback after failed {} did not complete: {}", action, rollback);
            }
        }
        result
    }

    /// Current row of a saved node.
    pub fn refresh(&self, node: &Node) -> ApplicationResult<Node> {
        current(self.store.as_ref(), node)
    }

    pub fn find(&self, key: NodeKey) -> ApplicationResult<Option<Node>> {
        self.store
            .fetch_by_key(key)
            .with_store_context(&format!("fetch node {}", key))
    }

    /// Root of `partition`, or of the configured default tree.
    pub fn root(&self, partition: Option<Partition>) -> ApplicationResult<Option<Node>> {
        let partition = self.resolve(partition)?;
        self.navigator().root(partition)
    }

    /// Explicit partition, falling back to the configured default.
    pub fn resolve(&self, partition: Option<Partition>) -> ApplicationResult<Partition> {
        partition
            .or_else(|| self.config.default_partition())
            .ok_or_else(|| DomainError::invalid("no tree selected and no tree_value configured").into())
    }

    /// Ids of every tree that has a root, ascending.
    pub fn tree_ids(&self) -> ApplicationResult<Vec<TreeId>> {
        let roots = self
            .store
            .fetch_many(
                Partition::Whole,
                &Query::new().filter(Predicate::Eq(Field::Left, 1)),
            )
            .with_store_context("list tree roots")?;
        Ok(roots
            .iter()
            .filter_map(|n| n.tree_id())
            .sorted()
            .dedup()
            .collect())
    }

    fn check_payload(&self, node: &Node) -> ApplicationResult<()> {
        for name in node.attributes.keys() {
            self.config.check_writable(name)?;
        }
        Ok(())
    }

    /// Save `node` as the root of a new tree.
    ///
    /// Multi-tree stores allocate the next free tree id. A conflicting
    /// concurrent root is retried up to the configured bound.
    #[instrument(level = "debug", skip(self, node), fields(node = %node))]
    pub fn new_root(&self, node: &mut Node) -> ApplicationResult<NodeKey> {
        if node.is_persisted() {
            return Err(DomainError::invalid("a new root must be an unsaved node").into());
        }
        self.check_payload(node)?;

        match self.mode() {
            TreeMode::Single => {
                let row = self.atomically("create root", |store| {
                    let existing = store
                        .count_matching(Partition::Whole, &Query::new())
                        .with_store_context("count rows")?;
                    if existing > 0 {
                        return Err(DomainError::invalid("the store already holds a tree").into());
                    }
                    place_root(store, node, None)
                })?;
                Ok(finish(node, row))
            }
            TreeMode::Multi => self.new_root_with_retry(node),
        }
    }

    fn new_root_with_retry(&self, node: &mut Node) -> ApplicationResult<NodeKey> {
        let mut last_conflict = None;
        for attempt in 1..=self.max_root_retries {
            let result = self.atomically("create root", |store| {
                let tree_id = store
                    .max_tree_id()
                    .with_store_context("read highest tree id")?
                    .unwrap_or(0)
                    + 1;
                place_root(store, node, Some(tree_id))
            });
            match result {
                Ok(row) => return Ok(finish(node, row)),
                Err(ApplicationError::Persistence { source, .. }) if source.is_conflict() => {
                    warn!(attempt, "tree id collided, retrying: {}", source);
                    last_conflict = Some(source);
                }
                Err(e) => return Err(e),
            }
        }
        Err(ApplicationError::Persistence {
            context: format!(
                "assign a tree id after {} attempts",
                self.max_root_retries
            ),
            source: last_conflict
                .unwrap_or_else(|| StoreError::Conflict("no attempt was made".into())),
        })
    }

    /// Save the unsaved `node` at `placement` of `target`.
    #[instrument(level = "debug", skip(self, node, target), fields(node = %node, target = %target))]
    pub fn insert(
        &self,
        node: &mut Node,
        placement: Placement,
        target: &Node,
    ) -> ApplicationResult<NodeKey> {
        if node.is_persisted() {
            return Err(DomainError::invalid("only unsaved nodes can be inserted").into());
        }
        self.check_payload(node)?;

        let mode = self.mode();
        let row = self.atomically("insert node", |store| {
            let target = current(store, target)?;
            let destination = destination_for(mode, placement, &target)?;
            let partition = mode.partition_of(&target)?;

            RangeShifter::new(store, partition).shift_from(destination, 2)?;
            let mut row = node.clone();
            row.set_bounds(destination, destination + 1);
            row.set_tree_id(target.tree_id());
            let key = store.persist(&row).with_store_context("persist inserted node")?;
            row.assign_key(key);
            Ok((key, row))
        })?;
        Ok(finish(node, row))
    }

    /// Move `node` with its subtree to `placement` of `target`.
    pub fn move_to(
        &self,
        node: &mut Node,
        placement: Placement,
        target: &Node,
    ) -> ApplicationResult<()> {
        let mode = self.mode();
        let moved = self.atomically("move subtree", |store| {
            let mut moving = current(store, node)?;
            let target = current(store, target)?;
            SubtreeMover::new(store, mode).move_to(&mut moving, placement, &target)?;
            Ok(moving)
        })?;
        *node = moved;
        Ok(())
    }

    pub fn make_next_sibling_of(&self, node: &mut Node, target: &Node) -> ApplicationResult<()> {
        self.move_to(node, Placement::NextSiblingOf, target)
    }

    pub fn make_previous_sibling_of(&self, node: &mut Node, target: &Node) -> ApplicationResult<()> {
        self.move_to(node, Placement::PreviousSiblingOf, target)
    }

    pub fn make_first_child_of(&self, node: &mut Node, target: &Node) -> ApplicationResult<()> {
        self.move_to(node, Placement::FirstChildOf, target)
    }

    pub fn make_last_child_of(&self, node: &mut Node, target: &Node) -> ApplicationResult<()> {
        self.move_to(node, Placement::LastChildOf, target)
    }

    /// Delete `node` and all its descendants, then close the gap.
    /// Returns the number of deleted rows.
    #[instrument(level = "debug", skip(self, node), fields(node = %node))]
    pub fn delete_subtree(&self, node: &Node) -> ApplicationResult<usize> {
        let mode = self.mode();
        self.atomically("delete subtree", |store| {
            let node = current(store, node)?;
            let (left, right) = mode.bounds(&node, "node")?;
            let partition = mode.partition_of(&node)?;

            let query = Query::new()
                .filter(Predicate::Ge(Field::Left, left))
                .filter(Predicate::Le(Field::Right, right));
            let deleted = store
                .delete_matching(partition, &query)
                .with_store_context("delete subtree rows")?;
            RangeShifter::new(store, partition).shift_from(right + 1, -(right - left + 1))?;
            debug!("deleted {} rows of subtree [{}, {}]", deleted, left, right);
            Ok(deleted)
        })
    }

    /// Delete only `node`; its children move up one level into its place.
    #[instrument(level = "debug", skip(self, node), fields(node = %node))]
    pub fn delete_node(&self, node: &Node) -> ApplicationResult<()> {
        let mode = self.mode();
        self.atomically("delete node", |store| {
            let node = current(store, node)?;
            let (left, right) = mode.bounds(&node, "node")?;
            if mode.is_root(&node) && !mode.is_leaf(&node) {
                return Err(DomainError::invalid(
                    "a root with children cannot be removed on its own",
                )
                .into());
            }
            let partition = mode.partition_of(&node)?;

            store
                .delete_matching(
                    partition,
                    &Query::new().filter(Predicate::Eq(Field::Left, left)),
                )
                .with_store_context("delete node row")?;
            let shifter = RangeShifter::new(store, partition);
            shifter.shift_range(left + 1, right - 1, -1)?;
            shifter.shift_from(right + 1, -2)?;
            Ok(())
        })
    }

    /// Delete every row of one tree.
    #[instrument(level = "debug", skip(self))]
    pub fn delete_tree(&self, partition: Partition) -> ApplicationResult<usize> {
        if self.mode() == TreeMode::Multi && partition == Partition::Whole {
            return Err(DomainError::invalid(
                "name a tree to drop, or drop all trees explicitly",
            )
            .into());
        }
        self.atomically("delete tree", |store| {
            store
                .delete_matching(partition, &Query::new())
                .with_store_context("delete tree rows")
        })
    }

    #[instrument(level = "debug", skip(self))]
    pub fn delete_all_trees(&self) -> ApplicationResult<usize> {
        self.atomically("delete all trees", |store| {
            store
                .delete_matching(Partition::Whole, &Query::new())
                .with_store_context("delete all rows")
        })
    }

    /// Depth-annotated pre-order walk of the subtree under `root`.
    pub fn dump(&self, root: &Node, include_root: bool) -> ApplicationResult<SubtreeDump> {
        let root = self.refresh(root)?;
        let mode = self.mode();
        let (left, right) = mode.bounds(&root, "dump root")?;
        let partition = mode.partition_of(&root)?;

        let query = if include_root {
            Query::new()
                .filter(Predicate::Ge(Field::Left, left))
                .filter(Predicate::Le(Field::Right, right))
        } else {
            Query::new()
                .filter(Predicate::Gt(Field::Left, left))
                .filter(Predicate::Lt(Field::Right, right))
        }
        .order_by(Field::Left);

        let rows = self
            .store
            .fetch_many(partition, &query)
            .with_store_context("fetch subtree")?;
        let with_paths = self.config.title_field.is_some();
        Ok(Dump::new(&root, rows.into_iter(), include_root, with_paths)?)
    }

    /// Check the nested-set invariant and return the number of rows checked.
    ///
    /// `Partition::Whole` on a multi-tree store checks every tree separately.
    #[instrument(level = "debug", skip(self))]
    pub fn verify(&self, partition: Partition) -> ApplicationResult<usize> {
        let rows = self
            .store
            .fetch_many(partition, &Query::new().order_by(Field::Left))
            .with_store_context("fetch rows to verify")?;

        if self.mode() == TreeMode::Single || partition != Partition::Whole {
            check_numbering(&rows)?;
            return Ok(rows.len());
        }

        if let Some(orphan) = rows.iter().find(|n| !n.tree_id().is_some_and(|id| id > 0)) {
            return Err(DomainError::violation(format!("row {} has no tree id", orphan)).into());
        }
        let by_tree = rows.iter().cloned().into_group_map_by(|n| n.tree_id());
        for (tree_id, mut tree_rows) in by_tree.into_iter().sorted_by_key(|(id, _)| *id) {
            tree_rows.sort_by_key(|n| n.left());
            check_numbering(&tree_rows).map_err(|e| {
                DomainError::violation(format!("tree {}: {}", tree_id.unwrap_or_default(), e))
            })?;
        }
        Ok(rows.len())
    }
}

fn current(store: &dyn NodeStore, node: &Node) -> ApplicationResult<Node> {
    let key = node
        .key()
        .ok_or_else(|| DomainError::invalid(format!("{} is not saved", node)))?;
    store
        .fetch_by_key(key)
        .with_store_context(&format!("fetch node {}", key))?
        .ok_or_else(|| DomainError::invalid(format!("node {} no longer exists", key)).into())
}

fn place_root(
    store: &dyn NodeStore,
    node: &Node,
    tree_id: Option<TreeId>,
) -> ApplicationResult<(NodeKey, Node)> {
    let mut row = node.clone();
    row.set_bounds(1, 2);
    row.set_tree_id(tree_id);
    let key = store.persist(&row).with_store_context("persist root")?;
    row.assign_key(key);
    Ok((key, row))
}

/// Hand the saved row back to the caller's handle.
fn finish(node: &mut Node, (key, row): (NodeKey, Node)) -> NodeKey {
    *node = row;
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::memory_store::MemoryStore;

    fn service(config: TreeConfig) -> TreeService {
        TreeService::new(Arc::new(MemoryStore::new()), Arc::new(config)).unwrap()
    }

    #[test]
    fn given_empty_store_when_creating_root_then_bounds_are_one_two() {
        let trees = service(TreeConfig::default());
        let mut root = Node::titled("root");
        trees.new_root(&mut root).unwrap();
        assert_eq!(root.bounds(), Some((1, 2)));
        assert!(root.is_persisted());
    }

    #[test]
    fn given_single_tree_with_root_when_creating_another_then_rejected() {
        let trees = service(TreeConfig::default());
        trees.new_root(&mut Node::titled("root")).unwrap();
        let err = trees.new_root(&mut Node::titled("again")).unwrap_err();
        assert!(err.is_invalid_operand());
    }

    #[test]
    fn given_multi_tree_store_when_creating_roots_then_tree_ids_increase() {
        let trees = service(TreeConfig::multi_tree());
        let mut first = Node::titled("one");
        let mut second = Node::titled("two");
        trees.new_root(&mut first).unwrap();
        trees.new_root(&mut second).unwrap();
        assert_eq!(first.tree_id(), Some(1));
        assert_eq!(second.tree_id(), Some(2));
        assert_eq!(trees.tree_ids().unwrap(), vec![1, 2]);
    }

    #[test]
    fn given_readonly_attribute_when_inserting_then_rejected() {
        let trees = service(TreeConfig::default());
        let mut root = Node::titled("root").with_attribute("left_id", "7");
        assert!(trees.new_root(&mut root).unwrap_err().is_invalid_operand());
        assert!(!root.is_persisted());
    }

    #[test]
    fn given_root_with_children_when_deleting_only_root_then_rejected() {
        let trees = service(TreeConfig::default());
        let mut root = Node::titled("root");
        trees.new_root(&mut root).unwrap();
        trees
            .insert(&mut Node::titled("child"), Placement::LastChildOf, &root)
            .unwrap();
        assert!(trees.delete_node(&root).unwrap_err().is_invalid_operand());
        assert_eq!(trees.verify(Partition::Whole).unwrap(), 2);
    }

    #[test]
    fn given_multi_tree_store_without_default_when_resolving_then_rejected() {
        let trees = service(TreeConfig::multi_tree());
        assert!(trees.resolve(None).unwrap_err().is_invalid_operand());
        assert_eq!(trees.resolve(Some(Partition::Tree(3))).unwrap(), Partition::Tree(3));
    }
}
