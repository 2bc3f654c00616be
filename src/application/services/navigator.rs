//! Tree query planner: structural navigation as predicate queries.
//!
//! A missing relationship (root has no parent, leaf has no children) is
//! `Ok(None)`, not an error.

use tracing::instrument;

use crate::application::error_ext::StoreResultExt;
use crate::application::ApplicationResult;
use crate::domain::{DomainError, Field, Node, Partition, Predicate, Query, TreeMode};
use crate::infrastructure::traits::NodeStore;

pub struct TreeNavigator<'a> {
    store: &'a dyn NodeStore,
    mode: TreeMode,
}

impl<'a> TreeNavigator<'a> {
    pub fn new(store: &'a dyn NodeStore, mode: TreeMode) -> Self {
        Self { store, mode }
    }

    /// Bounds and partition of a node we navigate from.
    fn origin(&self, node: &Node) -> ApplicationResult<(i64, i64, Partition)> {
        let (left, right) = self.mode.bounds(node, "node")?;
        Ok((left, right, self.mode.partition_of(node)?))
    }

    fn one(&self, partition: Partition, query: Query, what: &str) -> ApplicationResult<Option<Node>> {
        self.store
            .fetch_one(partition, &query)
            .with_store_context(&format!("fetch {}", what))
    }

    /// Root of a partition. Multi-tree stores need an explicit tree.
    #[instrument(level = "debug", skip(self))]
    pub fn root(&self, partition: Partition) -> ApplicationResult<Option<Node>> {
        let partition = match (self.mode, partition) {
            (TreeMode::Single, _) => Partition::Whole,
            (TreeMode::Multi, Partition::Tree(id)) => Partition::Tree(id),
            (TreeMode::Multi, Partition::Whole) => {
                return Err(DomainError::invalid("a multi-tree store needs a tree id").into())
            }
        };
        self.one(partition, Query::new().filter(Predicate::Eq(Field::Left, 1)), "root")
    }

    /// Immediate parent: the enclosing node with the smallest right index.
    pub fn parent(&self, node: &Node) -> ApplicationResult<Option<Node>> {
        let (left, right, partition) = self.origin(node)?;
        let query = Query::new()
            .filter(Predicate::Lt(Field::Left, left))
            .filter(Predicate::Gt(Field::Right, right))
            .order_by(Field::Right);
        self.one(partition, query, "parent")
    }

    pub fn first_child(&self, node: &Node) -> ApplicationResult<Option<Node>> {
        let (left, _, partition) = self.origin(node)?;
        let query = Query::new().filter(Predicate::Eq(Field::Left, left + 1));
        self.one(partition, query, "first child")
    }

    pub fn last_child(&self, node: &Node) -> ApplicationResult<Option<Node>> {
        let (_, right, partition) = self.origin(node)?;
        let query = Query::new().filter(Predicate::Eq(Field::Right, right - 1));
        self.one(partition, query, "last child")
    }

    pub fn previous_sibling(&self, node: &Node) -> ApplicationResult<Option<Node>> {
        let (left, _, partition) = self.origin(node)?;
        let query = Query::new().filter(Predicate::Eq(Field::Right, left - 1));
        self.one(partition, query, "previous sibling")
    }

    pub fn next_sibling(&self, node: &Node) -> ApplicationResult<Option<Node>> {
        let (_, right, partition) = self.origin(node)?;
        let query = Query::new().filter(Predicate::Eq(Field::Left, right + 1));
        self.one(partition, query, "next sibling")
    }

    /// Direct children in order, walked from the first child along next siblings.
    pub fn children(&self, node: &Node) -> ApplicationResult<Vec<Node>> {
        let mut children = Vec::new();
        let mut current = self.first_child(node)?;
        while let Some(child) = current {
            current = self.next_sibling(&child)?;
            children.push(child);
        }
        Ok(children)
    }

    /// Enclosing nodes, root first.
    pub fn ancestors(&self, node: &Node) -> ApplicationResult<Vec<Node>> {
        let (left, right, partition) = self.origin(node)?;
        let query = Query::new()
            .filter(Predicate::Lt(Field::Left, left))
            .filter(Predicate::Gt(Field::Right, right))
            .order_by(Field::Left);
        self.store
            .fetch_many(partition, &query)
            .with_store_context("fetch ancestors")
    }

    /// Number of ancestors; the root has depth 0.
    pub fn depth(&self, node: &Node) -> ApplicationResult<usize> {
        let (left, right, partition) = self.origin(node)?;
        let query = Query::new()
            .filter(Predicate::Lt(Field::Left, left))
            .filter(Predicate::Gt(Field::Right, right));
        self.store
            .count_matching(partition, &query)
            .with_store_context("count ancestors")
    }

    pub fn has_parent(&self, node: &Node) -> bool {
        self.mode.is_child(node)
    }

    pub fn has_children(&self, node: &Node) -> bool {
        self.mode.is_valid(node) && !self.mode.is_leaf(node)
    }

    pub fn has_previous_sibling(&self, node: &Node) -> ApplicationResult<bool> {
        Ok(self.previous_sibling(node)?.is_some())
    }

    pub fn has_next_sibling(&self, node: &Node) -> ApplicationResult<bool> {
        Ok(self.next_sibling(node)?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Nested, NodeKey};
    use crate::infrastructure::memory_store::MemoryStore;

    // root(1,10) with a(2,7){a1(3,4), a2(5,6)}, b(8,9)
    fn store() -> MemoryStore {
        MemoryStore::from_rows(vec![
            Node::restore(NodeKey(1), Some(1), Some(10), None),
            Node::restore(NodeKey(2), Some(2), Some(7), None),
            Node::restore(NodeKey(3), Some(3), Some(4), None),
            Node::restore(NodeKey(4), Some(5), Some(6), None),
            Node::restore(NodeKey(5), Some(8), Some(9), None),
        ])
    }

    fn get(store: &MemoryStore, key: u64) -> Node {
        store.fetch_by_key(NodeKey(key)).unwrap().unwrap()
    }

    fn key(node: Option<Node>) -> Option<u64> {
        node.and_then(|n| n.key()).map(|k| k.0)
    }

    #[test]
    fn given_grandchild_when_asking_parent_then_returns_immediate_parent() {
        let store = store();
        let nav = TreeNavigator::new(&store, TreeMode::Single);
        assert_eq!(key(nav.parent(&get(&store, 4)).unwrap()), Some(2));
        assert_eq!(key(nav.parent(&get(&store, 1)).unwrap()), None);
    }

    #[test]
    fn given_inner_node_when_navigating_then_children_and_siblings_resolve() {
        let store = store();
        let nav = TreeNavigator::new(&store, TreeMode::Single);
        let a = get(&store, 2);
        assert_eq!(key(nav.first_child(&a).unwrap()), Some(3));
        assert_eq!(key(nav.last_child(&a).unwrap()), Some(4));
        assert_eq!(key(nav.next_sibling(&a).unwrap()), Some(5));
        assert_eq!(key(nav.previous_sibling(&a).unwrap()), None);
        assert_eq!(key(nav.previous_sibling(&get(&store, 5)).unwrap()), Some(2));
        assert_eq!(key(nav.first_child(&get(&store, 5)).unwrap()), None);
    }

    #[test]
    fn given_root_when_listing_children_then_count_matches_direct_children() {
        let store = store();
        let nav = TreeNavigator::new(&store, TreeMode::Single);
        let children = nav.children(&get(&store, 1)).unwrap();
        let keys: Vec<u64> = children.iter().filter_map(|n| n.key()).map(|k| k.0).collect();
        assert_eq!(keys, vec![2, 5]);
    }

    #[test]
    fn given_nested_node_when_measuring_depth_then_counts_ancestors() {
        let store = store();
        let nav = TreeNavigator::new(&store, TreeMode::Single);
        assert_eq!(nav.depth(&get(&store, 1)).unwrap(), 0);
        assert_eq!(nav.depth(&get(&store, 2)).unwrap(), 1);
        assert_eq!(nav.depth(&get(&store, 4)).unwrap(), 2);

        let path: Vec<i64> = nav
            .ancestors(&get(&store, 4))
            .unwrap()
            .iter()
            .filter_map(|n| n.left())
            .collect();
        assert_eq!(path, vec![1, 2]);
    }

    #[test]
    fn given_multi_tree_store_when_asking_root_without_tree_then_rejected() {
        let store = store();
        let nav = TreeNavigator::new(&store, TreeMode::Multi);
        assert!(nav.root(Partition::Whole).unwrap_err().is_invalid_operand());
    }

    #[test]
    fn given_unsaved_node_when_navigating_then_rejected() {
        let store = store();
        let nav = TreeNavigator::new(&store, TreeMode::Single);
        assert!(nav.parent(&Node::titled("draft")).is_err());
    }
}
