//! Tree nodes and the partition they live in

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of one independent tree in a multi-tree store.
pub type TreeId = i64;

/// Primary key of a stored node, assigned by the store on first persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKey(pub u64);

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Set of rows sharing one index numbering.
///
/// `Whole` applies no tree filter: the entire store of a single-tree setup,
/// or every tree at once for store-wide operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    Whole,
    Tree(TreeId),
}

impl Partition {
    pub fn tree_id(&self) -> Option<TreeId> {
        match self {
            Partition::Whole => None,
            Partition::Tree(id) => Some(*id),
        }
    }

    /// Whether a node's tree id falls inside this partition.
    pub fn contains<N: Nested + ?Sized>(&self, node: &N) -> bool {
        match self {
            Partition::Whole => true,
            Partition::Tree(id) => node.tree_id() == Some(*id),
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Partition::Whole => write!(f, "whole store"),
            Partition::Tree(id) => write!(f, "tree {}", id),
        }
    }
}

/// Read-only view of the columns index arithmetic works on.
///
/// Anything stored as a nested-set row implements this; the engine never
/// inspects payload fields.
pub trait Nested {
    fn is_persisted(&self) -> bool;
    fn left(&self) -> Option<i64>;
    fn right(&self) -> Option<i64>;
    fn tree_id(&self) -> Option<TreeId>;
}

/// One row of a nested-set store.
///
/// Index columns and the tree id have getters only. They are assigned by the
/// tree operations, never by callers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Node {
    key: Option<NodeKey>,
    left: Option<i64>,
    right: Option<i64>,
    tree_id: Option<TreeId>,
    /// Display title, used for dump paths when a title field is configured
    pub title: Option<String>,
    /// Domain payload
    pub attributes: BTreeMap<String, String>,
}

impl Node {
    /// New, unsaved node without position.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Rebuild a node from a stored row. Meant for store backends only.
    pub fn restore(
        key: NodeKey,
        left: Option<i64>,
        right: Option<i64>,
        tree_id: Option<TreeId>,
    ) -> Self {
        Self {
            key: Some(key),
            left,
            right,
            tree_id,
            ..Self::default()
        }
    }

    pub fn key(&self) -> Option<NodeKey> {
        self.key
    }

    /// `(left, right)` when both indices are present.
    pub fn bounds(&self) -> Option<(i64, i64)> {
        Some((self.left?, self.right?))
    }

    /// Interval width, twice the number of nodes in the subtree.
    pub fn width(&self) -> Option<i64> {
        self.bounds().map(|(l, r)| r - l + 1)
    }

    pub(crate) fn set_bounds(&mut self, left: i64, right: i64) {
        self.left = Some(left);
        self.right = Some(right);
    }

    pub(crate) fn set_tree_id(&mut self, tree_id: Option<TreeId>) {
        self.tree_id = tree_id;
    }

    pub(crate) fn assign_key(&mut self, key: NodeKey) {
        self.key = Some(key);
    }
}

impl Nested for Node {
    fn is_persisted(&self) -> bool {
        self.key.is_some()
    }

    fn left(&self) -> Option<i64> {
        self.left
    }

    fn right(&self) -> Option<i64> {
        self.right
    }

    fn tree_id(&self) -> Option<TreeId> {
        self.tree_id
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.key {
            Some(key) => write!(f, "#{}", key)?,
            None => write!(f, "#new")?,
        }
        if let Some((l, r)) = self.bounds() {
            write!(f, " [{}, {}]", l, r)?;
        }
        if let Some(title) = &self.title {
            write!(f, " {}", title)?;
        }
        Ok(())
    }
}
