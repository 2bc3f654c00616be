//! Index arithmetic: relationship predicates computed from `(left, right, tree_id)`.
//!
//! Everything here is pure. Results depend only on the operands, never on the
//! store, so a stale node gives a stale answer.

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::node::{Nested, Partition};

/// Whether rows are partitioned by a tree-id column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeMode {
    Single,
    Multi,
}

impl TreeMode {
    /// A node is valid when it is saved and carries a well-formed interval
    /// (and, for multi-tree stores, a positive tree id).
    pub fn is_valid<N: Nested + ?Sized>(&self, node: &N) -> bool {
        if !node.is_persisted() {
            return false;
        }
        let (Some(left), Some(right)) = (node.left(), node.right()) else {
            return false;
        };
        if left <= 0 || right <= 0 || left >= right {
            return false;
        }
        match self {
            TreeMode::Single => true,
            TreeMode::Multi => node.tree_id().is_some_and(|id| id > 0),
        }
    }

    pub fn is_root<N: Nested + ?Sized>(&self, node: &N) -> bool {
        self.is_valid(node) && node.left() == Some(1)
    }

    pub fn is_leaf<N: Nested + ?Sized>(&self, node: &N) -> bool {
        self.is_valid(node)
            && matches!((node.left(), node.right()), (Some(l), Some(r)) if r - l == 1)
    }

    /// Valid and not a root.
    pub fn is_child<N: Nested + ?Sized>(&self, node: &N) -> bool {
        self.is_valid(node) && !self.is_root(node)
    }

    /// Bounds of a valid node, or `InvalidOperand` naming the node's role.
    pub fn bounds<N: Nested + ?Sized>(&self, node: &N, role: &str) -> DomainResult<(i64, i64)> {
        if !self.is_valid(node) {
            return Err(DomainError::invalid(format!(
                "{} is not a saved tree node with valid indices",
                role
            )));
        }
        match (node.left(), node.right()) {
            (Some(l), Some(r)) => Ok((l, r)),
            _ => Err(DomainError::invalid(format!("{} has no indices", role))),
        }
    }

    /// Partition a valid node belongs to.
    pub fn partition_of<N: Nested + ?Sized>(&self, node: &N) -> DomainResult<Partition> {
        match self {
            TreeMode::Single => Ok(Partition::Whole),
            TreeMode::Multi => node
                .tree_id()
                .filter(|id| *id > 0)
                .map(Partition::Tree)
                .ok_or_else(|| DomainError::invalid("node has no tree id")),
        }
    }

    pub fn same_partition<A, B>(&self, a: &A, b: &B) -> bool
    where
        A: Nested + ?Sized,
        B: Nested + ?Sized,
    {
        match self {
            TreeMode::Single => true,
            TreeMode::Multi => a.tree_id().is_some() && a.tree_id() == b.tree_id(),
        }
    }

    /// Rejects operand pairs that live in different trees.
    pub fn require_same_partition<A, B>(&self, a: &A, b: &B) -> DomainResult<Partition>
    where
        A: Nested + ?Sized,
        B: Nested + ?Sized,
    {
        if !self.same_partition(a, b) {
            return Err(DomainError::invalid(format!(
                "nodes belong to different trees ({:?} vs {:?})",
                a.tree_id(),
                b.tree_id()
            )));
        }
        self.partition_of(a)
    }

    /// Number of descendants: `(right - left - 1) / 2`.
    pub fn child_count<N: Nested + ?Sized>(&self, node: &N) -> DomainResult<u64> {
        let (left, right) = self.bounds(node, "node")?;
        let inner = right - left - 1;
        if inner < 0 || inner % 2 != 0 {
            return Err(DomainError::violation(format!(
                "interval [{}, {}] does not enclose a whole number of nodes",
                left, right
            )));
        }
        Ok((inner / 2) as u64)
    }

    /// Strict nesting of `node` inside `ancestor`.
    pub fn is_child_of<A, B>(&self, node: &A, ancestor: &B) -> DomainResult<bool>
    where
        A: Nested + ?Sized,
        B: Nested + ?Sized,
    {
        if !self.is_valid(node) || !self.is_valid(ancestor) {
            return Ok(false);
        }
        if !self.same_partition(node, ancestor) {
            return Err(DomainError::invalid(
                "cannot relate nodes from different trees",
            ));
        }
        Ok(matches!(
            (node.left(), node.right(), ancestor.left(), ancestor.right()),
            (Some(nl), Some(nr), Some(al), Some(ar)) if nl > al && nr < ar
        ))
    }

    pub fn is_parent_of<A, B>(&self, node: &A, descendant: &B) -> DomainResult<bool>
    where
        A: Nested + ?Sized,
        B: Nested + ?Sized,
    {
        self.is_child_of(descendant, node)
    }
}

/// Check one partition's rows against the nested-set invariant.
///
/// Rows must be sorted by `left`. The indices have to be exactly `1..=2N`,
/// intervals must nest without overlap and a single root must enclose all.
pub fn check_numbering<N: Nested>(rows: &[N]) -> DomainResult<()> {
    let mut seen = vec![false; rows.len() * 2 + 1];
    let mut open: Vec<i64> = Vec::new();
    let max = (rows.len() * 2) as i64;

    for (i, row) in rows.iter().enumerate() {
        let (Some(left), Some(right)) = (row.left(), row.right()) else {
            return Err(DomainError::violation(format!("row {} has no indices", i)));
        };
        if left >= right {
            return Err(DomainError::violation(format!(
                "interval [{}, {}] is empty or reversed",
                left, right
            )));
        }
        for index in [left, right] {
            if index < 1 || index > max {
                return Err(DomainError::violation(format!(
                    "index {} lies outside 1..={}",
                    index, max
                )));
            }
            let slot = &mut seen[index as usize];
            if *slot {
                return Err(DomainError::violation(format!("index {} is used twice", index)));
            }
            *slot = true;
        }

        while open.last().is_some_and(|r| *r < left) {
            open.pop();
        }
        match open.last() {
            Some(parent_right) if right > *parent_right => {
                return Err(DomainError::violation(format!(
                    "interval [{}, {}] overlaps its enclosing interval ending at {}",
                    left, right, parent_right
                )));
            }
            None if i > 0 => {
                return Err(DomainError::violation(format!(
                    "interval [{}, {}] is a second root",
                    left, right
                )));
            }
            _ => {}
        }
        open.push(right);
    }
    // 2N distinct indices inside 1..=2N leave no gap
    Ok(())
}
