//! Subtree mover: relocates a contiguous subtree within its partition.

use std::fmt;

use tracing::{debug, instrument};

use crate::application::error_ext::StoreResultExt;
use crate::application::services::shift::RangeShifter;
use crate::application::ApplicationResult;
use crate::domain::{DomainError, Field, Node, Predicate, Query, TreeMode};
use crate::infrastructure::traits::NodeStore;

/// Where a node goes relative to a target node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    NextSiblingOf,
    PreviousSiblingOf,
    FirstChildOf,
    LastChildOf,
}

impl Placement {
    /// Index the node will be inserted in front of.
    pub fn destination(&self, target_left: i64, target_right: i64) -> i64 {
        match self {
            Placement::NextSiblingOf => target_right + 1,
            Placement::PreviousSiblingOf => target_left,
            Placement::FirstChildOf => target_left + 1,
            Placement::LastChildOf => target_right,
        }
    }

    pub fn is_sibling(&self) -> bool {
        matches!(
            self,
            Placement::NextSiblingOf | Placement::PreviousSiblingOf
        )
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Placement::NextSiblingOf => "next sibling of",
            Placement::PreviousSiblingOf => "previous sibling of",
            Placement::FirstChildOf => "first child of",
            Placement::LastChildOf => "last child of",
        };
        write!(f, "{}", s)
    }
}

/// Checks a target for `placement` and returns the destination index.
///
/// A tree has exactly one root, so a root target takes children only.
pub fn destination_for(
    mode: TreeMode,
    placement: Placement,
    target: &Node,
) -> ApplicationResult<i64> {
    let (left, right) = mode.bounds(target, "target")?;
    if placement.is_sibling() && left == 1 {
        return Err(DomainError::invalid("the tree root cannot have siblings").into());
    }
    Ok(placement.destination(left, right))
}

pub struct SubtreeMover<'a> {
    store: &'a dyn NodeStore,
    mode: TreeMode,
}

impl<'a> SubtreeMover<'a> {
    pub fn new(store: &'a dyn NodeStore, mode: TreeMode) -> Self {
        Self { store, mode }
    }

    /// Move `node` and its descendants to `placement` of `target`.
    ///
    /// Both nodes must be current rows of the same partition. On success
    /// `node` carries its new indices; `target` is left stale.
    pub fn move_to(
        &self,
        node: &mut Node,
        placement: Placement,
        target: &Node,
    ) -> ApplicationResult<()> {
        self.mode.bounds(node, "moving node")?;
        self.mode.require_same_partition(node, target)?;
        let destination = destination_for(self.mode, placement, target)?;
        debug!("move {} to {} {}", node, placement, target);
        self.move_subtree(node, destination)
    }

    /// Relocate the subtree rooted at `node` so it starts at `destination`,
    /// counted before the move.
    ///
    /// Three steps, in this order: open a gap at the destination, shift the
    /// subtree into it, close the hole it left.
    #[instrument(level = "debug", skip(self, node), fields(node = %node))]
    pub fn move_subtree(&self, node: &mut Node, destination: i64) -> ApplicationResult<()> {
        let (left, right) = self.mode.bounds(node, "moving node")?;
        if destination > left && destination <= right {
            return Err(DomainError::invalid("cannot move a node into its own subtree").into());
        }
        if destination < 2 {
            return Err(DomainError::invalid(format!(
                "destination {} lies outside the tree",
                destination
            ))
            .into());
        }

        let partition = self.mode.partition_of(node)?;
        let root = self
            .store
            .fetch_one(partition, &Query::new().filter(Predicate::Eq(Field::Left, 1)))
            .with_store_context("fetch partition root")?
            .ok_or_else(|| DomainError::violation(format!("{} has no root", partition)))?;
        let (_, root_right) = self.mode.bounds(&root, "partition root")?;
        if destination > root_right {
            return Err(DomainError::invalid(format!(
                "destination {} lies outside the tree [1, {}]",
                destination, root_right
            ))
            .into());
        }

        let shifter = RangeShifter::new(self.store, partition);
        let size = right - left + 1;
        let (mut origin_left, mut origin_right) = (left, right);

        shifter.shift_from(destination, size)?;
        if left >= destination {
            origin_left += size;
            origin_right += size;
        }
        shifter.shift_range(origin_left, origin_right, destination - origin_left)?;
        shifter.shift_from(origin_right + 1, -size)?;

        let new_left = if destination > left {
            destination - size
        } else {
            destination
        };
        node.set_bounds(new_left, new_left + size - 1);
        debug!("moved subtree [{}, {}] to [{}, {}]", left, right, new_left, new_left + size - 1);
        Ok(())
    }
}
