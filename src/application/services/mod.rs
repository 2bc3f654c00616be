//! Application services
//!
//! The tree service is the entry point. The shifter, mover and navigator are
//! the building blocks it composes; they borrow a store and never open
//! batches themselves.

mod mover;
mod navigator;
mod shift;
mod tree;

pub use mover::{destination_for, Placement, SubtreeMover};
pub use navigator::TreeNavigator;
pub use shift::RangeShifter;
pub use tree::{SubtreeDump, TreeService, DEFAULT_ROOT_RETRIES};
