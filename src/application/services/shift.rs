//! Range shifter: moves index ranges of one partition by a signed delta.
//!
//! Every structural change is built from these two primitives. They persist
//! row by row, so callers must run them inside an open store batch.

use tracing::{debug, instrument};

use crate::application::error_ext::StoreResultExt;
use crate::application::ApplicationResult;
use crate::domain::{DomainError, Field, Node, Partition, Predicate, Query};
use crate::infrastructure::traits::NodeStore;

pub struct RangeShifter<'a> {
    store: &'a dyn NodeStore,
    partition: Partition,
}

impl<'a> RangeShifter<'a> {
    pub fn new(store: &'a dyn NodeStore, partition: Partition) -> Self {
        Self { store, partition }
    }

    /// Add `delta` to every `left >= threshold` and every `right >= threshold`.
    ///
    /// Nodes enclosing the threshold only have their right index moved, so a
    /// gap opens (or closes) inside them. Returns the number of rows touched.
    #[instrument(level = "debug", skip(self), fields(partition = %self.partition))]
    pub fn shift_from(&self, threshold: i64, delta: i64) -> ApplicationResult<usize> {
        if delta == 0 {
            return Ok(0);
        }
        let query = Query::new().filter(Predicate::Ge(Field::Right, threshold));
        let rows = self
            .store
            .fetch_many(self.partition, &query)
            .with_store_context("select rows to shift")?;

        for mut row in rows.iter().cloned() {
            let (left, right) = indices(&row)?;
            let left = if left >= threshold { left + delta } else { left };
            row.set_bounds(left, right + delta);
            self.store
                .persist(&row)
                .with_store_context("persist shifted row")?;
        }
        debug!("shifted {} rows from {} by {}", rows.len(), threshold, delta);
        Ok(rows.len())
    }

    /// Add `delta` to both indices of every node inside `[low, high]`.
    ///
    /// Used to relocate a whole subtree as one block.
    #[instrument(level = "debug", skip(self), fields(partition = %self.partition))]
    pub fn shift_range(&self, low: i64, high: i64, delta: i64) -> ApplicationResult<usize> {
        if delta == 0 {
            return Ok(0);
        }
        let query = Query::new()
            .filter(Predicate::Ge(Field::Left, low))
            .filter(Predicate::Le(Field::Right, high));
        let rows = self
            .store
            .fetch_many(self.partition, &query)
            .with_store_context("select range to shift")?;

        for mut row in rows.iter().cloned() {
            let (left, right) = indices(&row)?;
            row.set_bounds(left + delta, right + delta);
            self.store
                .persist(&row)
                .with_store_context("persist shifted row")?;
        }
        debug!("shifted {} rows in [{}, {}] by {}", rows.len(), low, high, delta);
        Ok(rows.len())
    }
}

fn indices(row: &Node) -> ApplicationResult<(i64, i64)> {
    row.bounds().ok_or_else(|| {
        DomainError::violation(format!("row {} has no indices", row)).into()
    })
}
