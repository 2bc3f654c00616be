//! Shared setup for unit and integration tests

use std::env;
use std::sync::Once;

use tracing::{debug, info};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

use crate::domain::{Nested, Node, NodeKey, Partition, Query, TreeId};
use crate::infrastructure::memory_store::MemoryStore;
use crate::infrastructure::traits::NodeStore;

static TEST_SETUP: Once = Once::new();

pub fn init_test_setup() {
    TEST_SETUP.call_once(|| {
        if env::var("RUST_LOG").is_err() {
            env::set_var("RUST_LOG", "nestset=debug");
        }
        setup_test_logging();
        info!("Test Setup complete");
    });
}

fn setup_test_logging() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nestset=debug"));

    let subscriber = tracing_subscriber::registry().with(
        fmt::layer()
            .with_test_writer()
            .with_target(true)
            .with_thread_names(false)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(env_filter),
    );

    // Only set if we haven't already set a global subscriber
    if tracing::dispatcher::has_been_set() {
        debug!("Tracing subscriber already set");
    } else {
        subscriber.try_init().unwrap_or_else(|e| {
            eprintln!("Error: Failed to set up logging: {}", e);
        });
    }
}

/// Memory store holding rows `(key, left, right, tree_id)`.
pub fn store_with(rows: &[(u64, i64, i64, Option<TreeId>)]) -> MemoryStore {
    MemoryStore::from_rows(
        rows.iter()
            .map(|(key, l, r, tree)| Node::restore(NodeKey(*key), Some(*l), Some(*r), *tree)),
    )
}

/// `(key, left, right)` of every row in `partition`, ordered by key.
pub fn snapshot(store: &dyn NodeStore, partition: Partition) -> Vec<(u64, i64, i64)> {
    let mut rows: Vec<(u64, i64, i64)> = store
        .fetch_many(partition, &Query::new())
        .unwrap_or_default()
        .iter()
        .filter_map(|n| Some((n.key()?.0, n.left()?, n.right()?)))
        .collect();
    rows.sort();
    rows
}
