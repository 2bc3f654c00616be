//! TOML file backed `NodeStore`.
//!
//! The file holds `next_key` and one `[[nodes]]` table per row. Column names
//! come from the tree configuration, so the same file layout serves any node
//! type:
//!
//! ```toml
//! next_key = 3
//!
//! [[nodes]]
//! id = 1
//! left_id = 1
//! right_id = 4
//! title = "root"
//! ```
//!
//! Rows are held in a `MemoryStore`; a committed batch rewrites the file
//! atomically (temp file in the same directory, then rename).
//!
//! Payload columns are text inside a `Node`. Non-string values read from the
//! file are written back with their original TOML type as long as their text
//! is unchanged.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use toml::{Table, Value};
use tracing::{debug, instrument};

use crate::domain::{Nested, Node, NodeKey, Partition, Query, TreeConfig, TreeId};
use crate::infrastructure::error::{StoreError, StoreResult};
use crate::infrastructure::memory_store::MemoryStore;
use crate::infrastructure::traits::NodeStore;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    next_key: u64,
    #[serde(default)]
    nodes: Vec<Table>,
}

/// Non-string payload values as loaded, by row and column.
type TypedColumns = HashMap<(NodeKey, String), Value>;

pub struct FileStore {
    path: PathBuf,
    config: Arc<TreeConfig>,
    rows: MemoryStore,
    typed: TypedColumns,
}

impl FileStore {
    /// Open the store at `path`; a missing file is an empty store.
    #[instrument(level = "debug", skip(config))]
    pub fn open(path: &Path, config: Arc<TreeConfig>) -> StoreResult<Self> {
        let mut typed = TypedColumns::new();
        let rows = if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| StoreError::io(format!("read {}", path.display()), e))?;
            let document: StoreDocument = toml::from_str(&content).map_err(|e| {
                StoreError::Corrupt {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                }
            })?;
            let nodes = document
                .nodes
                .iter()
                .map(|row| row_to_node(row, &config, path, &mut typed))
                .collect::<StoreResult<Vec<Node>>>()?;
            debug!("loaded {} rows from {}", nodes.len(), path.display());
            MemoryStore::from_rows(nodes)
        } else {
            debug!("no store at {}, starting empty", path.display());
            MemoryStore::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            config,
            rows,
            typed,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write all rows to disk.
    #[instrument(level = "debug", skip(self), fields(path = %self.path.display()))]
    pub fn save(&self) -> StoreResult<()> {
        let (nodes, next_key) = self.rows.export()?;
        let document = StoreDocument {
            next_key,
            nodes: nodes
                .iter()
                .map(|n| node_to_row(n, &self.config, &self.typed))
                .collect(),
        };
        let content = toml::to_string_pretty(&document)
            .map_err(|e| StoreError::Backend(format!("serialize store: {}", e)))?;

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)
            .map_err(|e| StoreError::io(format!("create {}", dir.display()), e))?;
        let mut tmp = NamedTempFile::new_in(&dir)
            .map_err(|e| StoreError::io(format!("temp file in {}", dir.display()), e))?;
        tmp.write_all(content.as_bytes())
            .map_err(|e| StoreError::io("write temp store", e))?;
        tmp.persist(&self.path)
            .map_err(|e| StoreError::io(format!("replace {}", self.path.display()), e.error))?;
        debug!("saved {} rows", nodes.len());
        Ok(())
    }

    /// Writes outside a batch go to disk right away.
    fn autosave(&self) -> StoreResult<()> {
        if self.rows.in_batch()? {
            return Ok(());
        }
        self.save()
    }
}

fn int_column(row: &Table, column: &str, path: &Path) -> StoreResult<Option<i64>> {
    match row.get(column) {
        None => Ok(None),
        Some(Value::Integer(i)) => Ok(Some(*i)),
        Some(other) => Err(StoreError::Corrupt {
            path: path.to_path_buf(),
            message: format!("column '{}' is not an integer: {}", column, other),
        }),
    }
}

fn is_index_column(config: &TreeConfig, column: &str) -> bool {
    column == config.key_field()
        || column == config.left_field
        || column == config.right_field
        || config.tree_field.as_deref() == Some(column)
}

fn column_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn row_to_node(
    row: &Table,
    config: &TreeConfig,
    path: &Path,
    typed: &mut TypedColumns,
) -> StoreResult<Node> {
    let key_field = config.key_field();
    let key = int_column(row, key_field, path)?
        .and_then(|k| u64::try_from(k).ok())
        .ok_or_else(|| StoreError::Corrupt {
            path: path.to_path_buf(),
            message: format!("row without a valid '{}' column", key_field),
        })?;
    let left = int_column(row, &config.left_field, path)?;
    let right = int_column(row, &config.right_field, path)?;
    let tree_id = match &config.tree_field {
        Some(column) => int_column(row, column, path)?,
        None => None,
    };

    let mut node = Node::restore(NodeKey(key), left, right, tree_id);
    for (column, value) in row {
        if is_index_column(config, column) {
            continue;
        }
        let text = column_text(value);
        if config.title_field.as_ref() == Some(column) {
            node.title = Some(text);
        } else {
            if !value.is_str() {
                typed.insert((NodeKey(key), column.clone()), value.clone());
            }
            node.attributes.insert(column.clone(), text);
        }
    }
    Ok(node)
}

fn node_to_row(node: &Node, config: &TreeConfig, typed: &TypedColumns) -> Table {
    let mut row = Table::new();
    for (column, value) in &node.attributes {
        // written from the node's own fields below
        if is_index_column(config, column) || config.title_field.as_ref() == Some(column) {
            continue;
        }
        let original = node
            .key()
            .and_then(|key| typed.get(&(key, column.clone())))
            .filter(|original| column_text(original) == *value);
        let cell = match original {
            Some(original) => original.clone(),
            None => Value::String(value.clone()),
        };
        row.insert(column.clone(), cell);
    }
    if let (Some(column), Some(title)) = (&config.title_field, &node.title) {
        row.insert(column.clone(), Value::String(title.clone()));
    }
    if let Some(key) = node.key() {
        row.insert(config.key_field().to_string(), Value::Integer(key.0 as i64));
    }
    if let Some(left) = node.left() {
        row.insert(config.left_field.clone(), Value::Integer(left));
    }
    if let Some(right) = node.right() {
        row.insert(config.right_field.clone(), Value::Integer(right));
    }
    if let (Some(column), Some(tree_id)) = (&config.tree_field, node.tree_id()) {
        row.insert(column.clone(), Value::Integer(tree_id));
    }
    row
}

impl NodeStore for FileStore {
    fn fetch_many(&self, partition: Partition, query: &Query) -> StoreResult<Vec<Node>> {
        self.rows.fetch_many(partition, query)
    }

    fn fetch_by_key(&self, key: NodeKey) -> StoreResult<Option<Node>> {
        self.rows.fetch_by_key(key)
    }

    fn count_matching(&self, partition: Partition, query: &Query) -> StoreResult<usize> {
        self.rows.count_matching(partition, query)
    }

    fn persist(&self, node: &Node) -> StoreResult<NodeKey> {
        let key = self.rows.persist(node)?;
        self.autosave()?;
        Ok(key)
    }

    fn delete_matching(&self, partition: Partition, query: &Query) -> StoreResult<usize> {
        let removed = self.rows.delete_matching(partition, query)?;
        self.autosave()?;
        Ok(removed)
    }

    fn max_tree_id(&self) -> StoreResult<Option<TreeId>> {
        self.rows.max_tree_id()
    }

    fn begin_batch(&self) -> StoreResult<()> {
        self.rows.begin_batch()
    }

    /// Saves before releasing the snapshot, so a failed write can still be
    /// rolled back.
    fn commit(&self) -> StoreResult<()> {
        if !self.rows.in_batch()? {
            return Err(StoreError::NoBatch);
        }
        self.save()?;
        self.rows.commit()
    }

    fn rollback(&self) -> StoreResult<()> {
        self.rows.rollback()
    }
}
