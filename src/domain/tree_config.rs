//! Per-node-type tree configuration: which columns hold the nested-set data.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::arithmetic::TreeMode;
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::node::{Partition, TreeId};

/// Column names and switches for one kind of tree node.
///
/// Resolved and validated once when a tree service is set up, then shared
/// read-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TreeConfig {
    /// Primary key columns; exactly one is supported
    pub primary_key: Vec<String>,
    /// Column holding the left index
    pub left_field: String,
    /// Column holding the right index
    pub right_field: String,
    /// Column holding the tree id; enables multi-tree mode when set
    pub tree_field: Option<String>,
    /// Tree used when a command does not name one
    pub tree_value: Option<TreeId>,
    /// Column holding the node title, used for dump paths
    pub title_field: Option<String>,
    /// Column reserved for symlink references
    pub symlink_field: Option<String>,
    /// Reserved; symlinks are not resolved by the engine
    pub use_symlinks: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            primary_key: vec!["id".into()],
            left_field: "left_id".into(),
            right_field: "right_id".into(),
            tree_field: None,
            tree_value: None,
            title_field: None,
            symlink_field: Some("symlink_id".into()),
            use_symlinks: false,
        }
    }
}

impl TreeConfig {
    /// Multi-tree configuration with the conventional `tree_id` column.
    pub fn multi_tree() -> Self {
        Self {
            tree_field: Some("tree_id".into()),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, field: impl Into<String>) -> Self {
        self.title_field = Some(field.into());
        self
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.primary_key.len() != 1 {
            return Err(DomainError::Configuration(format!(
                "exactly one primary key column is supported, got {}",
                self.primary_key.len()
            )));
        }

        let mut seen = HashSet::new();
        for (role, name) in self.columns() {
            if name.trim().is_empty() {
                return Err(DomainError::Configuration(format!("{} is empty", role)));
            }
            if !seen.insert(name) {
                return Err(DomainError::Configuration(format!(
                    "column '{}' is configured more than once",
                    name
                )));
            }
        }

        if self.use_symlinks && self.symlink_field.is_none() {
            return Err(DomainError::Configuration(
                "use_symlinks requires symlink_field".into(),
            ));
        }
        match (self.tree_field.as_ref(), self.tree_value) {
            (None, Some(_)) => Err(DomainError::Configuration(
                "tree_value requires tree_field".into(),
            )),
            (Some(_), Some(v)) if v <= 0 => Err(DomainError::Configuration(format!(
                "tree_value must be positive, got {}",
                v
            ))),
            _ => Ok(()),
        }
    }

    /// Every configured column with its role, primary key first.
    fn columns(&self) -> Vec<(&'static str, &str)> {
        let mut columns = vec![
            ("primary_key", self.primary_key[0].as_str()),
            ("left_field", self.left_field.as_str()),
            ("right_field", self.right_field.as_str()),
        ];
        if let Some(f) = &self.tree_field {
            columns.push(("tree_field", f));
        }
        if let Some(f) = &self.title_field {
            columns.push(("title_field", f));
        }
        if let Some(f) = &self.symlink_field {
            columns.push(("symlink_field", f));
        }
        columns
    }

    pub fn mode(&self) -> TreeMode {
        if self.tree_field.is_some() {
            TreeMode::Multi
        } else {
            TreeMode::Single
        }
    }

    pub fn key_field(&self) -> &str {
        self.primary_key.first().map(String::as_str).unwrap_or("id")
    }

    /// Columns callers may never write directly.
    pub fn readonly_fields(&self) -> Vec<&str> {
        [
            Some(self.left_field.as_str()),
            Some(self.right_field.as_str()),
            self.tree_field.as_deref(),
            self.symlink_field.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Payload attributes may not shadow the key, index or title columns.
    /// The title is set through `Node::title`, never as an attribute.
    pub fn check_writable(&self, field: &str) -> DomainResult<()> {
        if field == self.key_field() || self.readonly_fields().contains(&field) {
            return Err(DomainError::invalid(format!("field '{}' is read-only", field)));
        }
        if self.title_field.as_deref() == Some(field) {
            return Err(DomainError::invalid(format!(
                "field '{}' holds the title, set it as the node title",
                field
            )));
        }
        Ok(())
    }

    /// Partition used when the caller names none.
    pub fn default_partition(&self) -> Option<Partition> {
        match self.mode() {
            TreeMode::Single => Some(Partition::Whole),
            TreeMode::Multi => self.tree_value.map(Partition::Tree),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_defaults_when_validating_then_single_tree_config_is_accepted() {
        let config = TreeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.mode(), TreeMode::Single);
        assert_eq!(config.default_partition(), Some(Partition::Whole));
    }

    #[test]
    fn given_composite_primary_key_when_validating_then_rejected() {
        let config = TreeConfig {
            primary_key: vec!["a".into(), "b".into()],
            ..TreeConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(DomainError::Configuration(_))
        ));
    }

    #[test]
    fn given_duplicate_columns_when_validating_then_rejected() {
        let config = TreeConfig {
            right_field: "left_id".into(),
            ..TreeConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn given_tree_value_without_tree_field_when_validating_then_rejected() {
        let config = TreeConfig {
            tree_value: Some(3),
            ..TreeConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn given_multi_tree_config_when_writing_index_columns_then_rejected() {
        let config = TreeConfig::multi_tree().with_title("name");
        assert!(config.check_writable("left_id").is_err());
        assert!(config.check_writable("tree_id").is_err());
        assert!(config.check_writable("symlink_id").is_err());
        assert!(config.check_writable("id").is_err());
        assert!(config.check_writable("color").is_ok());
    }

    #[test]
    fn given_title_field_when_writing_it_as_attribute_then_rejected() {
        let config = TreeConfig::default().with_title("name");
        assert!(matches!(
            config.check_writable("name"),
            Err(DomainError::InvalidOperand(_))
        ));
        assert!(TreeConfig::default().check_writable("name").is_ok());
    }
}
