//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/nestset/nestset.toml`
//! 3. Local config: `<dir>/.nestset.toml` (usually the working directory)
//! 4. Environment variables: `NESTSET__*` prefix

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::services::DEFAULT_ROOT_RETRIES;
use crate::application::ApplicationError;
use crate::domain::{TreeConfig, TreeId};

/// Raw tree columns for intermediate parsing; `None` keeps the lower layer.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawTreeConfig {
    pub primary_key: Option<Vec<String>>,
    pub left_field: Option<String>,
    pub right_field: Option<String>,
    pub tree_field: Option<String>,
    pub tree_value: Option<TreeId>,
    pub title_field: Option<String>,
    pub symlink_field: Option<String>,
    pub use_symlinks: Option<bool>,
}

/// Raw settings for intermediate parsing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub store_path: Option<PathBuf>,
    pub max_root_retries: Option<u32>,
    #[serde(default)]
    pub tree: RawTreeConfig,
}

/// Unified configuration for nestset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// TOML file holding the node rows
    pub store_path: PathBuf,
    /// Attempts at assigning a fresh tree id for a new root
    pub max_root_retries: u32,
    /// Column layout of the stored nodes
    pub tree: TreeConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            max_root_retries: DEFAULT_ROOT_RETRIES,
            tree: TreeConfig::default().with_title("title"),
        }
    }
}

/// Default store location (`$XDG_DATA_HOME/nestset/store.toml`).
fn default_store_path() -> PathBuf {
    ProjectDirs::from("", "", "nestset")
        .map(|dirs| dirs.data_dir().join("store.toml"))
        .unwrap_or_else(|| PathBuf::from("~/.nestset/store.toml"))
}

/// Get the XDG config directory for nestset.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "nestset").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("nestset.toml"))
}

/// Get the path to the local config file in a directory.
pub fn local_config_path(dir: &Path) -> PathBuf {
    dir.join(".nestset.toml")
}

/// Expand `~`, `$VAR` and `${VAR}`; unknown variables leave the input as is.
pub fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl RawTreeConfig {
    /// Overlay wins where it says something.
    fn apply_to(&self, base: &TreeConfig) -> TreeConfig {
        TreeConfig {
            primary_key: self
                .primary_key
                .clone()
                .unwrap_or_else(|| base.primary_key.clone()),
            left_field: self
                .left_field
                .clone()
                .unwrap_or_else(|| base.left_field.clone()),
            right_field: self
                .right_field
                .clone()
                .unwrap_or_else(|| base.right_field.clone()),
            tree_field: self.tree_field.clone().or_else(|| base.tree_field.clone()),
            tree_value: self.tree_value.or(base.tree_value),
            title_field: self
                .title_field
                .clone()
                .or_else(|| base.title_field.clone()),
            symlink_field: self
                .symlink_field
                .clone()
                .or_else(|| base.symlink_field.clone()),
            use_symlinks: self.use_symlinks.unwrap_or(base.use_symlinks),
        }
    }
}

impl Settings {
    /// Expand shell variables and tilde in the store path.
    fn expand_paths(&mut self) {
        let expanded = expand_path(self.store_path.to_string_lossy().as_ref());
        self.store_path = PathBuf::from(expanded);
    }

    /// Merge overlay config onto self (base); scalars in the overlay win.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            store_path: overlay
                .store_path
                .clone()
                .unwrap_or_else(|| self.store_path.clone()),
            max_root_retries: overlay.max_root_retries.unwrap_or(self.max_root_retries),
            tree: overlay.tree.apply_to(&self.tree),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `local_dir` - Optional directory searched for `.nestset.toml`
    pub fn load(local_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                let raw = load_raw_settings(&global_path)?;
                current = current.merge_with(&raw);
            }
        }

        if let Some(dir) = local_dir {
            let local_path = local_config_path(dir);
            if local_path.exists() {
                let raw = load_raw_settings(&local_path)?;
                current = current.merge_with(&raw);
            }
        }

        current = Self::apply_env_overrides(current)?;
        current.expand_paths();
        current.validate()?;

        Ok(current)
    }

    /// Load from exactly one file on top of the defaults, skipping the
    /// global layer and the environment.
    pub fn load_file(path: &Path) -> Result<Self, ApplicationError> {
        let raw = load_raw_settings(path)?;
        let mut settings = Self::default().merge_with(&raw);
        settings.expand_paths();
        settings.validate()?;
        Ok(settings)
    }

    /// Apply NESTSET__* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let builder = Config::builder().add_source(
            Environment::with_prefix("NESTSET")
                .separator("__")
                .list_separator(","),
        );

        let config = builder.build().map_err(config_err)?;

        if let Ok(val) = config.get_string("store_path") {
            settings.store_path = PathBuf::from(val);
        }
        if let Ok(val) = config.get::<u32>("max_root_retries") {
            settings.max_root_retries = val;
        }
        if let Ok(val) = config.get_string("tree.left_field") {
            settings.tree.left_field = val;
        }
        if let Ok(val) = config.get_string("tree.right_field") {
            settings.tree.right_field = val;
        }
        if let Ok(val) = config.get_string("tree.tree_field") {
            settings.tree.tree_field = Some(val);
        }
        if let Ok(val) = config.get::<TreeId>("tree.tree_value") {
            settings.tree.tree_value = Some(val);
        }
        if let Ok(val) = config.get_string("tree.title_field") {
            settings.tree.title_field = Some(val);
        }

        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ApplicationError> {
        if self.max_root_retries == 0 {
            return Err(ApplicationError::Config {
                message: "max_root_retries must be at least 1".into(),
            });
        }
        self.tree.validate().map_err(|e| ApplicationError::Config {
            message: format!("[tree] {}", e),
        })
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# nestset configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/nestset/nestset.toml
#   Local:  ./.nestset.toml
#   Env:    NESTSET__* environment variables, e.g. NESTSET__TREE__TREE_FIELD

# Row store file
# store_path = "~/.local/share/nestset/store.toml"

# Attempts at assigning a fresh tree id for a new root
# max_root_retries = 5

[tree]
# primary_key = ["id"]
# left_field = "left_id"
# right_field = "right_id"
# Setting tree_field stores several independent trees in one file
# tree_field = "tree_id"
# Tree used when a command does not name one
# tree_value = 1
# title_field = "title"
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TreeMode;
    use tempfile::TempDir;

    #[test]
    fn given_defaults_when_validating_then_single_tree_with_titles() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.tree.mode(), TreeMode::Single);
        assert_eq!(settings.tree.title_field.as_deref(), Some("title"));
        assert_eq!(settings.max_root_retries, 5);
    }

    #[test]
    fn given_tilde_in_store_path_when_expand_paths_then_expands_to_home() {
        let mut settings = Settings {
            store_path: PathBuf::from("~/trees/store.toml"),
            ..Settings::default()
        };

        settings.expand_paths();

        let home = std::env::var("HOME").expect("HOME should be set");
        let path = settings.store_path.to_string_lossy();
        assert!(path.starts_with(&home), "store_path should start with home: {}", path);
        assert!(!path.contains('~'));
    }

    #[test]
    fn given_partial_overlay_when_merging_then_unset_keys_keep_base() {
        let raw: RawSettings = toml::from_str(
            r#"
            max_root_retries = 3
            [tree]
            tree_field = "tree_id"
            tree_value = 2
            "#,
        )
        .unwrap();

        let merged = Settings::default().merge_with(&raw);

        assert_eq!(merged.max_root_retries, 3);
        assert_eq!(merged.tree.mode(), TreeMode::Multi);
        assert_eq!(merged.tree.tree_value, Some(2));
        assert_eq!(merged.tree.left_field, "left_id");
        assert_eq!(merged.tree.title_field.as_deref(), Some("title"));
        assert_eq!(merged.store_path, Settings::default().store_path);
    }

    #[test]
    fn given_config_file_when_loading_then_file_values_apply() {
        let dir = TempDir::new().unwrap();
        let path = local_config_path(dir.path());
        std::fs::write(
            &path,
            "store_path = \"/tmp/nodes.toml\"\n[tree]\nleft_field = \"lft\"\nright_field = \"rgt\"\n",
        )
        .unwrap();

        let settings = Settings::load_file(&path).unwrap();

        assert_eq!(settings.store_path, PathBuf::from("/tmp/nodes.toml"));
        assert_eq!(settings.tree.left_field, "lft");
        assert_eq!(settings.tree.right_field, "rgt");
    }

    #[test]
    fn given_duplicate_columns_when_loading_then_config_error() {
        let dir = TempDir::new().unwrap();
        let path = local_config_path(dir.path());
        std::fs::write(&path, "[tree]\nleft_field = \"pos\"\nright_field = \"pos\"\n").unwrap();

        let err = Settings::load_file(&path).unwrap_err();
        assert!(matches!(err, ApplicationError::Config { .. }));
    }

    #[test]
    fn given_settings_when_rendering_toml_then_tree_table_is_present() {
        let rendered = Settings::default().to_toml().unwrap();
        assert!(rendered.contains("[tree]"));
        assert!(rendered.contains("left_field = \"left_id\""));
    }
}
