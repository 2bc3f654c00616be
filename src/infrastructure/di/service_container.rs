//! Service container for dependency injection
//!
//! Wires the tree service to its store.

use std::sync::Arc;

use crate::application::services::TreeService;
use crate::config::Settings;
use crate::infrastructure::error::{InfraError, InfraResult};
use crate::infrastructure::file_store::FileStore;
use crate::infrastructure::traits::NodeStore;

/// Container holding the configured store and services.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Row store backing every tree
    pub store: Arc<dyn NodeStore>,

    /// Tree operations over `store`
    pub trees: TreeService,
}

impl ServiceContainer {
    /// Create a container backed by the TOML file at `settings.store_path`.
    pub fn new(settings: Settings) -> InfraResult<Self> {
        let config = Arc::new(settings.tree.clone());
        let store = FileStore::open(&settings.store_path, config).map_err(|e| {
            InfraError::store(
                format!("open store {}", settings.store_path.display()),
                e,
            )
        })?;
        Self::with_deps(settings, Arc::new(store))
    }

    /// Create a container with a custom store (for testing).
    pub fn with_deps(settings: Settings, store: Arc<dyn NodeStore>) -> InfraResult<Self> {
        let settings = Arc::new(settings);
        let trees = TreeService::new(Arc::clone(&store), Arc::new(settings.tree.clone()))?
            .with_root_retries(settings.max_root_retries);

        Ok(Self {
            settings,
            store,
            trees,
        })
    }
}
