//! Application state

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::dataset::DatasetStore;
use crate::storage::Storage;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Server configuration
    pub config: Arc<ServerConfig>,

    /// Dataset state engine
    pub datasets: Arc<DatasetStore>,
}

impl AppState {
    /// Create new application state
    pub fn new(config: ServerConfig) -> Self {
        let datasets = Arc::new(DatasetStore::new(Storage::new(config.data_dir.clone())));
        Self {
            config: Arc::new(config),
            datasets,
        }
    }
}
