pub mod api;
pub mod config;
pub mod error;
pub mod snapshot;
pub mod store;

use std::sync::Arc;
use config::Config;
use snapshot::SnapshotJobClient;
use store::ResultStore;

/// Application state that will be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub snapshots: SnapshotJobClient,
    pub store: ResultStore,
}
