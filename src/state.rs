//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::Config;
use crate::store::LedgerStore;

#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<dyn LedgerStore>,

    /// Service configuration.
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn LedgerStore>, config: Config) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }
}
