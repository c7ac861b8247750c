//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::store::AnnotationStore;

/// Shared state of the annotation server
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    store: Arc<dyn AnnotationStore>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn AnnotationStore>) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, store }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the annotation store
    pub fn store(&self) -> &dyn AnnotationStore {
        self.inner.store.as_ref()
    }
}
