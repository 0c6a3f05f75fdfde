/// Board representation and the win-line scan.
pub mod board;
/// Callback slots and subscription handles.
pub mod listener;
/// Local single-device games.
pub mod local;
/// Move validation shared by local and online games.
pub mod rules;
/// Shared session lifecycle.
pub mod session;

use std::sync::Arc;

use crate::{config::AppConfig, dao::session_store::SessionStore};

pub type SharedState = Arc<AppState>;

/// Central application state: the injected session store and the runtime configuration.
pub struct AppState {
    store: Arc<dyn SessionStore>,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(store: Arc<dyn SessionStore>, config: AppConfig) -> SharedState {
        Arc::new(Self { store, config })
    }

    /// Handle to the session store.
    pub fn store(&self) -> Arc<dyn SessionStore> {
        self.store.clone()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
