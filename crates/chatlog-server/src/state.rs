//! Shared application state.

use std::sync::Arc;

use chatlog_capture::{RelayPage, SessionHandle};
use chatlog_core::{CaptureConfig, DataPaths};
use chatlog_store::JsonFileStore;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: CaptureConfig,
    pub paths: DataPaths,
    pub store: Arc<JsonFileStore>,
    pub session: SessionHandle,
}

impl AppState {
    /// Open the store and start the capture session. Must run inside the
    /// tokio runtime.
    pub fn new(config: CaptureConfig, paths: DataPaths) -> chatlog_core::Result<Self> {
        let store = Arc::new(JsonFileStore::open(&paths.storage_file)?);
        let page = Arc::new(RelayPage::new());
        let session = SessionHandle::spawn(&config, page, store.clone());

        Ok(Self {
            config,
            paths,
            store,
            session,
        })
    }
}

impl Drop for AppState {
    fn drop(&mut self) {
        self.session.shutdown();
    }
}
