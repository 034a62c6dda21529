//! Application state shared across handlers.

use crate::auth::AuthService;
use crate::config::Config;
use crate::db::Database;
use crate::library::Library;
use crate::storage::BlobStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<Config>,
    /// Database connection.
    pub db: Database,
    /// Authentication service.
    pub auth: Arc<AuthService>,
    /// Upload pipeline and stored artifacts.
    pub library: Arc<Library>,
}

impl AppState {
    /// Create new application state.
    pub fn new(
        config: Config,
        db: Database,
        auth: AuthService,
        storage: Arc<dyn BlobStore>,
    ) -> Self {
        let library = Library::new(
            db.clone(),
            storage,
            config.preview.pages,
            config.storage.max_upload_bytes(),
        );

        Self {
            config: Arc::new(config),
            db,
            auth: Arc::new(auth),
            library: Arc::new(library),
        }
    }

    /// Body size limit for uploads, with headroom for the metadata fields.
    pub fn upload_body_limit(&self) -> usize {
        let limit = self
            .config
            .storage
            .max_upload_bytes()
            .saturating_add(1024 * 1024);
        usize::try_from(limit).unwrap_or(usize::MAX)
    }
}
