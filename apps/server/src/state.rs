//! Shared application state.

use std::sync::Arc;

use stockbook_db::Database;

use crate::config::ServerConfig;

/// State handed to every handler.
///
/// `Database` is a cheap clone over the pool; the config sits behind an
/// `Arc` because it never changes after startup.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(db: Database, config: ServerConfig) -> Self {
        AppState {
            db,
            config: Arc::new(config),
        }
    }
}
