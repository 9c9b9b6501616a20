//! Application state.

use std::sync::Arc;
use std::time::Instant;

use sesctl_core::{MemoryStore, SessionEngine, SessionQueries, SessionStore, SqliteStore};

use crate::config::{Config, StoreBackend};
use crate::services::SweeperService;

/// Shared application state
pub struct AppState {
    /// Server configuration
    pub config: Arc<Config>,
    /// Lifecycle engine (mutating operations)
    pub engine: Arc<SessionEngine>,
    /// Query façade (reads)
    pub queries: Arc<SessionQueries>,
    /// Store handle, kept for health checks
    pub store: Arc<dyn SessionStore>,
    /// Background inactivity sweeper
    pub sweeper: Arc<SweeperService>,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Create new application state, selecting the store backend from
    /// configuration.
    pub fn new(config: Config) -> anyhow::Result<Arc<Self>> {
        let store: Arc<dyn SessionStore> = match config.backend {
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
            StoreBackend::Sqlite => Arc::new(SqliteStore::open(&config.database_path)?),
        };

        let engine = Arc::new(SessionEngine::new(
            Arc::clone(&store),
            config.server_endpoint.clone(),
            config.session_timeout,
            config.expiry_policy(),
        ));
        let queries = Arc::new(SessionQueries::new(Arc::clone(&store)));
        let sweeper = Arc::new(SweeperService::new(Arc::clone(&engine)));

        Ok(Arc::new(Self {
            config: Arc::new(config),
            engine,
            queries,
            store,
            sweeper,
            start_time: Instant::now(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_with_memory_backend() {
        let state = AppState::new(Config::default()).unwrap();
        assert!(state.store.ping().is_ok());
        assert_eq!(state.queries.active_count().unwrap(), 0);
    }

    #[test]
    fn test_state_with_sqlite_backend() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            backend: StoreBackend::Sqlite,
            database_path: dir.path().join("sessions.db"),
            ..Config::default()
        };
        let state = AppState::new(config).unwrap();
        assert!(state.store.ping().is_ok());
    }
}
