use crate::config::Config;
use crate::session::{SessionConfig, SessionRegistry};
use crate::translation::{create_backend, TranslationBackend};
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Live sessions (media connection → session)
    pub registry: Arc<SessionRegistry>,

    /// Translation backend shared by every session
    pub backend: Arc<dyn TranslationBackend>,

    /// Service configuration (call-control markup settings)
    pub config: Arc<Config>,

    /// Per-session settings derived from `config`
    pub session_config: SessionConfig,
}

impl AppState {
    /// State with the backend selected by configuration
    pub fn new(config: Config) -> Self {
        let backend = create_backend(&config.translation);
        Self::with_backend(config, backend)
    }

    pub fn with_backend(config: Config, backend: Arc<dyn TranslationBackend>) -> Self {
        let session_config = SessionConfig::from(&config);
        Self {
            registry: Arc::new(SessionRegistry::new()),
            backend,
            config: Arc::new(config),
            session_config,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
