use std::sync::Arc;

use crate::auth::session::{SessionManager, SessionStore};
use crate::auth::token::TokenCodec;
use crate::config::AppConfig;
use crate::store::{KvStore, MemoryStore, RedisStore};
use crate::users::repo::UserStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: UserStore,
    pub sessions: SessionManager,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let store = Arc::new(RedisStore::connect(&config.store_url).await?) as Arc<dyn KvStore>;
        Ok(Self::from_parts(store, config))
    }

    pub fn from_parts(store: Arc<dyn KvStore>, config: Arc<AppConfig>) -> Self {
        let codec = TokenCodec::new(config.session_secret.as_bytes());
        let users = UserStore::new(store.clone(), codec.clone(), config.store_timeout());
        let sessions = SessionManager::new(SessionStore::new(
            store,
            codec,
            config.session_ttl(),
            config.store_timeout(),
        ));
        Self { config, users, sessions }
    }

    /// State over the in-memory store, for tests and local poking.
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            store_url: "redis://localhost:6379".into(),
            session_secret: "test-session-secret".into(),
            session_ttl_secs: 1800,
            store_timeout_ms: 2000,
        });
        Self::from_parts(Arc::new(MemoryStore::new()), config)
    }
}
