use crate::auth::repo::UserRepo;
use crate::config::{AppConfig, StoreBackend};
use crate::store::{MemoryStore, PgStore};
use crate::students::repo::StudentRepo;
use std::sync::Arc;

/// Shared per-process context handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepo>,
    pub students: Arc<dyn StudentRepo>,
    pg: Option<PgStore>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        match config.store {
            StoreBackend::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is not set"))?;
                let pg = PgStore::connect(url, config.database_name.as_deref()).await?;
                pg.migrate().await?;
                tracing::info!("using postgres store");
                let store = Arc::new(pg.clone());
                Ok(Self {
                    config,
                    users: store.clone(),
                    students: store,
                    pg: Some(pg),
                })
            }
            StoreBackend::Memory => {
                tracing::warn!("using in-memory store; data is lost on exit");
                let store = Arc::new(MemoryStore::new());
                Ok(Self::from_parts(config, store.clone(), store))
            }
        }
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserRepo>,
        students: Arc<dyn StudentRepo>,
    ) -> Self {
        Self {
            config,
            users,
            students,
            pg: None,
        }
    }

    /// Release the store connection, if any.
    pub async fn shutdown(&self) {
        if let Some(pg) = &self.pg {
            pg.close().await;
            tracing::info!("database pool closed");
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            store: StoreBackend::Memory,
            database_url: None,
            database_name: None,
            jwt: crate::config::JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
            },
            cors_origins: Vec::new(),
        });
        let store = Arc::new(MemoryStore::new());
        Self::from_parts(config, store.clone(), store)
    }
}
