use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::config::{AppConfig, StoreConfig};
use crate::users::{MemoryUserStore, PgUserStore, UserStore};

/// Shared handles passed to every handler; nothing here is global.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn UserStore>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let store = match &config.store {
            StoreConfig::Postgres {
                database_url,
                max_connections,
            } => {
                let db = PgPoolOptions::new()
                    .max_connections(*max_connections)
                    .connect(database_url)
                    .await
                    .context("connect to database")?;
                sqlx::migrate!("./migrations")
                    .run(&db)
                    .await
                    .context("run migrations")?;
                info!(max_connections, "postgres user store ready");
                Arc::new(PgUserStore::new(db)) as Arc<dyn UserStore>
            }
            StoreConfig::Memory => {
                warn!("using in-memory user store; records are lost on restart");
                Arc::new(MemoryUserStore::new()) as Arc<dyn UserStore>
            }
        };
        Ok(Self::from_parts(store, Arc::new(config)))
    }

    pub fn from_parts(store: Arc<dyn UserStore>, config: Arc<AppConfig>) -> Self {
        Self { store, config }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            store: StoreConfig::Memory,
            jwt: crate::config::JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
            },
            http_host: "127.0.0.1".into(),
            http_port: 0,
            grpc_port: 0,
        });
        Self::from_parts(Arc::new(MemoryUserStore::new()), config)
    }
}
