//! Service wiring: built once at startup and shared with every handler via
//! `Extension<Arc<AppServices>>`.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use agencyledger_auth::{IdentityResolver, SessionCodec};
use agencyledger_infra::{
    Directory, InMemoryDirectory, InMemoryLedgerStore, LedgerEngine, LedgerStore,
    PostgresDirectory, PostgresLedgerStore,
};

use crate::config::Config;

pub type SharedDirectory = Arc<dyn Directory>;
pub type SharedStore = Arc<dyn LedgerStore>;
pub type Engine = LedgerEngine<SharedStore, SharedDirectory>;

#[derive(Debug, Error)]
pub enum ServicesError {
    #[error("failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("failed to run migrations: {0}")]
    Migrate(#[source] sqlx::migrate::MigrateError),
}

pub struct AppServices {
    pub directory: SharedDirectory,
    pub identity: IdentityResolver<SharedDirectory>,
    pub ledger: Engine,
}

impl AppServices {
    pub fn new(directory: SharedDirectory, store: SharedStore, codec: SessionCodec) -> Self {
        Self {
            identity: IdentityResolver::new(codec, directory.clone()),
            ledger: LedgerEngine::new(store, directory.clone()),
            directory,
        }
    }

    /// Everything in process memory (dev/tests).
    pub fn in_memory(codec: SessionCodec) -> Self {
        Self::new(
            Arc::new(InMemoryDirectory::new()),
            Arc::new(InMemoryLedgerStore::new()),
            codec,
        )
    }

    /// Postgres-backed stores when `DATABASE_URL` is set, in-memory otherwise.
    pub async fn from_config(config: &Config) -> Result<Self, ServicesError> {
        let codec = SessionCodec::new(config.session_secret.as_bytes(), config.session_ttl);

        let Some(url) = &config.database_url else {
            tracing::info!("DATABASE_URL not set; using in-memory stores");
            return Ok(Self::in_memory(codec));
        };

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .map_err(ServicesError::Connect)?;

        sqlx::migrate!("../infra/migrations")
            .run(&pool)
            .await
            .map_err(ServicesError::Migrate)?;
        tracing::info!("database migrations applied");

        Ok(Self::new(
            Arc::new(PostgresDirectory::new(pool.clone())),
            Arc::new(PostgresLedgerStore::new(pool)),
            codec,
        ))
    }

    pub fn sessions(&self) -> &SessionCodec {
        self.identity.codec()
    }
}
