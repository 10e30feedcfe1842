pub mod config;
pub mod operations;
pub mod schema;

use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use thiserror::Error;

use crate::db::config::{DbConfig, DbConfigError};

#[derive(Clone)]
pub struct DatabaseProxy {
    pool: SqlitePool,
}

impl DatabaseProxy {
    pub async fn from_env() -> Result<Self, DbInitError> {
        let config = DbConfig::from_env()?;
        Self::connect(config).await
    }

    pub async fn connect(config: DbConfig) -> Result<Self, DbInitError> {
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DbInitError::Io(e.to_string()))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(true)
            .journal_mode(config.journal_mode.to_sqlx())
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(config.foreign_keys)
            .busy_timeout(config.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await?;

        schema::run_migrations(&pool).await?;

        tracing::info!(path = %config.path.display(), "database ready");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn ping(&self, timeout: Duration) -> Result<Duration, String> {
        let started = std::time::Instant::now();
        match tokio::time::timeout(timeout, sqlx::query("SELECT 1").execute(&self.pool)).await {
            Ok(Ok(_)) => Ok(started.elapsed()),
            Ok(Err(err)) => Err(err.to_string()),
            Err(_) => Err("timeout".to_string()),
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[derive(Debug, Error)]
pub enum DbInitError {
    #[error(transparent)]
    Config(#[from] DbConfigError),
    #[error("IO error: {0}")]
    Io(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[cfg(test)]
pub(crate) async fn test_proxy() -> (tempfile::TempDir, DatabaseProxy) {
    let dir = tempfile::TempDir::new().expect("temp dir");
    let proxy = DatabaseProxy::connect(DbConfig::at_path(dir.path().join("test.db")))
        .await
        .expect("connect test database");
    (dir, proxy)
}
