use crate::error::{IngestError, IngestResult};
use dirtonyou_core::config::DatabaseConfig;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::fs;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Schema migrations embedded at build time.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Open the SQLite pool described by `config` and bring the schema up to date.
pub async fn connect(config: &DatabaseConfig) -> IngestResult<Arc<SqlitePool>> {
    let db_path = &config.sqlite_path;
    info!(
        "Initializing database at: {:?} (max_connections={}, wal={})",
        db_path, config.max_connections, config.enable_wal
    );

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let journal_mode = if config.enable_wal {
        SqliteJournalMode::Wal
    } else {
        SqliteJournalMode::Delete
    };

    let connect_options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(journal_mode)
        .foreign_keys(true)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .acquire_timeout(Duration::from_secs(config.connection_timeout))
        .connect_with(connect_options)
        .await?;

    run_migrations(&pool).await?;

    info!("Database initialized successfully with SQLx connection pooling");
    Ok(Arc::new(pool))
}

pub async fn run_migrations(pool: &SqlitePool) -> IngestResult<()> {
    info!("Running SQLx database migrations...");
    MIGRATOR.run(pool).await?;
    info!("Database migrations completed");
    Ok(())
}

/// Run one database operation under a time budget.
///
/// A stalled connection surfaces as [`IngestError::Timeout`] instead of
/// hanging the caller.
pub async fn with_timeout<T, F>(limit: Duration, operation: &str, fut: F) -> IngestResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(IngestError::from),
        Err(_) => Err(IngestError::Timeout(format!(
            "{} did not complete within {:?}",
            operation, limit
        ))),
    }
}

pub mod repository;
pub use repository::*;
