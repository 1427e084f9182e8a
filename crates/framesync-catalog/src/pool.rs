//! Database connection handling
//!
//! Wraps SQLx's SqlitePool with:
//! - Automatic directory creation for the database file
//! - Storage tuning for SD-card deployments (large pages, generous page
//!   cache, NORMAL synchronous durability, WAL journal)
//! - A bounded integrity probe on open; a store that fails it is deleted
//!   and recreated, since an empty catalog is a valid recovery state
//!   that triggers a full resync
//! - Automatic schema migration on first connection
//! - In-memory mode for testing

use std::path::{Path, PathBuf};
use std::time::Duration;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};

use crate::CatalogError;

/// Page size tuned for BLOB locality on flash storage
const PAGE_SIZE: u32 = 16 * 1024;

/// Page cache budget, in KiB (negative pragma form means KiB)
const PAGE_CACHE_KIB: i64 = 64 * 1024;

/// Bound on the initial integrity probe; a timeout counts as corruption
const INTEGRITY_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Manages the SQLite connection behind the catalog
///
/// A single connection serializes every catalog mutation, which is what
/// gives the engine its total ordering of catalog writes.
pub struct CatalogPool {
    pool: SqlitePool,
    path: Option<PathBuf>,
}

impl CatalogPool {
    /// Opens (or rebuilds) the catalog at the given file path
    ///
    /// 1. Creates parent directories as needed
    /// 2. Connects with the storage tuning applied
    /// 3. Runs the integrity probe, bounded at 5 seconds
    /// 4. On probe failure or timeout, deletes the store and reconnects
    /// 5. Ensures the schema exists
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::ConnectionFailed` if the file cannot be
    /// opened even after a rebuild, or `CatalogError::MigrationFailed` if
    /// the schema cannot be created.
    pub async fn open(db_path: &Path) -> Result<Self, CatalogError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CatalogError::ConnectionFailed(format!(
                    "Failed to create catalog directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        // A damaged store can fail as early as the connect-time pragmas,
        // so both the connect and the probe feed the rebuild path.
        let pool = match Self::connect(db_path).await {
            Ok(pool) => match Self::probe_integrity(&pool).await {
                Ok(()) => Some(pool),
                Err(reason) => {
                    tracing::warn!(
                        path = %db_path.display(),
                        %reason,
                        "Catalog failed integrity probe, rebuilding empty"
                    );
                    pool.close().await;
                    None
                }
            },
            Err(e) => {
                tracing::warn!(
                    path = %db_path.display(),
                    error = %e,
                    "Catalog unreadable, rebuilding empty"
                );
                None
            }
        };

        let pool = match pool {
            Some(pool) => pool,
            None => {
                Self::remove_store(db_path);
                Self::connect(db_path).await?
            }
        };

        Self::run_migrations(&pool).await?;

        tracing::info!(path = %db_path.display(), "Catalog opened");

        Ok(Self {
            pool,
            path: Some(db_path.to_path_buf()),
        })
    }

    /// Creates an in-memory catalog for testing
    ///
    /// Uses a single connection so the data persists across queries
    /// (SQLite in-memory databases are per-connection).
    pub async fn in_memory() -> Result<Self, CatalogError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| {
                CatalogError::ConnectionFailed(format!("Failed to create in-memory catalog: {e}"))
            })?;

        Self::run_migrations(&pool).await?;

        tracing::debug!("In-memory catalog initialized");

        Ok(Self { pool, path: None })
    }

    /// Returns a reference to the underlying SQLite connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Path of the backing file; `None` for in-memory catalogs
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Closes the pool, flushing the WAL
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn connect(db_path: &Path) -> Result<SqlitePool, CatalogError> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .page_size(PAGE_SIZE)
            .pragma("cache_size", format!("-{PAGE_CACHE_KIB}"))
            .busy_timeout(Duration::from_secs(5));

        SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| {
                CatalogError::ConnectionFailed(format!(
                    "Failed to open catalog at {}: {}",
                    db_path.display(),
                    e
                ))
            })
    }

    /// Runs `PRAGMA integrity_check` with a hard time bound
    async fn probe_integrity(pool: &SqlitePool) -> Result<(), String> {
        let probe = sqlx::query_scalar::<_, String>("PRAGMA integrity_check(1)").fetch_one(pool);

        match tokio::time::timeout(INTEGRITY_PROBE_TIMEOUT, probe).await {
            Ok(Ok(verdict)) if verdict == "ok" => Ok(()),
            Ok(Ok(verdict)) => Err(format!("integrity_check reported: {verdict}")),
            Ok(Err(e)) => Err(format!("integrity_check failed: {e}")),
            Err(_) => Err("integrity_check timed out".to_string()),
        }
    }

    /// Deletes the store file and its WAL/SHM siblings
    fn remove_store(db_path: &Path) {
        for suffix in ["", "-wal", "-shm"] {
            let mut os_name = db_path.as_os_str().to_owned();
            os_name.push(suffix);
            let target = PathBuf::from(os_name);
            if target.exists() {
                if let Err(e) = std::fs::remove_file(&target) {
                    tracing::warn!(path = %target.display(), error = %e, "Failed to remove store file");
                }
            }
        }
    }

    /// Runs the initial schema migration
    async fn run_migrations(pool: &SqlitePool) -> Result<(), CatalogError> {
        let migration_sql = include_str!("migrations/20260410_initial.sql");
        sqlx::raw_sql(migration_sql)
            .execute(pool)
            .await
            .map_err(|e| {
                CatalogError::MigrationFailed(format!("Failed to run initial migration: {e}"))
            })?;

        tracing::debug!("Catalog migrations completed");
        Ok(())
    }
}
