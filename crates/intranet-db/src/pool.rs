//! SQLite connection pool.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};
use std::time::Duration;
use thiserror::Error;

/// Longest accepted `busy_timeout_ms`.
pub const MAX_BUSY_TIMEOUT_MS: u64 = 60_000;

/// Largest accepted `pool_max_size`. SQLite serializes writers, so more
/// connections than this only add lock contention.
pub const MAX_POOL_SIZE: u32 = 64;

/// Connection tunables, read from the `[database]` config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbRuntimeSettings {
    /// How long a writer waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,
    /// Upper bound on pooled connections.
    pub pool_max_size: u32,
}

impl Default for DbRuntimeSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            pool_max_size: 8,
        }
    }
}

impl DbRuntimeSettings {
    /// Rejects settings the pool cannot honour.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.busy_timeout_ms == 0 || self.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
            return Err(PoolError::InvalidSettings(format!(
                "busy_timeout_ms must be between 1 and {}, got {}",
                MAX_BUSY_TIMEOUT_MS, self.busy_timeout_ms
            )));
        }
        if self.pool_max_size == 0 || self.pool_max_size > MAX_POOL_SIZE {
            return Err(PoolError::InvalidSettings(format!(
                "pool_max_size must be between 1 and {}, got {}",
                MAX_POOL_SIZE, self.pool_max_size
            )));
        }
        Ok(())
    }

    fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("invalid database settings: {0}")]
    InvalidSettings(String),

    #[error("failed to create database connection pool: {0}")]
    PoolInit(#[from] r2d2::Error),
}

/// Applies the per-connection pragmas the schema depends on.
///
/// Cascading deletes need `foreign_keys`; concurrent readers need WAL.
/// In-memory databases report their journal mode as `memory`.
fn prepare_connection(conn: &mut Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.busy_timeout(busy_timeout)?;
    conn.pragma_update(None, "foreign_keys", true)?;

    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    match mode.as_str() {
        "wal" | "memory" => Ok(()),
        other => Err(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
            Some(format!("journal mode stuck at '{}'", other)),
        )),
    }
}

/// Opens (creating if needed) the database at `db_path`.
///
/// Checkouts wait up to the busy timeout for a free connection, so a caller
/// never waits on the pool longer than it would on a locked database.
///
/// # Errors
///
/// Returns `PoolError::InvalidSettings` for out-of-range settings and
/// `PoolError::PoolInit` if no connection can be initialized.
pub fn create_pool(db_path: &str, settings: DbRuntimeSettings) -> Result<DbPool, PoolError> {
    settings.validate()?;
    let busy_timeout = settings.busy_timeout();

    let manager = SqliteConnectionManager::file(db_path)
        .with_flags(
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )
        .with_init(move |conn| prepare_connection(conn, busy_timeout));

    let pool = Pool::builder()
        .max_size(settings.pool_max_size)
        .connection_timeout(busy_timeout)
        .build(manager)?;

    tracing::debug!(
        path = db_path,
        max_size = settings.pool_max_size,
        busy_timeout_ms = settings.busy_timeout_ms,
        "database pool ready"
    );
    Ok(pool)
}
