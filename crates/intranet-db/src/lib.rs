//! Database layer for the intranet backend.
//!
//! SQLite behind an `r2d2` pool, plus the embedded migrations that create
//! every table. Domain crates take a plain `&rusqlite::Connection`; only the
//! server deals with the pool.

mod migrations;
mod pool;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};

/// Returns `true` if `err` is a UNIQUE / CHECK / FOREIGN KEY violation.
///
/// Stores use this to turn constraint failures into domain errors such as
/// "already exists" instead of a generic database failure.
pub fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(code, _)
            if code.code == rusqlite::ffi::ErrorCode::ConstraintViolation
    )
}
