//! Embedded schema migrations.
//!
//! Each migration is compiled into the binary and applied at most once,
//! inside its own transaction, in the order listed in [`MIGRATIONS`].
//! Applied names are recorded in `_intranet_migrations`.

use rusqlite::Connection;
use thiserror::Error;

struct Migration {
    name: &'static str,
    sql: &'static str,
}

/// Schema history. Append only.
const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "000_users",
        sql: include_str!("migrations/000_users.sql"),
    },
    Migration {
        name: "001_content",
        sql: include_str!("migrations/001_content.sql"),
    },
    Migration {
        name: "002_contacts",
        sql: include_str!("migrations/002_contacts.sql"),
    },
    Migration {
        name: "003_calendar",
        sql: include_str!("migrations/003_calendar.sql"),
    },
    Migration {
        name: "004_events",
        sql: include_str!("migrations/004_events.sql"),
    },
    Migration {
        name: "005_birthday_gifs",
        sql: include_str!("migrations/005_birthday_gifs.sql"),
    },
];

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("migration '{name}' failed: {source}")]
    ExecutionFailed {
        name: String,
        source: rusqlite::Error,
    },

    #[error("failed to read migration history: {0}")]
    StateQuery(rusqlite::Error),
}

/// Applies every pending migration and returns how many ran.
///
/// # Errors
///
/// Returns `MigrationError` if the history table cannot be read or a
/// migration fails; a failed migration leaves no partial schema behind.
pub fn run_migrations(conn: &Connection) -> Result<usize, MigrationError> {
    apply(conn, MIGRATIONS)
}

fn apply(conn: &Connection, migrations: &[Migration]) -> Result<usize, MigrationError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _intranet_migrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .map_err(|e| MigrationError::ExecutionFailed {
        name: "_intranet_migrations".to_string(),
        source: e,
    })?;

    let mut applied = 0;
    for migration in migrations {
        let done: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM _intranet_migrations WHERE name = ?1",
                [migration.name],
                |row| row.get(0),
            )
            .map_err(MigrationError::StateQuery)?;
        if done {
            tracing::debug!(migration = migration.name, "already applied");
            continue;
        }

        tracing::info!(migration = migration.name, "applying migration");
        let failed = |source: rusqlite::Error| MigrationError::ExecutionFailed {
            name: migration.name.to_string(),
            source,
        };

        let tx = conn.unchecked_transaction().map_err(failed)?;
        tx.execute_batch(migration.sql).map_err(failed)?;
        tx.execute(
            "INSERT INTO _intranet_migrations (name) VALUES (?1)",
            [migration.name],
        )
        .map_err(failed)?;
        tx.commit().map_err(failed)?;

        applied += 1;
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_exists(conn: &Connection, table: &str) -> bool {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            [table],
            |row| row.get(0),
        )
        .expect("should query sqlite_master")
    }

    #[test]
    fn fresh_database_gets_every_table() {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        let applied = run_migrations(&conn).expect("migrations should succeed");
        assert_eq!(applied, MIGRATIONS.len());

        for table in [
            "users",
            "posts",
            "announcements",
            "attachments",
            "contacts",
            "meetings",
            "on_call_dates",
            "events",
            "event_registrations",
            "birthday_gifs",
        ] {
            assert!(table_exists(&conn, table), "missing table {table}");
        }
    }

    #[test]
    fn second_run_is_a_no_op() {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        run_migrations(&conn).expect("first run should succeed");
        let second = run_migrations(&conn).expect("second run should succeed");
        assert_eq!(second, 0);
    }

    #[test]
    fn usernames_are_unique_ignoring_case() {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        run_migrations(&conn).expect("migrations should succeed");

        conn.execute(
            "INSERT INTO users (username, password_hash) VALUES ('ana@example.com', 'x')",
            [],
        )
        .expect("first insert should succeed");
        let dup = conn.execute(
            "INSERT INTO users (username, password_hash) VALUES ('ANA@example.com', 'x')",
            [],
        );
        assert!(dup.is_err(), "case variant must violate uniqueness");
    }

    #[test]
    fn failed_migration_rolls_back_its_schema() {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        let broken = [Migration {
            name: "900_broken",
            sql: "CREATE TABLE half_done (id INTEGER PRIMARY KEY);
                  INSERT INTO no_such_table VALUES (1);",
        }];

        let err = apply(&conn, &broken).expect_err("broken migration should fail");
        match err {
            MigrationError::ExecutionFailed { name, .. } => assert_eq!(name, "900_broken"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!table_exists(&conn, "half_done"));
    }
}
