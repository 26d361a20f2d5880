//! SQLite persistence for shifts.
//!
//! Every connection handed out by [`open_store`] is in WAL mode with
//! foreign keys enforced, and waits at most the configured busy timeout
//! for a lock. Waiting longer surfaces as
//! [`crate::error::StoreError::Timeout`].

pub mod migrations;
pub mod schema;
pub mod store;

pub use store::SqliteShiftStore;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::{path::Path, time::Duration};

/// Busy timeout used when no config overrides it.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// File name of the database inside the project directory.
pub const DB_FILE_NAME: &str = "punchcard.db";

/// Pragmas set on every connection before the schema is touched.
const CONNECTION_PRAGMAS: &[(&str, &str)] = &[("foreign_keys", "ON"), ("synchronous", "NORMAL")];

/// Open the shift database at `path`, creating the file and its parent
/// directory on first use, and upgrade its schema.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be created, a pragma
/// is rejected, or the schema cannot be upgraded.
pub fn open_store(path: &Path, busy_timeout: Duration) -> Result<Connection> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create directory for {}", path.display()))?;
    }

    let mut conn =
        Connection::open(path).with_context(|| format!("open {}", path.display()))?;
    prepare(&conn, busy_timeout)
        .with_context(|| format!("configure connection to {}", path.display()))?;
    let version = migrations::migrate(&mut conn)?;
    tracing::debug!(path = %path.display(), version, "shift store opened");

    Ok(conn)
}

fn prepare(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    for &(name, value) in CONNECTION_PRAGMAS {
        conn.pragma_update(None, name, value)?;
    }
    // `journal_mode` answers with the mode actually in effect.
    let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(busy_timeout)
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_BUSY_TIMEOUT, open_store};
    use crate::db::migrations::{LATEST_SCHEMA_VERSION, current_schema_version};
    use rusqlite::Connection;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    fn store_path() -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".punchcard").join("punchcard.db");
        (dir, path)
    }

    fn pragma<T: rusqlite::types::FromSql>(conn: &Connection, name: &str) -> T {
        conn.pragma_query_value(None, name, |row| row.get(0))
            .unwrap_or_else(|err| panic!("read pragma {name}: {err}"))
    }

    #[test]
    fn connection_is_wal_with_foreign_keys() {
        let (_dir, path) = store_path();
        let conn = open_store(&path, DEFAULT_BUSY_TIMEOUT).expect("open store");

        assert_eq!(pragma::<String>(&conn, "journal_mode").to_ascii_lowercase(), "wal");
        assert_eq!(pragma::<i64>(&conn, "foreign_keys"), 1);
        // NORMAL
        assert_eq!(pragma::<i64>(&conn, "synchronous"), 1);
        assert_eq!(
            u128::from(pragma::<u64>(&conn, "busy_timeout")),
            DEFAULT_BUSY_TIMEOUT.as_millis()
        );
    }

    #[test]
    fn busy_timeout_follows_the_argument() {
        let (_dir, path) = store_path();
        let conn = open_store(&path, Duration::from_millis(250)).expect("open store");
        assert_eq!(pragma::<u64>(&conn, "busy_timeout"), 250);
    }

    #[test]
    fn first_open_creates_directory_and_schema() {
        let (_dir, path) = store_path();
        assert!(!path.exists());

        let conn = open_store(&path, DEFAULT_BUSY_TIMEOUT).expect("open store");
        assert!(path.exists());
        assert_eq!(
            current_schema_version(&conn).expect("schema version"),
            LATEST_SCHEMA_VERSION
        );
    }

    #[test]
    fn reopening_keeps_stored_rows() {
        let (_dir, path) = store_path();
        {
            let conn = open_store(&path, DEFAULT_BUSY_TIMEOUT).expect("open store");
            conn.execute(
                "INSERT INTO shifts (shift_id, employee_id, shift_date, created_at_us, updated_at_us)
                 VALUES ('sh-a-2024-03-18', 'a', '2024-03-18', 1, 1)",
                [],
            )
            .expect("insert shift");
        }

        let conn = open_store(&path, DEFAULT_BUSY_TIMEOUT).expect("reopen store");
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM shifts", [], |row| row.get(0))
            .expect("count shifts");
        assert_eq!(count, 1);
    }
}
