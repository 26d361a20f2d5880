//! Forward-only schema upgrades for the shift store.
//!
//! The schema version lives in two places that must agree: `PRAGMA
//! user_version` (what this module reads) and `store_meta.schema_version`
//! (what humans see with `sqlite3`). Each step bumps both in the same
//! transaction as its DDL.

use super::schema;
use anyhow::{Context, Result, bail};
use rusqlite::{Connection, types::Type};

/// One numbered schema step.
struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: schema::MIGRATION_V1_SQL,
}];

/// Highest schema version a store opened by this build ends up at.
pub const LATEST_SCHEMA_VERSION: u32 = 1;

/// Schema version recorded in `PRAGMA user_version`; 0 for a fresh file.
///
/// # Errors
///
/// Returns an error if the pragma cannot be read or holds a value outside
/// `u32`.
pub fn current_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    let raw: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    u32::try_from(raw)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(err)))
}

/// Bring the store up to [`LATEST_SCHEMA_VERSION`] and return the version
/// it ends at.
///
/// Steps at or below the recorded version are skipped, so reopening a
/// migrated store is a no-op. A store stamped with a version this build
/// does not know is refused rather than written to.
///
/// # Errors
///
/// Returns an error if the store is newer than this build or a step fails.
/// Steps that committed before the failure stay applied.
pub fn migrate(conn: &mut Connection) -> Result<u32> {
    let mut version = current_schema_version(conn).context("read schema version")?;
    if version > LATEST_SCHEMA_VERSION {
        bail!(
            "shift store is at schema version {version}, newer than the {LATEST_SCHEMA_VERSION} this build understands"
        );
    }

    let start = version;
    for step in MIGRATIONS.iter().filter(|step| step.version > start) {
        apply(conn, step).with_context(|| format!("apply schema version {}", step.version))?;
        tracing::debug!(version = step.version, "shift store schema upgraded");
        version = step.version;
    }

    Ok(version)
}

fn apply(conn: &mut Connection, step: &Migration) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(step.sql)?;
    let stamp = i64::from(step.version);
    tx.pragma_update(None, "user_version", stamp)?;
    tx.execute("UPDATE store_meta SET schema_version = ?1 WHERE id = 1", [stamp])?;
    tx.commit()
}

#[cfg(test)]
mod tests {
    use super::{LATEST_SCHEMA_VERSION, current_schema_version, migrate};
    use crate::db::schema;
    use rusqlite::{Connection, params};

    fn has_object(conn: &Connection, kind: &str, name: &str) -> rusqlite::Result<bool> {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = ?1 AND name = ?2)",
            params![kind, name],
            |row| row.get(0),
        )
    }

    fn meta_version(conn: &Connection) -> rusqlite::Result<i64> {
        conn.query_row("SELECT schema_version FROM store_meta WHERE id = 1", [], |row| {
            row.get(0)
        })
    }

    #[test]
    fn fresh_store_reaches_latest_version() -> anyhow::Result<()> {
        let mut conn = Connection::open_in_memory()?;
        assert_eq!(current_schema_version(&conn)?, 0);

        assert_eq!(migrate(&mut conn)?, LATEST_SCHEMA_VERSION);
        assert_eq!(current_schema_version(&conn)?, LATEST_SCHEMA_VERSION);
        assert!(has_object(&conn, "table", "shifts")?);
        assert!(has_object(&conn, "table", "store_meta")?);
        for index in schema::REQUIRED_INDEXES {
            assert!(has_object(&conn, "index", index)?, "index {index} not created");
        }
        Ok(())
    }

    #[test]
    fn reopening_a_migrated_store_changes_nothing() -> anyhow::Result<()> {
        let mut conn = Connection::open_in_memory()?;
        migrate(&mut conn)?;
        conn.execute(
            "INSERT INTO shifts (shift_id, employee_id, shift_date, created_at_us, updated_at_us)
             VALUES ('sh-a-2024-03-18', 'a', '2024-03-18', 1, 1)",
            [],
        )?;

        assert_eq!(migrate(&mut conn)?, LATEST_SCHEMA_VERSION);

        let shifts: i64 = conn.query_row("SELECT COUNT(*) FROM shifts", [], |row| row.get(0))?;
        let meta_rows: i64 =
            conn.query_row("SELECT COUNT(*) FROM store_meta", [], |row| row.get(0))?;
        assert_eq!((shifts, meta_rows), (1, 1));
        assert_eq!(meta_version(&conn)?, i64::from(LATEST_SCHEMA_VERSION));
        Ok(())
    }

    #[test]
    fn store_from_a_newer_build_is_refused() -> anyhow::Result<()> {
        let mut conn = Connection::open_in_memory()?;
        migrate(&mut conn)?;
        conn.pragma_update(None, "user_version", i64::from(LATEST_SCHEMA_VERSION) + 1)?;

        let err = migrate(&mut conn).expect_err("newer schema must be refused");
        assert!(err.to_string().contains("newer"), "{err}");
        assert_eq!(current_schema_version(&conn)?, LATEST_SCHEMA_VERSION + 1);
        Ok(())
    }

    #[test]
    fn status_check_rejects_unknown_values() -> anyhow::Result<()> {
        let mut conn = Connection::open_in_memory()?;
        migrate(&mut conn)?;

        let result = conn.execute(
            "INSERT INTO shifts (shift_id, employee_id, shift_date, status, created_at_us, updated_at_us)
             VALUES ('sh-a-2024-03-18', 'a', '2024-03-18', 'PAUSED', 1, 1)",
            [],
        );
        assert!(result.is_err());

        conn.execute(
            "INSERT INTO shifts (shift_id, employee_id, shift_date, status, created_at_us, updated_at_us)
             VALUES ('sh-a-2024-03-18', 'a', '2024-03-18', 'ON BREAK', 1, 1)",
            [],
        )?;
        Ok(())
    }

    #[test]
    fn one_shift_per_employee_and_date() -> anyhow::Result<()> {
        let mut conn = Connection::open_in_memory()?;
        migrate(&mut conn)?;

        let insert = "INSERT INTO shifts (shift_id, employee_id, shift_date, created_at_us, updated_at_us)
                      VALUES (?1, 'a', '2024-03-18', 1, 1)";
        conn.execute(insert, ["first"])?;
        assert!(conn.execute(insert, ["second"]).is_err());
        Ok(())
    }
}
