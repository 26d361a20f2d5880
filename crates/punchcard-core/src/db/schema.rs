//! SQLite schema for the shift store.
//!
//! - `shifts` holds one row per employee and calendar date, with segments
//!   kept in their JSON wire format
//! - `store_meta` is a single-row table mirroring `PRAGMA user_version`

/// Migration v1: shifts plus store metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS shifts (
    shift_id TEXT PRIMARY KEY,
    employee_id TEXT NOT NULL CHECK (length(trim(employee_id)) > 0),
    shift_date TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'DRAFT'
        CHECK (status IN ('DRAFT', 'OFFLINE', 'ACTIVE', 'ON BREAK', 'COMPLETED')),
    total_duration REAL NOT NULL DEFAULT 0 CHECK (total_duration >= 0),
    last_end_time TEXT,
    segments_json TEXT NOT NULL DEFAULT '[]',
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL,
    UNIQUE (employee_id, shift_date)
);

CREATE INDEX IF NOT EXISTS idx_shifts_date_employee
    ON shifts(shift_date, employee_id);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    created_at_us INTEGER NOT NULL DEFAULT 0
);

INSERT OR IGNORE INTO store_meta (id, schema_version, created_at_us)
VALUES (1, 0, 0);
";

/// Indexes every migrated database must have.
pub const REQUIRED_INDEXES: &[&str] = &["idx_shifts_date_employee"];
