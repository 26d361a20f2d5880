//! [`ShiftStore`] backed by the SQLite `shifts` table.
//!
//! Every call is bounded by the connection's busy timeout. A database that
//! stays locked past it is reported as [`StoreError::Timeout`]. Partial
//! updates are a single `UPDATE` statement; read-modify-write recording
//! operations (`clock_in`, `clock_out`) run in one `IMMEDIATE` transaction.

use chrono::{NaiveDate, Utc};
use rusqlite::{
    Connection, ErrorCode as SqliteErrorCode, OptionalExtension, Row, Transaction,
    TransactionBehavior, params,
};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use crate::clock::{WallTime, parse_date};
use crate::duration;
use crate::error::StoreError;
use crate::model::{Segment, Shift, Status, segments_from_json, segments_to_json, shift_id_for};
use crate::store::{ShiftFilter, ShiftIter, ShiftStore, ShiftUpdate};

const SELECT_COLUMNS: &str = "shift_id, employee_id, shift_date, status, total_duration, \
                              last_end_time, segments_json";

const UPDATE_SQL: &str = "UPDATE shifts SET
        status = COALESCE(?2, status),
        total_duration = COALESCE(?3, total_duration),
        last_end_time = CASE WHEN ?4 THEN ?5 ELSE last_end_time END,
        segments_json = COALESCE(?6, segments_json),
        updated_at_us = ?7
     WHERE shift_id = ?1";

const UPSERT_SQL: &str = "INSERT INTO shifts (
        shift_id, employee_id, shift_date, status, total_duration,
        last_end_time, segments_json, created_at_us, updated_at_us
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
     ON CONFLICT(shift_id) DO UPDATE SET
        status = excluded.status,
        total_duration = excluded.total_duration,
        last_end_time = excluded.last_end_time,
        segments_json = excluded.segments_json,
        updated_at_us = excluded.updated_at_us";

/// A raw `shifts` row before validation.
struct ShiftRow {
    shift_id: String,
    employee_id: String,
    shift_date: String,
    status: String,
    total_duration: f64,
    last_end_time: Option<String>,
    segments_json: String,
}

impl ShiftRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            shift_id: row.get(0)?,
            employee_id: row.get(1)?,
            shift_date: row.get(2)?,
            status: row.get(3)?,
            total_duration: row.get(4)?,
            last_end_time: row.get(5)?,
            segments_json: row.get(6)?,
        })
    }

    fn into_shift(self) -> Result<Shift, StoreError> {
        let date = parse_date(&self.shift_date).map_err(|err| corrupt(&self.shift_id, err))?;
        let status = self
            .status
            .parse::<Status>()
            .map_err(|err| corrupt(&self.shift_id, err))?;
        let segments = segments_from_json(&self.segments_json)
            .map_err(|err| corrupt(&self.shift_id, format!("segments: {err}")))?;

        Ok(Shift {
            shift_id: self.shift_id,
            employee_id: self.employee_id,
            date,
            segments,
            status,
            total_duration: self.total_duration,
            last_end_time: self.last_end_time,
        })
    }
}

fn corrupt(shift_id: &str, details: impl ToString) -> StoreError {
    StoreError::Corrupt {
        shift_id: shift_id.to_string(),
        details: details.to_string(),
    }
}

fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn now_us() -> i64 {
    Utc::now().timestamp_micros()
}

/// SQLite-backed shift store.
pub struct SqliteShiftStore {
    conn: Connection,
    timeout: Duration,
}

impl SqliteShiftStore {
    /// Open the database at `path` with `timeout` as the per-call bound.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path, timeout: Duration) -> anyhow::Result<Self> {
        let conn = super::open_store(path, timeout)?;
        Ok(Self::from_connection(conn, timeout))
    }

    /// Wrap an already configured and migrated connection.
    #[must_use]
    pub const fn from_connection(conn: Connection, timeout: Duration) -> Self {
        Self { conn, timeout }
    }

    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Insert a shift, or replace the mutable fields of an existing one.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on SQLite failure or timeout.
    pub fn put_shift(&self, shift: &Shift) -> Result<(), StoreError> {
        self.upsert(&self.conn, shift)
    }

    /// Open a new segment at `at`, creating the shift on first use.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SegmentConflict`] if a segment is already open,
    /// or [`StoreError::Corrupt`] if the stored segment ids leave no room
    /// for another.
    pub fn clock_in(
        &self,
        employee_id: &str,
        date: NaiveDate,
        at: WallTime,
    ) -> Result<Shift, StoreError> {
        let tx = self.begin()?;
        let mut shift = self
            .load(&tx, employee_id, date)?
            .unwrap_or_else(|| Shift::new(employee_id, date));

        if let Some(open) = shift.open_segment() {
            return Err(StoreError::SegmentConflict(format!(
                "segment {} opened at {} is still open",
                open.segment_id, open.start_time
            )));
        }

        let segment_id = shift
            .next_segment_id()
            .ok_or_else(|| corrupt(&shift.shift_id, "segment ids exhausted"))?;
        let segment = Segment::open(segment_id, at.to_string());
        debug!(shift_id = %shift.shift_id, segment_id = segment.segment_id, at = %at, "clock in");
        shift.segments.push(segment);
        shift.last_end_time = None;

        self.upsert(&tx, &shift)?;
        tx.commit().map_err(|err| self.sql_err(err))?;
        Ok(shift)
    }

    /// Close the open segment at `at` and record its duration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the shift does not exist, or
    /// [`StoreError::SegmentConflict`] if no segment is open.
    pub fn clock_out(
        &self,
        employee_id: &str,
        date: NaiveDate,
        at: WallTime,
    ) -> Result<Shift, StoreError> {
        let tx = self.begin()?;
        let Some(mut shift) = self.load(&tx, employee_id, date)? else {
            return Err(StoreError::NotFound {
                shift_id: shift_id_for(employee_id, date),
            });
        };

        let Some(open) = shift.segments.iter_mut().find(|seg| seg.is_open()) else {
            return Err(StoreError::SegmentConflict(format!(
                "no open segment on {}",
                shift.shift_id
            )));
        };
        open.end_time = Some(at.to_string());
        open.duration = duration::segment_duration(open).ok();
        debug!(shift_id = %shift.shift_id, segment_id = open.segment_id, at = %at, "clock out");

        match duration::total_duration(&shift) {
            Ok(total) => shift.total_duration = total,
            Err(err) => warn!(shift_id = %shift.shift_id, error = %err, "total duration left as stored"),
        }
        shift.last_end_time = duration::last_end_time(&shift.segments);

        self.upsert(&tx, &shift)?;
        tx.commit().map_err(|err| self.sql_err(err))?;
        Ok(shift)
    }

    fn begin(&self) -> Result<Transaction<'_>, StoreError> {
        Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)
            .map_err(|err| self.sql_err(err))
    }

    fn load(
        &self,
        conn: &Connection,
        employee_id: &str,
        date: NaiveDate,
    ) -> Result<Option<Shift>, StoreError> {
        let row = conn
            .query_row(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM shifts WHERE employee_id = ?1 AND shift_date = ?2"
                ),
                params![employee_id, date_key(date)],
                ShiftRow::from_row,
            )
            .optional()
            .map_err(|err| self.sql_err(err))?;
        row.map(ShiftRow::into_shift).transpose()
    }

    fn upsert(&self, conn: &Connection, shift: &Shift) -> Result<(), StoreError> {
        let segments_json =
            segments_to_json(&shift.segments).map_err(|err| corrupt(&shift.shift_id, err))?;
        conn.execute(
            UPSERT_SQL,
            params![
                shift.shift_id,
                shift.employee_id,
                date_key(shift.date),
                shift.status.as_str(),
                shift.total_duration,
                shift.last_end_time,
                segments_json,
                now_us(),
            ],
        )
        .map_err(|err| self.sql_err(err))?;
        Ok(())
    }

    /// A busy or locked database after the busy timeout is a timeout.
    fn sql_err(&self, err: rusqlite::Error) -> StoreError {
        match err.sqlite_error_code() {
            Some(SqliteErrorCode::DatabaseBusy | SqliteErrorCode::DatabaseLocked) => {
                StoreError::Timeout {
                    waited: self.timeout,
                }
            }
            _ => StoreError::Sqlite(err),
        }
    }
}

impl ShiftStore for SqliteShiftStore {
    fn get_shift(&self, employee_id: &str, date: NaiveDate) -> Result<Option<Shift>, StoreError> {
        self.load(&self.conn, employee_id, date)
    }

    /// Reads all matching rows before returning, so the statement is
    /// finished before reconciliation starts writing on this connection.
    fn list_shifts(&self, filter: &ShiftFilter) -> Result<ShiftIter<'_>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM shifts
                 WHERE (?1 IS NULL OR employee_id = ?1)
                   AND (?2 IS NULL OR shift_date >= ?2)
                   AND (?3 IS NULL OR shift_date <= ?3)
                 ORDER BY shift_date, employee_id"
            ))
            .map_err(|err| self.sql_err(err))?;

        let rows = stmt
            .query_map(
                params![
                    filter.employee_id,
                    filter.from.map(date_key),
                    filter.to.map(date_key),
                ],
                ShiftRow::from_row,
            )
            .map_err(|err| self.sql_err(err))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|err| self.sql_err(err))?;

        let shifts: Vec<Shift> = rows
            .into_iter()
            .filter_map(|row| match row.into_shift() {
                Ok(shift) => Some(shift),
                Err(err) => {
                    warn!(error = %err, "skipping malformed stored shift");
                    None
                }
            })
            .collect();
        Ok(Box::new(shifts.into_iter()))
    }

    fn write_shift_update(&self, shift_id: &str, update: &ShiftUpdate) -> Result<(), StoreError> {
        let segments_json = update
            .segments
            .as_deref()
            .map(segments_to_json)
            .transpose()
            .map_err(|err| corrupt(shift_id, err))?;
        let (set_last_end, last_end) = match &update.last_end_time {
            Some(value) => (true, value.as_deref()),
            None => (false, None),
        };

        let changed = self
            .conn
            .execute(
                UPDATE_SQL,
                params![
                    shift_id,
                    update.status.map(Status::as_str),
                    update.total_duration,
                    set_last_end,
                    last_end,
                    segments_json,
                    now_us(),
                ],
            )
            .map_err(|err| self.sql_err(err))?;

        if changed == 0 {
            return Err(StoreError::NotFound {
                shift_id: shift_id.to_string(),
            });
        }
        debug!(shift_id, fields = ?update.fields(), "applied shift update");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).expect("valid date")
    }

    fn wt(s: &str) -> WallTime {
        WallTime::parse(s).expect("valid time")
    }

    fn open_temp(timeout: Duration) -> (TempDir, SqliteShiftStore) {
        let dir = TempDir::new().expect("tempdir");
        let store = SqliteShiftStore::open(&dir.path().join("punchcard.db"), timeout)
            .expect("open store");
        (dir, store)
    }

    #[test]
    fn listing_is_a_snapshot_unaffected_by_writes() {
        let (_dir, store) = open_temp(Duration::from_secs(1));
        for employee in ["alice", "bob"] {
            store.clock_in(employee, date(18), wt("09:00")).expect("clock in");
        }

        let mut seen = Vec::new();
        for shift in store.list_shifts(&ShiftFilter::default()).expect("list") {
            store
                .write_shift_update(&shift.shift_id, &ShiftUpdate::status(Status::Completed))
                .expect("write while listing");
            seen.push((shift.employee_id, shift.status));
        }
        assert_eq!(
            seen,
            vec![
                ("alice".to_string(), Status::Draft),
                ("bob".to_string(), Status::Draft),
            ]
        );

        let after = store.get_shift("bob", date(18)).expect("get").expect("present");
        assert_eq!(after.status, Status::Completed);
    }

    #[test]
    fn clock_in_refuses_exhausted_segment_ids() {
        let (_dir, store) = open_temp(Duration::from_secs(1));
        let mut shift = Shift::new("alice", date(18));
        shift.segments = vec![Segment::closed(i64::MAX, "08:00", "09:00")];
        store.put_shift(&shift).expect("put");

        let err = store
            .clock_in("alice", date(18), wt("10:00"))
            .expect_err("no id left");
        assert!(matches!(err, StoreError::Corrupt { .. }));

        let stored = store.get_shift("alice", date(18)).expect("get").expect("present");
        assert_eq!(stored.segments.len(), 1);
    }

    #[test]
    fn clock_in_creates_shift_with_open_segment() {
        let (_dir, store) = open_temp(Duration::from_secs(1));
        let shift = store.clock_in("alice", date(18), wt("09:30")).expect("clock in");
        assert_eq!(shift.shift_id, "sh-alice-2024-03-18");
        assert_eq!(shift.segments, vec![Segment::open(1, "09:30")]);

        let stored = store
            .get_shift("alice", date(18))
            .expect("get")
            .expect("present");
        assert_eq!(stored, shift);
    }

    #[test]
    fn second_open_segment_is_rejected() {
        let (_dir, store) = open_temp(Duration::from_secs(1));
        store.clock_in("alice", date(18), wt("09:00")).expect("clock in");
        let err = store
            .clock_in("alice", date(18), wt("10:00"))
            .expect_err("already open");
        assert!(matches!(err, StoreError::SegmentConflict(_)));

        let stored = store.get_shift("alice", date(18)).expect("get").expect("present");
        assert_eq!(stored.segments.len(), 1);
    }

    #[test]
    fn clock_out_records_duration_and_totals() {
        let (_dir, store) = open_temp(Duration::from_secs(1));
        store.clock_in("alice", date(18), wt("08:00")).expect("in");
        store.clock_out("alice", date(18), wt("12:00")).expect("out");
        store.clock_in("alice", date(18), wt("12:30")).expect("in");
        let shift = store.clock_out("alice", date(18), wt("16:45")).expect("out");

        assert_eq!(shift.segments.len(), 2);
        assert_eq!(shift.segments[1].segment_id, 2);
        assert_eq!(shift.segments[1].duration, Some(4.25));
        assert_eq!(shift.total_duration, 8.25);
        assert_eq!(shift.last_end_time.as_deref(), Some("16:45"));
    }

    #[test]
    fn clock_out_without_open_segment_conflicts() {
        let (_dir, store) = open_temp(Duration::from_secs(1));
        let missing = store
            .clock_out("alice", date(18), wt("12:00"))
            .expect_err("no shift");
        assert!(matches!(missing, StoreError::NotFound { .. }));

        store.clock_in("alice", date(18), wt("08:00")).expect("in");
        store.clock_out("alice", date(18), wt("12:00")).expect("out");
        let err = store
            .clock_out("alice", date(18), wt("13:00"))
            .expect_err("nothing open");
        assert!(matches!(err, StoreError::SegmentConflict(_)));
    }

    #[test]
    fn partial_update_touches_only_listed_fields() {
        let (_dir, store) = open_temp(Duration::from_secs(1));
        store.clock_in("alice", date(18), wt("08:00")).expect("in");
        store.clock_out("alice", date(18), wt("12:00")).expect("out");

        store
            .write_shift_update("sh-alice-2024-03-18", &ShiftUpdate::status(Status::Completed))
            .expect("update");
        let stored = store.get_shift("alice", date(18)).expect("get").expect("present");
        assert_eq!(stored.status, Status::Completed);
        assert_eq!(stored.last_end_time.as_deref(), Some("12:00"));
        assert_eq!(stored.total_duration, 4.0);

        let clear = ShiftUpdate {
            last_end_time: Some(None),
            ..ShiftUpdate::default()
        };
        store
            .write_shift_update("sh-alice-2024-03-18", &clear)
            .expect("update");
        let stored = store.get_shift("alice", date(18)).expect("get").expect("present");
        assert_eq!(stored.last_end_time, None);
        assert_eq!(stored.status, Status::Completed);
    }

    #[test]
    fn update_of_unknown_shift_is_not_found() {
        let (_dir, store) = open_temp(Duration::from_secs(1));
        let err = store
            .write_shift_update("sh-ghost-2024-03-18", &ShiftUpdate::status(Status::Active))
            .expect_err("unknown");
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn list_applies_filter_and_order() {
        let (_dir, store) = open_temp(Duration::from_secs(1));
        for (employee, day) in [("bob", 19), ("alice", 19), ("alice", 18), ("alice", 22)] {
            store.put_shift(&Shift::new(employee, date(day))).expect("put");
        }

        let all: Vec<String> = store
            .list_shifts(&ShiftFilter::default())
            .expect("list")
            .map(|s| s.shift_id)
            .collect();
        assert_eq!(
            all,
            vec![
                "sh-alice-2024-03-18",
                "sh-alice-2024-03-19",
                "sh-bob-2024-03-19",
                "sh-alice-2024-03-22",
            ]
        );

        let filter = ShiftFilter {
            employee_id: Some("alice".into()),
            from: Some(date(19)),
            to: Some(date(22)),
        };
        let ranged: Vec<String> = store
            .list_shifts(&filter)
            .expect("list")
            .map(|s| s.shift_id)
            .collect();
        assert_eq!(ranged, vec!["sh-alice-2024-03-19", "sh-alice-2024-03-22"]);
    }

    #[test]
    fn malformed_rows_are_corrupt_on_get_and_skipped_on_list() {
        let (_dir, store) = open_temp(Duration::from_secs(1));
        store.put_shift(&Shift::new("alice", date(18))).expect("put");
        store
            .connection()
            .execute(
                "INSERT INTO shifts (shift_id, employee_id, shift_date, segments_json, created_at_us, updated_at_us)
                 VALUES ('sh-bob-bad', 'bob', '2024-03-18', 'not json', 1, 1)",
                [],
            )
            .expect("insert raw");

        let err = store.get_shift("bob", date(18)).expect_err("bad json");
        assert!(matches!(err, StoreError::Corrupt { .. }));

        let listed: Vec<Shift> = store
            .list_shifts(&ShiftFilter::default())
            .expect("list")
            .collect();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].employee_id, "alice");
    }

    #[test]
    fn malformed_segment_times_survive_storage() {
        let (_dir, store) = open_temp(Duration::from_secs(1));
        let mut shift = Shift::new("alice", date(18));
        shift.segments = vec![Segment::closed(1, "9h", "17:00")];
        store.put_shift(&shift).expect("put");

        let stored = store.get_shift("alice", date(18)).expect("get").expect("present");
        assert_eq!(stored.segments[0].start_time, "9h");
    }

    #[test]
    fn locked_database_times_out() {
        let (dir, store) = open_temp(Duration::from_millis(50));
        store.put_shift(&Shift::new("alice", date(18))).expect("put");

        let holder = Connection::open(dir.path().join("punchcard.db")).expect("second connection");
        holder
            .execute_batch("BEGIN IMMEDIATE")
            .expect("hold write lock");

        let err = store
            .write_shift_update("sh-alice-2024-03-18", &ShiftUpdate::status(Status::Active))
            .expect_err("locked");
        assert!(
            matches!(err, StoreError::Timeout { waited } if waited == Duration::from_millis(50)),
            "unexpected error: {err:?}"
        );
        assert_eq!(err.code(), crate::error::ErrorCode::StoreTimeout);

        let clock = store
            .clock_in("alice", date(18), wt("09:00"))
            .expect_err("locked");
        assert!(matches!(clock, StoreError::Timeout { .. }));

        holder.execute_batch("ROLLBACK").expect("release");
        store
            .write_shift_update("sh-alice-2024-03-18", &ShiftUpdate::status(Status::Active))
            .expect("write after release");
    }
}
