//! Command handlers and the per-invocation session they share.

pub mod breaks;
pub mod clock;
pub mod completions;
pub mod init;
pub mod list;
pub mod reconcile;
pub mod status;

use crate::output::{CliError, OutputMode, render_error};
use chrono::{NaiveDate, NaiveDateTime};
use clap::Args;
use punchcard_core::clock::parse_date;
use punchcard_core::config::{PROJECT_DIR, ProjectConfig, load_project_config};
use punchcard_core::db::{DB_FILE_NAME, SqliteShiftStore};
use punchcard_core::{
    ErrorCode, ParseError, Reconciler, Reconciliation, Shift, ShiftStore, StoreError, WallTime,
};
use std::fmt;
use std::path::Path;

/// Marker for an error that has already been rendered to the user.
#[derive(Debug)]
pub struct Reported(pub ErrorCode);

impl fmt::Display for Reported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0.code(), self.0.message())
    }
}

impl std::error::Error for Reported {}

/// Render `message` under `code` and return an error that main will not
/// print again.
pub fn fail(output: OutputMode, code: ErrorCode, message: impl Into<String>) -> anyhow::Error {
    render_error(output, &CliError::from_code(code, message)).ok();
    Reported(code).into()
}

/// Arguments selecting one employee's shift.
#[derive(Args, Debug)]
pub struct ShiftArgs {
    /// Employee identifier.
    pub employee: String,

    /// Shift date as YYYY-MM-DD (default: the date of `--now`).
    #[arg(long)]
    pub date: Option<String>,
}

/// Parse a `--now` value: `YYYY-MM-DD HH:MM`, optionally with seconds and
/// a `T` separator.
pub fn parse_now(raw: &str) -> Result<NaiveDateTime, ParseError> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
    ];
    let trimmed = raw.trim();
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| ParseError::InvalidTimeFormat {
            value: raw.to_string(),
            reason: "expected YYYY-MM-DD HH:MM",
        })
}

/// An opened project: config, store and the instant every decision uses.
pub struct Session {
    pub config: ProjectConfig,
    pub store: SqliteShiftStore,
    pub now: NaiveDateTime,
    pub output: OutputMode,
}

impl Session {
    /// Open the project under `root`.
    ///
    /// # Errors
    ///
    /// Renders and returns `E1001` when the project is not initialized,
    /// `E1002` for a bad config, or `E5001` if the database cannot be opened.
    pub fn open(root: &Path, now: NaiveDateTime, output: OutputMode) -> anyhow::Result<Self> {
        let dir = root.join(PROJECT_DIR);
        if !dir.is_dir() {
            return Err(fail(
                output,
                ErrorCode::NotInitialized,
                format!("no {PROJECT_DIR}/ directory in {}", root.display()),
            ));
        }

        let config = load_project_config(root)
            .map_err(|err| fail(output, ErrorCode::ConfigParseError, format!("{err:#}")))?;
        let store = SqliteShiftStore::open(&dir.join(DB_FILE_NAME), config.store.timeout())
            .map_err(|err| fail(output, ErrorCode::StoreFailure, format!("{err:#}")))?;

        Ok(Self {
            config,
            store,
            now,
            output,
        })
    }

    pub fn reconciler(&self) -> Reconciler<'_, SqliteShiftStore> {
        Reconciler::new(&self.store).with_comparator(self.config.comparator())
    }

    /// The `--date` value, defaulting to today.
    pub fn shift_date(&self, raw: Option<&str>) -> anyhow::Result<NaiveDate> {
        raw.map_or(Ok(self.now.date()), |value| {
            parse_date(value).map_err(|err| self.parse_error(&err))
        })
    }

    /// The `--at` value, defaulting to the current minute.
    pub fn wall_time(&self, raw: Option<&str>) -> anyhow::Result<WallTime> {
        raw.map_or_else(
            || Ok(WallTime::from_naive(self.now.time())),
            |value| WallTime::parse(value).map_err(|err| self.parse_error(&err)),
        )
    }

    /// Load a shift that must exist.
    pub fn require_shift(&self, args: &ShiftArgs) -> anyhow::Result<Shift> {
        let date = self.shift_date(args.date.as_deref())?;
        match self.store.get_shift(&args.employee, date) {
            Ok(Some(shift)) => Ok(shift),
            Ok(None) => Err(fail(
                self.output,
                ErrorCode::ShiftNotFound,
                format!("no shift for '{}' on {date}", args.employee),
            )),
            Err(err) => Err(self.store_error(&err)),
        }
    }

    pub fn store_error(&self, err: &StoreError) -> anyhow::Error {
        fail(self.output, err.code(), err.to_string())
    }

    fn parse_error(&self, err: &ParseError) -> anyhow::Error {
        fail(self.output, err.code(), err.to_string())
    }

    /// Turn a failed corrective write into an exit failure once the
    /// result itself has been shown.
    pub fn check_written(&self, result: &Reconciliation) -> anyhow::Result<()> {
        match result.write_error() {
            Some(err) => Err(self.store_error(err)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_now_accepts_common_shapes() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 18)
            .and_then(|d| d.and_hms_opt(21, 48, 0))
            .expect("valid");
        assert_eq!(parse_now("2024-03-18 21:48"), Ok(expected));
        assert_eq!(parse_now("2024-03-18T21:48"), Ok(expected));
        assert_eq!(parse_now(" 2024-03-18 21:48:00 "), Ok(expected));
    }

    #[test]
    fn parse_now_rejects_garbage() {
        let err = parse_now("yesterday").expect_err("not a datetime");
        assert_eq!(err.code(), ErrorCode::InvalidTimeFormat);
        assert!(parse_now("2024-03-18 25:00").is_err());
    }

    #[test]
    fn reported_displays_code() {
        let err = Reported(ErrorCode::ShiftNotFound);
        assert_eq!(err.to_string(), "E2001 Shift not found");
    }
}
