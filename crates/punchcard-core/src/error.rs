use std::fmt;
use std::time::Duration;

/// Machine-readable error codes for scripts and dashboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    ShiftNotFound,
    InvalidTimeFormat,
    InvalidDate,
    SegmentConflict,
    InvalidStatusOverride,
    StatusCalculation,
    StoreFailure,
    StoreTimeout,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::ShiftNotFound => "E2001",
            Self::InvalidTimeFormat => "E2002",
            Self::InvalidDate => "E2003",
            Self::SegmentConflict => "E2004",
            Self::InvalidStatusOverride => "E2005",
            Self::StatusCalculation => "E3001",
            Self::StoreFailure => "E5001",
            Self::StoreTimeout => "E5002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Project not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::ShiftNotFound => "Shift not found",
            Self::InvalidTimeFormat => "Invalid HH:MM time",
            Self::InvalidDate => "Invalid YYYY-MM-DD date",
            Self::SegmentConflict => "Segment conflict",
            Self::InvalidStatusOverride => "Status override not allowed",
            Self::StatusCalculation => "Status could not be calculated",
            Self::StoreFailure => "Shift store failure",
            Self::StoreTimeout => "Shift store timed out",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `punch init` to initialize this directory."),
            Self::ConfigParseError => Some("Fix syntax in .punchcard/config.toml and retry."),
            Self::ShiftNotFound => Some("Use `punch list` to see recorded shifts."),
            Self::InvalidTimeFormat => Some("Use 24-hour HH:MM, e.g. 09:30 or 21:05."),
            Self::InvalidDate => Some("Use YYYY-MM-DD, e.g. 2024-03-18."),
            Self::SegmentConflict => {
                Some("Clock out before clocking in again; only one segment may be open.")
            }
            Self::InvalidStatusOverride => {
                Some("A break can only be recorded while the shift is ACTIVE.")
            }
            Self::StatusCalculation => {
                Some("Inspect the shift's segments; the status falls back to DRAFT.")
            }
            Self::StoreFailure => Some("The computed status is shown but not yet persisted."),
            Self::StoreTimeout => {
                Some("Retry once the other writer releases the database, or raise store.timeout_ms.")
            }
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A wall-clock or calendar value that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid time '{value}': {reason}")]
    InvalidTimeFormat { value: String, reason: &'static str },

    #[error("invalid date '{value}'")]
    InvalidDate { value: String },
}

impl ParseError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidTimeFormat { .. } => ErrorCode::InvalidTimeFormat,
            Self::InvalidDate { .. } => ErrorCode::InvalidDate,
        }
    }
}

/// Raised when a shift's segments cannot be classified.
///
/// The classifier never propagates this as a failure: it falls back to
/// `DRAFT` and attaches the error so callers can log it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatusCalculationError {
    #[error("segment {segment_id}: {source}")]
    Unparsable {
        segment_id: i64,
        #[source]
        source: ParseError,
    },

    #[error("{open} segments are open; at most one may be")]
    MultipleOpenSegments { open: usize },

    #[error("segment {segment_id} is open but is not the last segment")]
    OpenSegmentNotLast { segment_id: i64 },
}

impl StatusCalculationError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::StatusCalculation
    }
}

/// Failures reported by a [`crate::store::ShiftStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store call timed out after {waited:?}")]
    Timeout { waited: Duration },

    #[error("shift '{shift_id}' not found")]
    NotFound { shift_id: String },

    #[error("segment conflict: {0}")]
    SegmentConflict(String),

    #[error("stored shift '{shift_id}' is malformed: {details}")]
    Corrupt { shift_id: String, details: String },

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("shift store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Machine-readable code associated with this store error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Timeout { .. } => ErrorCode::StoreTimeout,
            Self::NotFound { .. } => ErrorCode::ShiftNotFound,
            Self::SegmentConflict(_) => ErrorCode::SegmentConflict,
            Self::Corrupt { .. } | Self::Sqlite(_) | Self::Unavailable(_) => {
                ErrorCode::StoreFailure
            }
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}
