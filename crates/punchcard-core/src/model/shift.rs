use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The five shift statuses.
///
/// `OnBreak` is never produced by the classifier; it only exists as a
/// manual override recorded while the shift is otherwise `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "DRAFT")]
    Draft,
    #[serde(rename = "OFFLINE")]
    Offline,
    #[serde(rename = "ACTIVE")]
    Active,
    #[serde(rename = "ON BREAK", alias = "ON_BREAK")]
    OnBreak,
    #[serde(rename = "COMPLETED")]
    Completed,
}

impl Status {
    pub const ALL: [Self; 5] = [
        Self::Draft,
        Self::Offline,
        Self::Active,
        Self::OnBreak,
        Self::Completed,
    ];

    /// Wire literal for this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Offline => "OFFLINE",
            Self::Active => "ACTIVE",
            Self::OnBreak => "ON BREAK",
            Self::Completed => "COMPLETED",
        }
    }

    /// Whether a persisted `self` already agrees with the `canonical`
    /// classifier output, so no corrective write is needed.
    ///
    /// A manual break holds only while the shift is canonically active.
    #[must_use]
    pub const fn agrees_with(self, canonical: Self) -> bool {
        matches!(
            (self, canonical),
            (Self::Draft, Self::Draft)
                | (Self::Offline, Self::Offline)
                | (Self::Active | Self::OnBreak, Self::Active)
                | (Self::Completed, Self::Completed)
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a status from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStatusError {
    pub got: String,
}

impl fmt::Display for ParseStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid status: '{}'", self.got)
    }
}

impl std::error::Error for ParseStatusError {}

impl FromStr for Status {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "DRAFT" => Ok(Self::Draft),
            "OFFLINE" => Ok(Self::Offline),
            "ACTIVE" => Ok(Self::Active),
            "ON BREAK" => Ok(Self::OnBreak),
            "COMPLETED" => Ok(Self::Completed),
            _ => Err(ParseStatusError { got: s.to_string() }),
        }
    }
}

/// One clock-in/clock-out interval. Times are kept as recorded so a
/// malformed value reaches the classifier instead of failing the load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub segment_id: i64,
    pub start_time: String,
    pub end_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl Segment {
    /// A segment that has been clocked in but not out.
    pub fn open(segment_id: i64, start_time: impl Into<String>) -> Self {
        Self {
            segment_id,
            start_time: start_time.into(),
            end_time: None,
            duration: None,
        }
    }

    /// A closed segment with its duration left to be derived.
    pub fn closed(
        segment_id: i64,
        start_time: impl Into<String>,
        end_time: impl Into<String>,
    ) -> Self {
        Self {
            segment_id,
            start_time: start_time.into(),
            end_time: Some(end_time.into()),
            duration: None,
        }
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}

/// A single employee's shift on one calendar date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shift {
    pub shift_id: String,
    pub employee_id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub segments: Vec<Segment>,
    pub status: Status,
    #[serde(default)]
    pub total_duration: f64,
    #[serde(default)]
    pub last_end_time: Option<String>,
}

impl Shift {
    /// An empty draft shift keyed by employee and date.
    pub fn new(employee_id: impl Into<String>, date: NaiveDate) -> Self {
        let employee_id = employee_id.into();
        Self {
            shift_id: shift_id_for(&employee_id, date),
            employee_id,
            date,
            segments: Vec::new(),
            status: Status::Draft,
            total_duration: 0.0,
            last_end_time: None,
        }
    }

    /// The first segment without an end time, if any.
    #[must_use]
    pub fn open_segment(&self) -> Option<&Segment> {
        self.segments.iter().find(|seg| seg.is_open())
    }

    /// Id for the next appended segment, or `None` once the largest
    /// recorded id is `i64::MAX`.
    #[must_use]
    pub fn next_segment_id(&self) -> Option<i64> {
        self.segments
            .iter()
            .map(|seg| seg.segment_id)
            .max()
            .map_or(Some(1), |max| max.checked_add(1))
    }
}

/// Deterministic shift identifier for an employee and date.
#[must_use]
pub fn shift_id_for(employee_id: &str, date: NaiveDate) -> String {
    format!("sh-{employee_id}-{}", date.format("%Y-%m-%d"))
}

/// Serialize segments to their wire JSON array.
///
/// # Errors
///
/// Returns an error if serialization fails (non-finite durations).
pub fn segments_to_json(segments: &[Segment]) -> serde_json::Result<String> {
    serde_json::to_string(segments)
}

/// Parse segments from their wire JSON array.
///
/// # Errors
///
/// Returns an error if the text is not a valid segment array.
pub fn segments_from_json(json: &str) -> serde_json::Result<Vec<Segment>> {
    serde_json::from_str(json)
}
