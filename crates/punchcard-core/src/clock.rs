//! Wall-clock parsing and midnight-aware comparison.
//!
//! Shift segments record bare `HH:MM` strings with no date attached. Two
//! comparison strategies are provided:
//!
//! - **Heuristic**: compare minutes-since-midnight, but treat an
//!   early-morning `current` as belonging to the next day when the
//!   `reference` is an evening time. The window defaults to
//!   `current < 04:00` and `reference >= 18:00`.
//! - **Date-aware**: anchor every wall time on the shift's calendar date,
//!   rolling forward one day each time the sequence goes backwards, and
//!   compare instants directly.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

pub const MINUTES_PER_DAY: u32 = 1440;

/// A time of day with minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WallTime {
    minutes: u32,
}

impl WallTime {
    pub const MIDNIGHT: Self = Self { minutes: 0 };

    /// Build from hour and minute, or `None` when out of range.
    #[must_use]
    pub const fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self {
                minutes: hour * 60 + minute,
            })
        } else {
            None
        }
    }

    /// Parse a 24-hour `HH:MM` string with exactly two digits on each side.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidTimeFormat`] when the shape is wrong,
    /// a component is not numeric, or a component is out of range.
    pub fn parse(value: &str) -> Result<Self, ParseError> {
        let invalid = |reason| ParseError::InvalidTimeFormat {
            value: value.to_string(),
            reason,
        };

        let (hour, minute) = value.split_once(':').ok_or_else(|| invalid("expected HH:MM"))?;
        if hour.len() != 2 || minute.len() != 2 {
            return Err(invalid("expected HH:MM"));
        }
        if !hour.bytes().chain(minute.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid("non-numeric component"));
        }

        let hour: u32 = hour.parse().map_err(|_| invalid("non-numeric component"))?;
        let minute: u32 = minute
            .parse()
            .map_err(|_| invalid("non-numeric component"))?;

        if hour > 23 {
            return Err(invalid("hour out of range"));
        }
        if minute > 59 {
            return Err(invalid("minute out of range"));
        }

        Ok(Self {
            minutes: hour * 60 + minute,
        })
    }

    #[must_use]
    pub const fn hour(self) -> u32 {
        self.minutes / 60
    }

    #[must_use]
    pub const fn minute(self) -> u32 {
        self.minutes % 60
    }

    #[must_use]
    pub const fn minutes_since_midnight(self) -> u32 {
        self.minutes
    }

    /// Truncate a chrono time to minute precision.
    #[must_use]
    pub fn from_naive(time: NaiveTime) -> Self {
        Self {
            minutes: time.hour() * 60 + time.minute(),
        }
    }

    #[must_use]
    pub fn to_naive(self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour(), self.minute(), 0).unwrap_or(NaiveTime::MIN)
    }

    /// This wall time on the given calendar date.
    #[must_use]
    pub fn on(self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.to_naive())
    }
}

impl fmt::Display for WallTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for WallTime {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Parse a `YYYY-MM-DD` calendar date.
///
/// # Errors
///
/// Returns [`ParseError::InvalidDate`] when the value is not a real date.
pub fn parse_date(value: &str) -> Result<NaiveDate, ParseError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| ParseError::InvalidDate {
        value: value.to_string(),
    })
}

/// Minutes from `start` to `end`, wrapping past midnight when `end` is
/// earlier than `start`. Equal times span zero minutes.
#[must_use]
pub const fn span_minutes(start: WallTime, end: WallTime) -> u32 {
    if end.minutes >= start.minutes {
        end.minutes - start.minutes
    } else {
        end.minutes + MINUTES_PER_DAY - start.minutes
    }
}

// ---------------------------------------------------------------------------
// Heuristic comparison
// ---------------------------------------------------------------------------

/// Hour bounds for the cross-midnight heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MidnightWindow {
    /// `current` hours strictly below this are candidates for "next day".
    pub early_morning_hour: u32,
    /// `reference` hours at or above this enable the adjustment.
    pub evening_hour: u32,
}

impl Default for MidnightWindow {
    fn default() -> Self {
        Self {
            early_morning_hour: 4,
            evening_hour: 18,
        }
    }
}

impl MidnightWindow {
    /// `current` in minutes, shifted by one day when it falls in the
    /// early-morning window and `reference` is an evening time.
    #[must_use]
    pub const fn adjusted(self, current: WallTime, reference: WallTime) -> u32 {
        if self.shifts(current, reference) {
            current.minutes + MINUTES_PER_DAY
        } else {
            current.minutes
        }
    }

    /// Whether `current` is read as belonging to the day after `reference`.
    #[must_use]
    pub const fn shifts(self, current: WallTime, reference: WallTime) -> bool {
        current.hour() < self.early_morning_hour && reference.hour() >= self.evening_hour
    }

    /// Order `current` against `reference` with the midnight adjustment.
    #[must_use]
    pub const fn compare(self, current: WallTime, reference: WallTime) -> Ordering {
        let adjusted = self.adjusted(current, reference);
        if adjusted > reference.minutes {
            Ordering::Greater
        } else if adjusted < reference.minutes {
            Ordering::Less
        } else {
            Ordering::Equal
        }
    }
}

/// Whether `current` is strictly after `reference` using the default window.
///
/// # Errors
///
/// Returns [`ParseError::InvalidTimeFormat`] if either value is malformed.
pub fn is_after(current: &str, reference: &str) -> Result<bool, ParseError> {
    let window = MidnightWindow::default();
    Ok(window.compare(WallTime::parse(current)?, WallTime::parse(reference)?) == Ordering::Greater)
}

/// Whether `current` is strictly before `reference` using the default window.
///
/// # Errors
///
/// Returns [`ParseError::InvalidTimeFormat`] if either value is malformed.
pub fn is_before(current: &str, reference: &str) -> Result<bool, ParseError> {
    let window = MidnightWindow::default();
    Ok(window.compare(WallTime::parse(current)?, WallTime::parse(reference)?) == Ordering::Less)
}

// ---------------------------------------------------------------------------
// Date-aware comparison
// ---------------------------------------------------------------------------

/// Anchor an ordered sequence of wall times on `date`.
///
/// Each time that is earlier than its predecessor is moved to the following
/// day, so the returned instants are non-decreasing.
#[must_use]
pub fn anchor_sequence(date: NaiveDate, times: &[WallTime]) -> Vec<NaiveDateTime> {
    let mut day_offset = 0_i64;
    let mut previous: Option<WallTime> = None;
    times
        .iter()
        .map(|&time| {
            if previous.is_some_and(|prev| time < prev) {
                day_offset += 1;
            }
            previous = Some(time);
            time.on(date) + Duration::days(day_offset)
        })
        .collect()
}

/// How the classifier decides "before"/"after" across midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MidnightPolicy {
    /// Wall-clock comparison with the [`MidnightWindow`] adjustment.
    #[default]
    Heuristic,
    /// Instant comparison on the shift's calendar date.
    DateAware,
}

impl fmt::Display for MidnightPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Heuristic => f.write_str("heuristic"),
            Self::DateAware => f.write_str("date-aware"),
        }
    }
}

/// A segment boundary known both as a wall time and as an anchored instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundary {
    pub wall: WallTime,
    pub at: NaiveDateTime,
}

/// Compares `now` against segment boundaries under a [`MidnightPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeComparator {
    pub policy: MidnightPolicy,
    pub window: MidnightWindow,
}

impl TimeComparator {
    #[must_use]
    pub const fn new(policy: MidnightPolicy, window: MidnightWindow) -> Self {
        Self { policy, window }
    }

    /// Order `now` against a boundary.
    #[must_use]
    pub fn compare(&self, now: NaiveDateTime, boundary: &Boundary) -> Ordering {
        match self.policy {
            MidnightPolicy::Heuristic => self
                .window
                .compare(WallTime::from_naive(now.time()), boundary.wall),
            MidnightPolicy::DateAware => {
                // Boundaries carry minute precision; drop seconds from `now`.
                let now = WallTime::from_naive(now.time()).on(now.date());
                now.cmp(&boundary.at)
            }
        }
    }

    /// Whether the heuristic moves `now` past midnight relative to
    /// `boundary`. Always false under the date-aware policy.
    #[must_use]
    pub fn crosses_midnight(&self, now: NaiveDateTime, boundary: &Boundary) -> bool {
        match self.policy {
            MidnightPolicy::Heuristic => self
                .window
                .shifts(WallTime::from_naive(now.time()), boundary.wall),
            MidnightPolicy::DateAware => false,
        }
    }

    #[must_use]
    pub fn is_after(&self, now: NaiveDateTime, boundary: &Boundary) -> bool {
        self.compare(now, boundary) == Ordering::Greater
    }

    #[must_use]
    pub fn is_before(&self, now: NaiveDateTime, boundary: &Boundary) -> bool {
        self.compare(now, boundary) == Ordering::Less
    }
}
