//! Segment and shift duration arithmetic.
//!
//! Durations are hours rounded to two decimals. A segment that crosses
//! midnight (end earlier than start) wraps by one day. Open segments have
//! not produced any time yet and contribute zero.

use crate::clock::{WallTime, span_minutes};
use crate::error::{ParseError, StatusCalculationError};
use crate::model::{Segment, Shift};

/// Round hours to two decimal places.
#[must_use]
pub fn round_hours(hours: f64) -> f64 {
    (hours * 100.0).round() / 100.0
}

/// A recorded duration is taken as-is only when it could be a real span.
fn is_trusted(hours: f64) -> bool {
    hours.is_finite() && (0.0..24.0).contains(&hours)
}

/// Duration of one segment in hours.
///
/// A plausible recorded `duration` wins, since it may carry an operator
/// correction. Otherwise it is derived from the start and end times.
///
/// # Errors
///
/// Returns [`ParseError::InvalidTimeFormat`] when the duration has to be
/// derived and either time is malformed.
pub fn segment_duration(segment: &Segment) -> Result<f64, ParseError> {
    let Some(end) = segment.end_time.as_deref() else {
        return Ok(0.0);
    };

    match segment.duration {
        Some(hours) if is_trusted(hours) => Ok(hours),
        _ => {
            let start = WallTime::parse(&segment.start_time)?;
            let end = WallTime::parse(end)?;
            Ok(round_hours(f64::from(span_minutes(start, end)) / 60.0))
        }
    }
}

/// Total realized hours across a shift's closed segments.
///
/// # Errors
///
/// Returns [`StatusCalculationError::Unparsable`] naming the first segment
/// whose duration could not be derived.
pub fn total_duration(shift: &Shift) -> Result<f64, StatusCalculationError> {
    let mut total = 0.0;
    for segment in shift.segments.iter().filter(|seg| !seg.is_open()) {
        total += segment_duration(segment).map_err(|source| StatusCalculationError::Unparsable {
            segment_id: segment.segment_id,
            source,
        })?;
    }
    Ok(round_hours(total))
}

/// End time of the last segment, or `None` when it is still open.
#[must_use]
pub fn last_end_time(segments: &[Segment]) -> Option<String> {
    segments.last().and_then(|seg| seg.end_time.clone())
}

/// Derived fields recomputed from a shift's segments.
#[derive(Debug, Clone, PartialEq)]
pub struct Derived {
    /// Segments with every closed segment's `duration` filled in.
    pub segments: Vec<Segment>,
    pub total_duration: f64,
    pub last_end_time: Option<String>,
}

/// Fill in missing segment durations and recompute the shift totals.
///
/// # Errors
///
/// Returns [`StatusCalculationError::Unparsable`] if any closed segment has
/// a malformed time and no trusted duration.
pub fn normalize(shift: &Shift) -> Result<Derived, StatusCalculationError> {
    let mut segments = shift.segments.clone();
    let mut total = 0.0;

    for segment in segments.iter_mut().filter(|seg| !seg.is_open()) {
        let hours = segment_duration(segment).map_err(|source| {
            StatusCalculationError::Unparsable {
                segment_id: segment.segment_id,
                source,
            }
        })?;
        segment.duration = Some(hours);
        total += hours;
    }

    let last_end_time = last_end_time(&segments);
    Ok(Derived {
        segments,
        total_duration: round_hours(total),
        last_end_time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn shift_with(segments: Vec<Segment>) -> Shift {
        let date = NaiveDate::from_ymd_opt(2024, 3, 18).expect("valid date");
        let mut shift = Shift::new("alice", date);
        shift.segments = segments;
        shift
    }

    #[test]
    fn derives_same_day_duration() {
        let seg = Segment::closed(1, "09:30", "21:33");
        assert_eq!(segment_duration(&seg), Ok(12.05));
    }

    #[test]
    fn derives_overnight_duration() {
        let seg = Segment::closed(1, "22:00", "02:30");
        assert_eq!(segment_duration(&seg), Ok(4.5));
    }

    #[test]
    fn open_segment_contributes_nothing() {
        let seg = Segment::open(1, "09:00");
        assert_eq!(segment_duration(&seg), Ok(0.0));
    }

    #[test]
    fn recorded_duration_is_trusted() {
        let mut seg = Segment::closed(1, "09:00", "17:00");
        seg.duration = Some(7.5);
        assert_eq!(segment_duration(&seg), Ok(7.5));
    }

    #[test]
    fn implausible_recorded_duration_is_recomputed() {
        let mut seg = Segment::closed(1, "09:00", "17:00");
        for bad in [-1.0, 24.0, f64::NAN, f64::INFINITY] {
            seg.duration = Some(bad);
            assert_eq!(segment_duration(&seg), Ok(8.0));
        }
    }

    #[test]
    fn malformed_time_is_reported() {
        let seg = Segment::closed(4, "9h30", "17:00");
        assert!(matches!(
            segment_duration(&seg),
            Err(ParseError::InvalidTimeFormat { .. })
        ));

        let shift = shift_with(vec![Segment::closed(1, "08:00", "09:00"), seg]);
        let err = total_duration(&shift).expect_err("bad segment");
        assert!(matches!(
            err,
            StatusCalculationError::Unparsable { segment_id: 4, .. }
        ));
    }

    #[test]
    fn total_sums_closed_segments_only() {
        let shift = shift_with(vec![
            Segment::closed(1, "08:00", "12:00"),
            Segment::closed(2, "12:30", "16:45"),
            Segment::open(3, "17:00"),
        ]);
        assert_eq!(total_duration(&shift), Ok(8.25));
    }

    #[test]
    fn total_rounds_away_float_noise() {
        let shift = shift_with(vec![
            Segment::closed(1, "08:00", "08:10"),
            Segment::closed(2, "09:00", "09:10"),
            Segment::closed(3, "10:00", "10:10"),
        ]);
        assert_eq!(total_duration(&shift), Ok(0.51));
    }

    #[test]
    fn last_end_time_is_absent_when_last_segment_open() {
        let closed = vec![
            Segment::closed(1, "08:00", "12:00"),
            Segment::closed(2, "13:00", "17:00"),
        ];
        assert_eq!(last_end_time(&closed).as_deref(), Some("17:00"));

        let mut with_open = closed;
        with_open.push(Segment::open(3, "18:00"));
        assert_eq!(last_end_time(&with_open), None);
        assert_eq!(last_end_time(&[]), None);
    }

    #[test]
    fn normalize_fills_missing_durations() {
        let mut kept = Segment::closed(2, "13:00", "17:00");
        kept.duration = Some(3.75);
        let shift = shift_with(vec![
            Segment::closed(1, "08:00", "12:00"),
            kept,
            Segment::open(3, "18:00"),
        ]);

        let derived = normalize(&shift).expect("normalize");
        assert_eq!(derived.segments[0].duration, Some(4.0));
        assert_eq!(derived.segments[1].duration, Some(3.75));
        assert_eq!(derived.segments[2].duration, None);
        assert_eq!(derived.total_duration, 7.75);
        assert_eq!(derived.last_end_time, None);
    }
}
