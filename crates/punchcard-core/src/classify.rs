//! Canonical shift status classification.
//!
//! [`classify`] is a pure function of `(segments, date, now)`; it never
//! looks at the shift's stored status. Evaluation order:
//!
//! 1. No segments: `DRAFT`.
//! 2. Date partition against `now.date()`:
//!    - future date: `DRAFT` whatever the segments say
//!    - past date: `COMPLETED` when the segments are consistent
//!    - today: continue
//! 3. Today:
//!    - all segments closed and `now` after the last end: `COMPLETED`
//!    - `now` before the first start: `OFFLINE`
//!    - a segment is open: `ACTIVE`
//!    - between two closed segments, or inside the last one: `ACTIVE`
//!
//! The completion check runs before the "not started yet" check so that a
//! just-after-midnight `now` against an evening shift reads as finished.
//! Malformed times or broken segment invariants never panic: the result
//! falls back to `DRAFT` with the error attached.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use tracing::{debug, warn};

use crate::clock::{Boundary, TimeComparator, WallTime, anchor_sequence};
use crate::error::StatusCalculationError;
use crate::model::{Shift, Status};

/// Which rule produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Reason {
    NoSegments,
    FutureDate,
    PastDate,
    Inconsistent,
    BeforeFirstStart,
    AfterLastEnd,
    OpenSegment,
    BetweenSegments,
    WithinShift,
}

impl Reason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoSegments => "no-segments",
            Self::FutureDate => "future-date",
            Self::PastDate => "past-date",
            Self::Inconsistent => "inconsistent",
            Self::BeforeFirstStart => "before-first-start",
            Self::AfterLastEnd => "after-last-end",
            Self::OpenSegment => "open-segment",
            Self::BetweenSegments => "between-segments",
            Self::WithinShift => "within-shift",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The canonical status for a shift at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub status: Status,
    pub reason: Reason,
    /// Set when the segments could not be interpreted and `status` is the
    /// `DRAFT` fallback.
    pub error: Option<StatusCalculationError>,
}

impl Classification {
    const fn decided(status: Status, reason: Reason) -> Self {
        Self {
            status,
            reason,
            error: None,
        }
    }

    /// Whether the status is a fail-safe fallback rather than a decision.
    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        self.error.is_some()
    }
}

/// Classify with the default heuristic comparator.
#[must_use]
pub fn classify(shift: &Shift, now: NaiveDateTime) -> Classification {
    classify_with(shift, now, &TimeComparator::default())
}

/// Classify `shift` at `now` using `comparator` for cross-midnight rules.
#[must_use]
pub fn classify_with(
    shift: &Shift,
    now: NaiveDateTime,
    comparator: &TimeComparator,
) -> Classification {
    let result = decide(shift, now, comparator);
    match &result.error {
        Some(error) => warn!(
            shift_id = %shift.shift_id,
            error = %error,
            "status calculation failed, falling back to DRAFT"
        ),
        None => debug!(
            shift_id = %shift.shift_id,
            status = %result.status,
            reason = %result.reason,
            "classified shift"
        ),
    }
    result
}

fn decide(shift: &Shift, now: NaiveDateTime, comparator: &TimeComparator) -> Classification {
    if shift.segments.is_empty() {
        return Classification::decided(Status::Draft, Reason::NoSegments);
    }

    match shift.date.cmp(&now.date()) {
        Ordering::Greater => Classification::decided(Status::Draft, Reason::FutureDate),
        Ordering::Less => match bounds(shift) {
            Ok(_) => Classification::decided(Status::Completed, Reason::PastDate),
            Err(error) => fallback(error),
        },
        Ordering::Equal => match bounds(shift) {
            Ok(bounds) => today(&bounds, now, comparator),
            Err(error) => fallback(error),
        },
    }
}

const fn fallback(error: StatusCalculationError) -> Classification {
    Classification {
        status: Status::Draft,
        reason: Reason::Inconsistent,
        error: Some(error),
    }
}

fn today(bounds: &[SegmentBounds], now: NaiveDateTime, cmp: &TimeComparator) -> Classification {
    let (Some(first), Some(last)) = (bounds.first(), bounds.last()) else {
        return Classification::decided(Status::Draft, Reason::NoSegments);
    };

    // Only the last segment can be open once bounds are validated.
    let last_end = last.end.as_ref();

    let after_last_end = last_end.is_some_and(|end| cmp.is_after(now, end));

    // An early-morning `now` against an evening end belongs to the next day.
    if after_last_end && last_end.is_some_and(|end| cmp.crosses_midnight(now, end)) {
        return Classification::decided(Status::Completed, Reason::AfterLastEnd);
    }

    if cmp.is_before(now, &first.start) {
        return Classification::decided(Status::Offline, Reason::BeforeFirstStart);
    }

    if last_end.is_none() {
        return Classification::decided(Status::Active, Reason::OpenSegment);
    }

    if after_last_end {
        return Classification::decided(Status::Completed, Reason::AfterLastEnd);
    }

    let in_gap = bounds.windows(2).any(|pair| {
        pair[0].end.as_ref().is_some_and(|end| cmp.is_after(now, end))
            && cmp.is_before(now, &pair[1].start)
    });
    if in_gap {
        return Classification::decided(Status::Active, Reason::BetweenSegments);
    }

    Classification::decided(Status::Active, Reason::WithinShift)
}

#[derive(Debug, Clone, Copy)]
struct SegmentBounds {
    start: Boundary,
    end: Option<Boundary>,
}

/// Parse and validate every segment, anchoring boundaries on the shift date.
fn bounds(shift: &Shift) -> Result<Vec<SegmentBounds>, StatusCalculationError> {
    let mut parsed: Vec<(WallTime, Option<WallTime>)> = Vec::with_capacity(shift.segments.len());
    for segment in &shift.segments {
        let unparsable = |source| StatusCalculationError::Unparsable {
            segment_id: segment.segment_id,
            source,
        };
        let start = WallTime::parse(&segment.start_time).map_err(unparsable)?;
        let end = segment
            .end_time
            .as_deref()
            .map(WallTime::parse)
            .transpose()
            .map_err(unparsable)?;
        parsed.push((start, end));
    }

    let open = shift.segments.iter().filter(|seg| seg.is_open()).count();
    if open > 1 {
        return Err(StatusCalculationError::MultipleOpenSegments { open });
    }
    if let Some(segment) = shift.segments.iter().rev().skip(1).find(|seg| seg.is_open()) {
        return Err(StatusCalculationError::OpenSegmentNotLast {
            segment_id: segment.segment_id,
        });
    }

    Ok(anchor(shift.date, &parsed))
}

fn anchor(date: NaiveDate, parsed: &[(WallTime, Option<WallTime>)]) -> Vec<SegmentBounds> {
    let walls: Vec<WallTime> = parsed
        .iter()
        .flat_map(|(start, end)| std::iter::once(*start).chain(*end))
        .collect();
    let mut instants = anchor_sequence(date, &walls).into_iter();

    parsed
        .iter()
        .filter_map(|(start, end)| {
            let start = Boundary {
                wall: *start,
                at: instants.next()?,
            };
            let end = match end {
                Some(wall) => Some(Boundary {
                    wall: *wall,
                    at: instants.next()?,
                }),
                None => None,
            };
            Some(SegmentBounds { start, end })
        })
        .collect()
}
