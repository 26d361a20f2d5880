//! Manual status overrides.
//!
//! `ON BREAK` is the only status a person can set by hand. It may be taken
//! only while the shift is canonically `ACTIVE`, and reconciliation keeps it
//! exactly as long as that stays true.

use chrono::NaiveDateTime;
use tracing::info;

use crate::classify::classify_with;
use crate::clock::TimeComparator;
use crate::error::{ErrorCode, StoreError};
use crate::model::{Shift, Status};
use crate::store::{ShiftStore, ShiftUpdate};

#[derive(Debug, thiserror::Error)]
pub enum OverrideError {
    #[error("cannot start a break while the shift is {canonical}")]
    NotActive { canonical: Status },

    #[error("shift '{shift_id}' is not on break")]
    NotOnBreak { shift_id: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl OverrideError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotActive { .. } | Self::NotOnBreak { .. } => ErrorCode::InvalidStatusOverride,
            Self::Store(err) => err.code(),
        }
    }
}

/// Put an active shift on break. Already being on break is not an error.
///
/// # Errors
///
/// Returns [`OverrideError::NotActive`] unless the canonical status at `now`
/// is `ACTIVE`, or [`OverrideError::Store`] if the write fails.
pub fn start_break<S: ShiftStore + ?Sized>(
    store: &S,
    shift: &Shift,
    now: NaiveDateTime,
    comparator: &TimeComparator,
) -> Result<Shift, OverrideError> {
    let canonical = classify_with(shift, now, comparator).status;
    if canonical != Status::Active {
        return Err(OverrideError::NotActive { canonical });
    }
    if shift.status == Status::OnBreak {
        return Ok(shift.clone());
    }

    store.write_shift_update(&shift.shift_id, &ShiftUpdate::status(Status::OnBreak))?;
    info!(shift_id = %shift.shift_id, "break started");

    let mut updated = shift.clone();
    updated.status = Status::OnBreak;
    Ok(updated)
}

/// Clear a break, restoring the canonical status at `now`.
///
/// # Errors
///
/// Returns [`OverrideError::NotOnBreak`] if no break is recorded, or
/// [`OverrideError::Store`] if the write fails.
pub fn end_break<S: ShiftStore + ?Sized>(
    store: &S,
    shift: &Shift,
    now: NaiveDateTime,
    comparator: &TimeComparator,
) -> Result<Shift, OverrideError> {
    if shift.status != Status::OnBreak {
        return Err(OverrideError::NotOnBreak {
            shift_id: shift.shift_id.clone(),
        });
    }

    let canonical = classify_with(shift, now, comparator).status;
    store.write_shift_update(&shift.shift_id, &ShiftUpdate::status(canonical))?;
    info!(shift_id = %shift.shift_id, status = %canonical, "break ended");

    let mut updated = shift.clone();
    updated.status = canonical;
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Segment;
    use crate::store::MemoryStore;
    use chrono::NaiveDate;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 18).expect("valid date")
    }

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        day().and_hms_opt(hour, minute, 0).expect("valid time")
    }

    fn active_shift() -> Shift {
        let mut shift = Shift::new("alice", day());
        shift.status = Status::Active;
        shift.segments = vec![Segment::open(1, "09:00")];
        shift
    }

    #[test]
    fn break_starts_while_active() {
        let shift = active_shift();
        let store = MemoryStore::with_shifts([shift.clone()]);

        let updated =
            start_break(&store, &shift, at(12, 0), &TimeComparator::default()).expect("break");
        assert_eq!(updated.status, Status::OnBreak);
        assert_eq!(
            store.shift(&shift.shift_id).expect("stored").status,
            Status::OnBreak
        );
    }

    #[test]
    fn break_is_rejected_unless_active() {
        let mut shift = active_shift();
        shift.segments = vec![Segment::closed(1, "09:00", "11:00")];
        let store = MemoryStore::with_shifts([shift.clone()]);

        let err = start_break(&store, &shift, at(12, 0), &TimeComparator::default())
            .expect_err("completed shift");
        assert!(matches!(
            err,
            OverrideError::NotActive {
                canonical: Status::Completed
            }
        ));
        assert_eq!(err.code(), ErrorCode::InvalidStatusOverride);
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn repeated_break_writes_nothing() {
        let mut shift = active_shift();
        shift.status = Status::OnBreak;
        let store = MemoryStore::with_shifts([shift.clone()]);

        start_break(&store, &shift, at(12, 0), &TimeComparator::default()).expect("break");
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn resume_restores_canonical_status() {
        let mut shift = active_shift();
        shift.status = Status::OnBreak;
        let store = MemoryStore::with_shifts([shift.clone()]);

        let updated =
            end_break(&store, &shift, at(12, 30), &TimeComparator::default()).expect("resume");
        assert_eq!(updated.status, Status::Active);

        let err = end_break(&store, &updated, at(12, 31), &TimeComparator::default())
            .expect_err("not on break");
        assert!(matches!(err, OverrideError::NotOnBreak { .. }));
    }
}
