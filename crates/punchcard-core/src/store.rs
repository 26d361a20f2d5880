//! The persistence collaborator contract.
//!
//! The core never owns durable storage. It reads shifts through a
//! [`ShiftStore`] and issues at most one [`ShiftUpdate`] per
//! reconciliation. Implementations must:
//!
//! - apply each update atomically (all listed fields or none)
//! - bound every call with a timeout and report it as
//!   [`StoreError::Timeout`] instead of blocking indefinitely
//!
//! [`MemoryStore`] is a thread-safe in-process implementation used by tests
//! and simulations; the SQLite store lives in [`crate::db::store`].

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::StoreError;
use crate::model::{Segment, Shift, Status};

/// Single-pass, finite sequence of shifts. Not restartable.
pub type ShiftIter<'a> = Box<dyn Iterator<Item = Shift> + 'a>;

/// Filter criteria for [`ShiftStore::list_shifts`].
///
/// All fields are optional and combine with AND semantics. The date range
/// is inclusive on both ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShiftFilter {
    pub employee_id: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl ShiftFilter {
    /// Whether `shift` satisfies every set criterion.
    #[must_use]
    pub fn matches(&self, shift: &Shift) -> bool {
        self.employee_id
            .as_deref()
            .is_none_or(|employee| shift.employee_id == employee)
            && self.from.is_none_or(|from| shift.date >= from)
            && self.to.is_none_or(|to| shift.date <= to)
    }
}

/// A partial shift update. `None` fields are left untouched.
///
/// `last_end_time` is doubly optional: `Some(None)` clears the stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_end_time: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segments: Option<Vec<Segment>>,
}

impl ShiftUpdate {
    /// An update that only sets the status.
    #[must_use]
    pub fn status(status: Status) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.total_duration.is_none()
            && self.last_end_time.is_none()
            && self.segments.is_none()
    }

    /// Names of the fields this update sets, in wire spelling.
    #[must_use]
    pub fn fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.status.is_some() {
            fields.push("status");
        }
        if self.total_duration.is_some() {
            fields.push("totalDuration");
        }
        if self.last_end_time.is_some() {
            fields.push("lastEndTime");
        }
        if self.segments.is_some() {
            fields.push("segments");
        }
        fields
    }

    /// Apply the set fields to a local copy of a shift.
    pub fn apply_to(&self, shift: &mut Shift) {
        if let Some(status) = self.status {
            shift.status = status;
        }
        if let Some(total) = self.total_duration {
            shift.total_duration = total;
        }
        if let Some(last_end) = &self.last_end_time {
            shift.last_end_time.clone_from(last_end);
        }
        if let Some(segments) = &self.segments {
            shift.segments.clone_from(segments);
        }
    }
}

/// Durable shift storage consumed by the reconciliation coordinator.
pub trait ShiftStore {
    /// Load the shift for an employee on a date. A missing record is
    /// `Ok(None)`, not an error.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on I/O failure or timeout.
    fn get_shift(&self, employee_id: &str, date: NaiveDate) -> Result<Option<Shift>, StoreError>;

    /// Shifts matching `filter`, ordered by date then employee.
    ///
    /// The sequence is a snapshot taken when this returns: both bundled
    /// stores read every matching shift up front, so writes made while
    /// iterating are not observed and cannot fail the iteration.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on I/O failure or timeout.
    fn list_shifts(&self, filter: &ShiftFilter) -> Result<ShiftIter<'_>, StoreError>;

    /// Atomically apply a partial update to one shift.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown id, or another
    /// [`StoreError`] on I/O failure or timeout.
    fn write_shift_update(&self, shift_id: &str, update: &ShiftUpdate) -> Result<(), StoreError>;
}

impl<S: ShiftStore + ?Sized> ShiftStore for &S {
    fn get_shift(&self, employee_id: &str, date: NaiveDate) -> Result<Option<Shift>, StoreError> {
        (**self).get_shift(employee_id, date)
    }

    fn list_shifts(&self, filter: &ShiftFilter) -> Result<ShiftIter<'_>, StoreError> {
        (**self).list_shifts(filter)
    }

    fn write_shift_update(&self, shift_id: &str, update: &ShiftUpdate) -> Result<(), StoreError> {
        (**self).write_shift_update(shift_id, update)
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MemoryState {
    shifts: BTreeMap<String, Shift>,
    writes: Vec<(String, ShiftUpdate)>,
}

/// Thread-safe in-memory [`ShiftStore`] that records every write.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with shifts, replacing any with the same id.
    #[must_use]
    pub fn with_shifts(shifts: impl IntoIterator<Item = Shift>) -> Self {
        let store = Self::new();
        for shift in shifts {
            store.insert(shift);
        }
        store
    }

    /// Insert or replace a shift without counting it as a write.
    pub fn insert(&self, shift: Shift) {
        self.lock().shifts.insert(shift.shift_id.clone(), shift);
    }

    /// Current stored copy of a shift.
    #[must_use]
    pub fn shift(&self, shift_id: &str) -> Option<Shift> {
        self.lock().shifts.get(shift_id).cloned()
    }

    /// Every update applied through [`ShiftStore::write_shift_update`].
    #[must_use]
    pub fn writes(&self) -> Vec<(String, ShiftUpdate)> {
        self.lock().writes.clone()
    }

    #[must_use]
    pub fn write_count(&self) -> usize {
        self.lock().writes.len()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A panicking test thread must not hide the recorded state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ShiftStore for MemoryStore {
    fn get_shift(&self, employee_id: &str, date: NaiveDate) -> Result<Option<Shift>, StoreError> {
        Ok(self
            .lock()
            .shifts
            .values()
            .find(|shift| shift.employee_id == employee_id && shift.date == date)
            .cloned())
    }

    fn list_shifts(&self, filter: &ShiftFilter) -> Result<ShiftIter<'_>, StoreError> {
        let mut shifts: Vec<Shift> = self
            .lock()
            .shifts
            .values()
            .filter(|shift| filter.matches(shift))
            .cloned()
            .collect();
        shifts.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then_with(|| a.employee_id.cmp(&b.employee_id))
        });
        Ok(Box::new(shifts.into_iter()))
    }

    fn write_shift_update(&self, shift_id: &str, update: &ShiftUpdate) -> Result<(), StoreError> {
        let mut state = self.lock();
        let shift = state
            .shifts
            .get_mut(shift_id)
            .ok_or_else(|| StoreError::NotFound {
                shift_id: shift_id.to_string(),
            })?;
        update.apply_to(shift);
        state.writes.push((shift_id.to_string(), update.clone()));
        Ok(())
    }
}
