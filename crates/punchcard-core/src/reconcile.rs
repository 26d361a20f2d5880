//! Reconciliation of stored shift status against the canonical one.
//!
//! A reconciliation classifies a snapshot, and when the stored status
//! disagrees issues exactly one atomic [`ShiftUpdate`] through the store.
//! It never re-reads the shift, never retries and never calls itself; a
//! poller that wants to converge again simply reconciles again later.

use chrono::NaiveDateTime;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use crate::classify::{Reason, classify_with};
use crate::clock::TimeComparator;
use crate::duration;
use crate::error::{StatusCalculationError, StoreError};
use crate::model::{Shift, Status};
use crate::store::{ShiftFilter, ShiftStore, ShiftUpdate};

/// Cooperative cancellation flag shared between a caller and running
/// reconciliations.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What a reconciliation did.
#[derive(Debug)]
pub enum Outcome {
    /// Stored status already agreed; nothing was written.
    InSync,
    /// One corrective write was applied.
    Corrected,
    /// The corrective write failed. The stored status is unchanged.
    WriteFailed(StoreError),
    /// Cancelled before the write, or the write's result was discarded.
    Cancelled,
}

impl Outcome {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InSync => "in-sync",
            Self::Corrected => "corrected",
            Self::WriteFailed(_) => "write-failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Result of reconciling one shift.
#[derive(Debug)]
pub struct Reconciliation {
    /// The shift as it now stands: the snapshot with the update applied on
    /// success, the untouched snapshot otherwise.
    pub shift: Shift,
    /// Status the stored record held before reconciling.
    pub stored: Status,
    pub canonical: Status,
    pub reason: Reason,
    pub outcome: Outcome,
    /// The update that was sent, if any.
    pub update: Option<ShiftUpdate>,
    /// Present when `canonical` is the `DRAFT` fallback.
    pub calculation_error: Option<StatusCalculationError>,
}

impl Reconciliation {
    #[must_use]
    pub const fn corrected(&self) -> bool {
        matches!(self.outcome, Outcome::Corrected)
    }

    /// Status to show a user. A held break is shown as such; otherwise the
    /// canonical status, even if persisting it failed.
    #[must_use]
    pub const fn display_status(&self) -> Status {
        if self.stored.agrees_with(self.canonical) {
            self.stored
        } else {
            self.canonical
        }
    }

    #[must_use]
    pub const fn write_error(&self) -> Option<&StoreError> {
        match &self.outcome {
            Outcome::WriteFailed(err) => Some(err),
            _ => None,
        }
    }
}

/// Aggregate of a bulk reconciliation.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub results: Vec<Reconciliation>,
    /// Set when cancellation stopped the run before every shift was seen.
    pub cancelled: bool,
}

impl ReconcileReport {
    #[must_use]
    pub fn checked(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn corrected(&self) -> usize {
        self.results.iter().filter(|r| r.corrected()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.write_error().is_some())
            .count()
    }
}

/// Reconciles shifts against one store.
pub struct Reconciler<'s, S: ShiftStore + ?Sized> {
    store: &'s S,
    comparator: TimeComparator,
    cancel: CancelToken,
}

impl<'s, S: ShiftStore + ?Sized> Reconciler<'s, S> {
    #[must_use]
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            comparator: TimeComparator::default(),
            cancel: CancelToken::new(),
        }
    }

    #[must_use]
    pub const fn with_comparator(mut self, comparator: TimeComparator) -> Self {
        self.comparator = comparator;
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Reconcile one shift snapshot at `now`.
    pub fn reconcile(&self, shift: Shift, now: NaiveDateTime) -> Reconciliation {
        let classification = classify_with(&shift, now, &self.comparator);
        let canonical = classification.status;
        let stored = shift.status;

        let mut result = Reconciliation {
            stored,
            canonical,
            reason: classification.reason,
            outcome: Outcome::InSync,
            update: None,
            calculation_error: classification.error,
            shift,
        };

        if stored.agrees_with(canonical) {
            debug!(shift_id = %result.shift.shift_id, status = %stored, "shift in sync");
            return result;
        }

        if self.cancel.is_cancelled() {
            debug!(shift_id = %result.shift.shift_id, "cancelled before write");
            result.outcome = Outcome::Cancelled;
            return result;
        }

        let update = corrective_update(&result.shift, canonical);
        let written = self
            .store
            .write_shift_update(&result.shift.shift_id, &update);

        if self.cancel.is_cancelled() {
            debug!(shift_id = %result.shift.shift_id, "cancelled during write, result discarded");
            result.outcome = Outcome::Cancelled;
            result.update = Some(update);
            return result;
        }

        match written {
            Ok(()) => {
                info!(
                    shift_id = %result.shift.shift_id,
                    from = %stored,
                    to = %canonical,
                    fields = ?update.fields(),
                    "corrected shift status"
                );
                update.apply_to(&mut result.shift);
                result.outcome = Outcome::Corrected;
            }
            Err(err) => {
                warn!(
                    shift_id = %result.shift.shift_id,
                    canonical = %canonical,
                    error = %err,
                    "status write failed, keeping stored status"
                );
                result.outcome = Outcome::WriteFailed(err);
            }
        }
        result.update = Some(update);
        result
    }

    /// Reconcile every shift matching `filter`, one independent pass each.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] only if the shifts cannot be listed.
    /// Per-shift write failures are reported inside the report.
    pub fn reconcile_many(
        &self,
        filter: &ShiftFilter,
        now: NaiveDateTime,
    ) -> Result<ReconcileReport, StoreError> {
        let mut report = ReconcileReport::default();
        for shift in self.store.list_shifts(filter)? {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            report.results.push(self.reconcile(shift, now));
        }
        debug!(
            checked = report.checked(),
            corrected = report.corrected(),
            failed = report.failed(),
            "bulk reconciliation finished"
        );
        Ok(report)
    }
}

/// Reconcile one shift with the default comparator and no cancellation.
pub fn reconcile<S: ShiftStore + ?Sized>(
    shift: Shift,
    now: NaiveDateTime,
    store: &S,
) -> Reconciliation {
    Reconciler::new(store).reconcile(shift, now)
}

/// The status correction plus every derived field that drifted.
fn corrective_update(shift: &Shift, canonical: Status) -> ShiftUpdate {
    let mut update = ShiftUpdate::status(canonical);
    match duration::normalize(shift) {
        Ok(derived) => {
            if (derived.total_duration - shift.total_duration).abs() >= 0.005 {
                update.total_duration = Some(derived.total_duration);
            }
            if derived.last_end_time != shift.last_end_time {
                update.last_end_time = Some(derived.last_end_time);
            }
            if derived.segments != shift.segments {
                update.segments = Some(derived.segments);
            }
        }
        Err(err) => {
            debug!(shift_id = %shift.shift_id, error = %err, "derived fields left as stored");
        }
    }
    update
}
