//! Rendered form of a shift and the status decision made about it.

use crate::output::{Renderable, pretty_kv, pretty_section};
use chrono::NaiveDate;
use punchcard_core::{Classification, Reason, Reconciliation, Segment, Shift, Status};
use serde::Serialize;
use std::io::{self, Write};

#[derive(Debug, Serialize)]
pub struct ShiftView {
    pub shift_id: String,
    pub employee_id: String,
    pub date: NaiveDate,
    /// Status to show: a held break, otherwise the canonical status.
    pub status: Status,
    pub stored_status: Status,
    pub canonical_status: Status,
    pub reason: Reason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<&'static str>,
    pub total_duration: f64,
    pub last_end_time: Option<String>,
    pub segments: Vec<Segment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl ShiftView {
    /// View of a shift that was only classified.
    pub fn classified(shift: &Shift, classification: &Classification) -> Self {
        let canonical = classification.status;
        let status = if shift.status.agrees_with(canonical) {
            shift.status
        } else {
            canonical
        };
        Self {
            shift_id: shift.shift_id.clone(),
            employee_id: shift.employee_id.clone(),
            date: shift.date,
            status,
            stored_status: shift.status,
            canonical_status: canonical,
            reason: classification.reason,
            outcome: None,
            total_duration: shift.total_duration,
            last_end_time: shift.last_end_time.clone(),
            segments: shift.segments.clone(),
            warning: classification.error.as_ref().map(ToString::to_string),
        }
    }

    pub fn reconciled(result: &Reconciliation) -> Self {
        let shift = &result.shift;
        let warning = result
            .write_error()
            .map(ToString::to_string)
            .or_else(|| result.calculation_error.as_ref().map(ToString::to_string));
        Self {
            shift_id: shift.shift_id.clone(),
            employee_id: shift.employee_id.clone(),
            date: shift.date,
            status: result.display_status(),
            stored_status: result.stored,
            canonical_status: result.canonical,
            reason: result.reason,
            outcome: Some(result.outcome.as_str()),
            total_duration: shift.total_duration,
            last_end_time: shift.last_end_time.clone(),
            segments: shift.segments.clone(),
            warning,
        }
    }
}

fn segment_line(segment: &Segment) -> String {
    match (&segment.end_time, segment.duration) {
        (Some(end), Some(hours)) => {
            format!("#{} {} - {}  {hours:.2}h", segment.segment_id, segment.start_time, end)
        }
        (Some(end), None) => format!("#{} {} - {}", segment.segment_id, segment.start_time, end),
        (None, _) => format!("#{} {} - open", segment.segment_id, segment.start_time),
    }
}

impl Renderable for ShiftView {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        pretty_section(w, &self.shift_id)?;
        pretty_kv(w, "Employee", &self.employee_id)?;
        pretty_kv(w, "Date", self.date.to_string())?;
        if self.stored_status == self.status {
            pretty_kv(w, "Status", self.status.as_str())?;
        } else {
            pretty_kv(
                w,
                "Status",
                format!("{} (stored {})", self.status, self.stored_status),
            )?;
        }
        pretty_kv(w, "Reason", self.reason.as_str())?;
        pretty_kv(w, "Hours", format!("{:.2}", self.total_duration))?;
        pretty_kv(w, "Last end", self.last_end_time.as_deref().unwrap_or("-"))?;
        if let Some(outcome) = self.outcome {
            pretty_kv(w, "Outcome", outcome)?;
        }
        for (idx, segment) in self.segments.iter().enumerate() {
            let key = if idx == 0 { "Segments" } else { "" };
            pretty_kv(w, key, segment_line(segment))?;
        }
        if let Some(warning) = &self.warning {
            pretty_kv(w, "Warning", warning)?;
        }
        Ok(())
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{}  {}  {}  {}  {:.2}  {}",
            self.shift_id,
            self.employee_id,
            self.date,
            self.status,
            self.total_duration,
            self.outcome.unwrap_or("-"),
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["SHIFT", "EMPLOYEE", "DATE", "STATUS", "HOURS", "OUTCOME"]
    }
}
