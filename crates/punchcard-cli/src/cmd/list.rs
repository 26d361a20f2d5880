//! `punch list`: bulk reconciliation with per-shift results.

use super::{Session, fail};
use crate::output::render_list;
use crate::view::ShiftView;
use anyhow::Result;
use clap::Args;
use punchcard_core::clock::parse_date;
use punchcard_core::{ReconcileReport, ShiftFilter};
use serde::Serialize;

#[derive(Args, Debug, Default)]
pub struct ListArgs {
    /// Only shifts of this employee.
    #[arg(long)]
    pub employee: Option<String>,

    /// Earliest shift date (inclusive), YYYY-MM-DD.
    #[arg(long)]
    pub from: Option<String>,

    /// Latest shift date (inclusive), YYYY-MM-DD.
    #[arg(long)]
    pub to: Option<String>,
}

#[derive(Debug, Serialize)]
struct ListSummary {
    checked: usize,
    corrected: usize,
    failed: usize,
    cancelled: bool,
}

impl From<&ReconcileReport> for ListSummary {
    fn from(report: &ReconcileReport) -> Self {
        Self {
            checked: report.checked(),
            corrected: report.corrected(),
            failed: report.failed(),
            cancelled: report.cancelled,
        }
    }
}

/// Execute `punch list`.
///
/// Every matching shift is reconciled independently; one failed write
/// does not stop the rest. The command exits non-zero if any write failed.
///
/// # Errors
///
/// Returns an error if a date filter does not parse, the store cannot be
/// listed, or any corrective write failed.
pub fn run_list(args: &ListArgs, session: &Session) -> Result<()> {
    let filter = ShiftFilter {
        employee_id: args.employee.clone(),
        from: parse_bound(args.from.as_deref(), session)?,
        to: parse_bound(args.to.as_deref(), session)?,
    };

    let report = session
        .reconciler()
        .reconcile_many(&filter, session.now)
        .map_err(|err| session.store_error(&err))?;

    let views: Vec<ShiftView> = report.results.iter().map(ShiftView::reconciled).collect();
    let summary = ListSummary::from(&report);
    render_list(&views, &summary, session.output)?;

    match report.results.iter().find_map(|r| r.write_error()) {
        Some(first) => Err(fail(
            session.output,
            first.code(),
            format!("{} of {} corrective writes failed", summary.failed, summary.checked),
        )),
        None => Ok(()),
    }
}

fn parse_bound(raw: Option<&str>, session: &Session) -> Result<Option<chrono::NaiveDate>> {
    raw.map(|value| {
        parse_date(value).map_err(|err| fail(session.output, err.code(), err.to_string()))
    })
    .transpose()
}
