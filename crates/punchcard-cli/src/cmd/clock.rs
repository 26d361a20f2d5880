//! `punch in` / `punch out`: record segment boundaries, then reconcile.

use super::Session;
use crate::output::render_item;
use crate::view::ShiftView;
use anyhow::Result;
use clap::Args;
use punchcard_core::{Shift, StoreError};

#[derive(Args, Debug)]
pub struct ClockArgs {
    /// Employee identifier.
    pub employee: String,

    /// Shift date as YYYY-MM-DD (default: the date of `--now`).
    #[arg(long)]
    pub date: Option<String>,

    /// Wall-clock time as HH:MM (default: the time of `--now`).
    #[arg(long)]
    pub at: Option<String>,
}

#[derive(Clone, Copy)]
enum Direction {
    In,
    Out,
}

/// Execute `punch in`.
///
/// # Errors
///
/// Returns an error if the arguments do not parse, a segment is already
/// open, or the store rejects the write.
pub fn run_clock_in(args: &ClockArgs, session: &Session) -> Result<()> {
    run_clock(args, session, Direction::In)
}

/// Execute `punch out`.
///
/// # Errors
///
/// Returns an error if the arguments do not parse, no segment is open, or
/// the store rejects the write.
pub fn run_clock_out(args: &ClockArgs, session: &Session) -> Result<()> {
    run_clock(args, session, Direction::Out)
}

fn run_clock(args: &ClockArgs, session: &Session, direction: Direction) -> Result<()> {
    let date = session.shift_date(args.date.as_deref())?;
    let at = session.wall_time(args.at.as_deref())?;

    let recorded: Result<Shift, StoreError> = match direction {
        Direction::In => session.store.clock_in(&args.employee, date, at),
        Direction::Out => session.store.clock_out(&args.employee, date, at),
    };
    let shift = recorded.map_err(|err| session.store_error(&err))?;

    // The segment change may move the canonical status.
    let result = session.reconciler().reconcile(shift, session.now);
    render_item(&ShiftView::reconciled(&result), session.output)?;
    session.check_written(&result)
}
