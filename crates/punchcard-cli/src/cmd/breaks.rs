//! `punch break` / `punch resume`: the manual ON BREAK override.

use super::{Session, ShiftArgs, fail};
use crate::output::render_item;
use crate::view::ShiftView;
use anyhow::Result;
use punchcard_core::overrides::{OverrideError, end_break, start_break};
use punchcard_core::{Shift, classify_with};

/// Execute `punch break`.
///
/// # Errors
///
/// Returns an error if the shift is missing, not currently active, or the
/// write fails.
pub fn run_break(args: &ShiftArgs, session: &Session) -> Result<()> {
    let shift = session.require_shift(args)?;
    let comparator = session.config.comparator();
    let updated = start_break(&session.store, &shift, session.now, &comparator)
        .map_err(|err| override_error(session, &err))?;
    show(session, &updated)
}

/// Execute `punch resume`.
///
/// # Errors
///
/// Returns an error if the shift is missing, not on break, or the write
/// fails.
pub fn run_resume(args: &ShiftArgs, session: &Session) -> Result<()> {
    let shift = session.require_shift(args)?;
    let comparator = session.config.comparator();
    let updated = end_break(&session.store, &shift, session.now, &comparator)
        .map_err(|err| override_error(session, &err))?;
    show(session, &updated)
}

fn override_error(session: &Session, err: &OverrideError) -> anyhow::Error {
    fail(session.output, err.code(), err.to_string())
}

fn show(session: &Session, shift: &Shift) -> Result<()> {
    let classification = classify_with(shift, session.now, &session.config.comparator());
    render_item(&ShiftView::classified(shift, &classification), session.output)
}
