use super::{Session, ShiftArgs};
use crate::output::render_item;
use crate::view::ShiftView;
use anyhow::Result;
use punchcard_core::classify_with;

/// Execute `punch status`: classify a shift without writing anything.
///
/// # Errors
///
/// Returns an error if the shift is missing or cannot be read.
pub fn run_status(args: &ShiftArgs, session: &Session) -> Result<()> {
    let shift = session.require_shift(args)?;
    let classification = classify_with(&shift, session.now, &session.config.comparator());
    render_item(&ShiftView::classified(&shift, &classification), session.output)
}
