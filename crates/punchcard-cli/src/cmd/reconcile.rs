use super::{Session, ShiftArgs};
use crate::output::render_item;
use crate::view::ShiftView;
use anyhow::Result;

/// Execute `punch reconcile`: correct one shift's stored status if it
/// disagrees with the canonical one.
///
/// The result is always shown. A failed write is reported afterwards and
/// makes the command exit non-zero.
///
/// # Errors
///
/// Returns an error if the shift is missing or the corrective write fails.
pub fn run_reconcile(args: &ShiftArgs, session: &Session) -> Result<()> {
    let shift = session.require_shift(args)?;
    let result = session.reconciler().reconcile(shift, session.now);
    render_item(&ShiftView::reconciled(&result), session.output)?;
    session.check_written(&result)
}
