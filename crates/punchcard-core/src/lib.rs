#![forbid(unsafe_code)]
//! punchcard-core library.
//!
//! Classifies a shift's status from its clock-in/clock-out segments and
//! reconciles the stored status against it.
//!
//! # Conventions
//!
//! - **Time**: `now` is always a parameter. Nothing in this crate reads the
//!   system clock to make a decision.
//! - **Errors**: Typed `thiserror` enums at module seams (`error`,
//!   `overrides`); `anyhow::Result` for config and database setup.
//! - **Logging**: Use `tracing` macros (`debug!` for decisions, `info!` for
//!   corrective writes, `warn!` for fallbacks and store failures).

pub mod classify;
pub mod clock;
pub mod config;
pub mod db;
pub mod duration;
pub mod error;
pub mod model;
pub mod overrides;
pub mod reconcile;
pub mod store;

pub use classify::{Classification, Reason, classify, classify_with};
pub use clock::{MidnightPolicy, MidnightWindow, TimeComparator, WallTime};
pub use error::{ErrorCode, ParseError, StatusCalculationError, StoreError};
pub use model::{Segment, Shift, Status};
pub use reconcile::{CancelToken, Outcome, ReconcileReport, Reconciler, Reconciliation, reconcile};
pub use store::{MemoryStore, ShiftFilter, ShiftIter, ShiftStore, ShiftUpdate};
