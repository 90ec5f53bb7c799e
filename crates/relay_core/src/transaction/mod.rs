//! Transaction processing.
//!
//! A transaction moves through a fixed sequence of steps and ends in exactly
//! one of three ways:
//! - **Skipped**: rejected during validation or by the pre-command; nothing
//!   is written
//! - **Committed**: applied, approved and recorded as `committed`
//! - **Rolled back**: applied, then restored from its snapshot and recorded
//!   as `undone`

mod coordinator;
mod state;

pub use coordinator::{StoreFactory, TransactionCoordinator};
pub use state::{CommitSummary, ProcessOutcome, RollbackCause, RollbackSummary, SkipReason};
