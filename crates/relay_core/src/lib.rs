//! # Relay Core
//!
//! Transactional file-mutation engine for Relay.
//!
//! A batch of file operations (write, delete, rename) proposed for a project
//! is applied as one transaction: the touched files are snapshotted, the
//! batch is staged as a `pending` record, applied to disk, checked, and then
//! either committed or rolled back to the snapshot.
//!
//! This crate provides:
//! - [`TransactionStore`] for durable, queryable records
//! - [`SnapshotManager`] to capture and restore file content
//! - [`OperationApplier`] to fold operations and write the result
//! - [`ApprovalGate`] for the commit-or-rollback decision
//! - [`TransactionCoordinator`] running the lifecycle
//! - [`DirectoryLock`] serializing work per project directory
//!
//! ## Example
//!
//! ```rust,no_run
//! use relay_core::{
//!     EngineConfig, FileOperation, ProcessOptions, TransactionCoordinator, TransactionInput,
//! };
//!
//! # async fn run() -> relay_core::CoreResult<()> {
//! let coordinator = TransactionCoordinator::new(EngineConfig::new("my-project"));
//! let input = TransactionInput::new("my-project", vec![FileOperation::write("hello.txt", "hi\n")]);
//!
//! let outcome = coordinator
//!     .process(input, &ProcessOptions::new("/path/to/my-project"))
//!     .await?;
//! assert!(outcome.is_committed());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod applier;
mod approval;
mod branch;
pub mod collaborator;
mod config;
mod error;
mod fs;
mod lock;
mod record;
mod revert;
mod snapshot;
mod stats;
mod store;
mod transaction;
mod types;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use applier::{AppliedState, OperationApplier};
pub use approval::{ApprovalDecision, ApprovalGate, DecisionSource, APPROVAL_QUESTION};
pub use branch::{branch_name, sanitize_segment};
pub use collaborator::{
    AutoPrompter, CheckRunner, CommandOutput, ContentTransformer, NoNotifications,
    NotificationChannel, NotificationOutcome, Prompter, ReplaceTransformer, ShellCheckRunner,
    ShellExecutor, SystemShell,
};
pub use config::{ApprovalMode, BranchTemplate, EngineConfig, GitConfig, ProcessOptions};
pub use error::{CoreError, CoreResult, PathFailure};
pub use lock::{DirectoryLock, DirectoryTicket};
pub use record::{TransactionInput, TransactionRecord, REVERT_PREFIX};
pub use revert::plan_revert;
pub use snapshot::SnapshotManager;
pub use stats::LineStats;
pub use store::{transactions_dir, Identifier, TransactionStore, STATE_DIR, TRANSACTIONS_DIR};
pub use transaction::{
    CommitSummary, ProcessOutcome, RollbackCause, RollbackSummary, SkipReason, StoreFactory,
    TransactionCoordinator,
};
pub use types::{
    affected_paths, FileOperation, FileSnapshot, PatchStrategy, TransactionId, TransactionStatus,
};
