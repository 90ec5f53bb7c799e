//! Outcomes of processing a transaction.

use crate::stats::LineStats;
use crate::types::{TransactionId, TransactionStatus};
use std::fmt;

/// Why a transaction was not processed. Nothing is written for a skip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The input belongs to another project.
    ProjectMismatch {
        /// Configured project.
        expected: String,
        /// Project named by the input.
        actual: String,
    },
    /// The id already reached a terminal status.
    AlreadyProcessed {
        /// Status of the existing record.
        status: TransactionStatus,
    },
    /// Fewer operations than the configured minimum.
    TooFewOperations {
        /// Operations in the input.
        count: usize,
        /// Configured minimum.
        min: usize,
    },
    /// More operations than the configured maximum.
    TooManyOperations {
        /// Operations in the input.
        count: usize,
        /// Configured maximum.
        max: usize,
    },
    /// A path escapes the project directory.
    UnsafePath {
        /// The offending path.
        path: String,
    },
    /// The pre-command exited unsuccessfully.
    PreCommandFailed {
        /// Exit code of the command.
        exit_code: i32,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProjectMismatch { expected, actual } => {
                write!(f, "project id {actual:?} does not match {expected:?}")
            }
            Self::AlreadyProcessed { status } => write!(f, "already processed ({status})"),
            Self::TooFewOperations { count, min } => {
                write!(f, "{count} operation(s), below the minimum of {min}")
            }
            Self::TooManyOperations { count, max } => {
                write!(f, "{count} operation(s), above the maximum of {max}")
            }
            Self::UnsafePath { path } => write!(f, "path {path:?} is outside the project"),
            Self::PreCommandFailed { exit_code } => {
                write!(f, "pre-command failed with exit code {exit_code}")
            }
        }
    }
}

/// A committed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSummary {
    /// Transaction id.
    pub id: TransactionId,
    /// Line totals.
    pub stats: LineStats,
    /// Errors reported by the check command.
    pub error_count: u32,
    /// Branch created after commit, if any.
    pub branch: Option<String>,
}

/// Why a staged transaction was rolled back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackCause {
    /// The approval gate said no.
    Rejected,
    /// A step after staging failed.
    Failed(String),
}

impl fmt::Display for RollbackCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected => f.write_str("rejected"),
            Self::Failed(message) => write!(f, "failed: {message}"),
        }
    }
}

/// A rolled-back transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackSummary {
    /// Transaction id.
    pub id: TransactionId,
    /// Why it was rolled back.
    pub cause: RollbackCause,
    /// Set when the snapshot could not be fully restored.
    pub restore_error: Option<String>,
}

/// What [`TransactionCoordinator::process`](crate::TransactionCoordinator::process) did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Not processed; no record was written.
    Skipped(SkipReason),
    /// Applied and committed.
    Committed(CommitSummary),
    /// Applied, then restored and marked undone.
    RolledBack(RollbackSummary),
}

impl ProcessOutcome {
    /// Returns true for [`ProcessOutcome::Committed`].
    #[must_use]
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed(_))
    }

    /// Returns the transaction id if a record was written.
    #[must_use]
    pub fn id(&self) -> Option<TransactionId> {
        match self {
            Self::Skipped(_) => None,
            Self::Committed(summary) => Some(summary.id),
            Self::RolledBack(summary) => Some(summary.id),
        }
    }

    /// Returns the status the record ended in, if one was written.
    #[must_use]
    pub fn status(&self) -> Option<TransactionStatus> {
        match self {
            Self::Skipped(_) => None,
            Self::Committed(_) => Some(TransactionStatus::Committed),
            Self::RolledBack(_) => Some(TransactionStatus::Undone),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_accessors() {
        let id = TransactionId::new();
        let committed = ProcessOutcome::Committed(CommitSummary {
            id,
            stats: LineStats::default(),
            error_count: 0,
            branch: None,
        });
        assert!(committed.is_committed());
        assert_eq!(committed.id(), Some(id));
        assert_eq!(committed.status(), Some(TransactionStatus::Committed));

        let skipped = ProcessOutcome::Skipped(SkipReason::TooFewOperations { count: 1, min: 2 });
        assert_eq!(skipped.id(), None);
        assert_eq!(skipped.status(), None);

        let undone = ProcessOutcome::RolledBack(RollbackSummary {
            id,
            cause: RollbackCause::Rejected,
            restore_error: None,
        });
        assert_eq!(undone.status(), Some(TransactionStatus::Undone));
    }

    #[test]
    fn skip_reason_display() {
        let reason = SkipReason::TooManyOperations { count: 9, max: 5 };
        assert_eq!(reason.to_string(), "9 operation(s), above the maximum of 5");
        let reason = SkipReason::UnsafePath { path: "../x".into() };
        assert_eq!(reason.to_string(), "path \"../x\" is outside the project");
    }
}
