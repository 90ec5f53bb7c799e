//! Error types for Relay core.

use crate::types::TransactionStatus;
use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// A failure affecting a single path within a batch of filesystem work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathFailure {
    /// Project-relative path.
    pub path: String,
    /// Human-readable cause.
    pub message: String,
}

impl PathFailure {
    /// Creates a path failure.
    pub fn new(path: impl Into<String>, message: impl fmt::Display) -> Self {
        Self {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for PathFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

fn list_failures(failures: &[PathFailure]) -> String {
    failures
        .iter()
        .map(|failure| format!("  - {failure}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Errors that can occur in Relay core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Record backend error.
    #[error("storage error: {0}")]
    Storage(#[from] relay_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A transaction identifier is not a hyphenated UUID.
    #[error("invalid transaction identifier: {value:?}")]
    InvalidIdentifier {
        /// The rejected value.
        value: String,
    },

    /// A record with this id already reached a terminal status.
    #[error("transaction {id} already exists with status {status}")]
    DuplicateRecord {
        /// Transaction id.
        id: String,
        /// Status of the existing record.
        status: TransactionStatus,
    },

    /// A status change that the record lifecycle does not allow.
    #[error("illegal status transition from {from} to {to}")]
    InvalidTransition {
        /// Expected current status.
        from: TransactionStatus,
        /// Requested status.
        to: TransactionStatus,
    },

    /// The content-transform engine could not compute new content.
    #[error("failed to compute new content for {path}: {message}")]
    Transform {
        /// Path whose content could not be computed.
        path: String,
        /// Description of the failure.
        message: String,
    },

    /// One or more filesystem operations failed.
    #[error("{} file operation(s) failed:\n{}", .failures.len(), list_failures(.failures))]
    FileOperations {
        /// Every failed path and its cause.
        failures: Vec<PathFailure>,
    },

    /// Snapshot restoration failed for one or more paths.
    #[error("rollback failed for {} file(s):\n{}", .failures.len(), list_failures(.failures))]
    RollbackFailed {
        /// Every path that could not be restored.
        failures: Vec<PathFailure>,
    },

    /// The post-apply hook exited unsuccessfully.
    #[error("post-command failed with exit code {exit_code}")]
    PostCommandFailed {
        /// Exit code of the command.
        exit_code: i32,
        /// Captured standard error.
        stderr: String,
    },

    /// An external command could not be started.
    #[error("failed to run command `{command}`: {source}")]
    Command {
        /// The command line.
        command: String,
        /// Underlying spawn error.
        #[source]
        source: io::Error,
    },

    /// The directory lock queue stopped before the task completed.
    #[error("directory queue closed before the task completed")]
    QueueClosed,

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid identifier error.
    pub fn invalid_identifier(value: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            value: value.into(),
        }
    }

    /// Creates a transform error.
    pub fn transform(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transform {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns the per-path failures carried by this error, if any.
    #[must_use]
    pub fn path_failures(&self) -> &[PathFailure] {
        match self {
            Self::FileOperations { failures } | Self::RollbackFailed { failures } => failures,
            _ => &[],
        }
    }
}
