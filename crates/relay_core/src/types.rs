//! Core type definitions for Relay.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a transaction.
///
/// Transaction IDs are hyphenated UUIDs that are:
/// - Globally unique across all records of a project
/// - Immutable once assigned
/// - Never reused, even after a rollback
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TransactionId(Uuid);

impl TransactionId {
    /// Creates a new random transaction ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses a transaction ID.
    ///
    /// Only the canonical 8-4-4-4-12 hyphenated form is accepted; simple,
    /// braced and URN spellings are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidIdentifier`] if `value` is not a
    /// hyphenated UUID.
    pub fn parse(value: &str) -> CoreResult<Self> {
        if !is_hyphenated_uuid(value) {
            return Err(CoreError::invalid_identifier(value));
        }
        Uuid::parse_str(value)
            .map(Self)
            .map_err(|_| CoreError::invalid_identifier(value))
    }

    /// Creates a transaction ID from a UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Returns the first eight characters, used in log lines.
    #[must_use]
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({})", self.0.hyphenated())
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for TransactionId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TransactionId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TransactionId> for String {
    fn from(id: TransactionId) -> Self {
        id.to_string()
    }
}

/// Returns true if `value` has the 8-4-4-4-12 hexadecimal layout.
#[must_use]
pub fn is_hyphenated_uuid(value: &str) -> bool {
    const GROUPS: [usize; 5] = [8, 4, 4, 4, 12];
    let mut parts = value.split('-');
    for expected in GROUPS {
        match parts.next() {
            Some(part) if part.len() == expected && part.bytes().all(|b| b.is_ascii_hexdigit()) => {}
            _ => return false,
        }
    }
    parts.next().is_none()
}

/// Lifecycle status of a transaction record.
///
/// The only legal transitions are `Pending -> Committed` and
/// `Pending -> Undone`. Both targets are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Staged; filesystem changes may be applied but not yet decided.
    Pending,
    /// Approved and permanent.
    Committed,
    /// Rolled back. Kept for auditability.
    Undone,
}

impl TransactionStatus {
    /// Returns true for `Committed` and `Undone`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::Undone)
    }

    /// Returns true if the lifecycle allows moving from `self` to `to`.
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Committed) | (Self::Pending, Self::Undone)
        )
    }

    /// Returns the lowercase name used in storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Committed => "committed",
            Self::Undone => "undone",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selects the content-transform engine used for a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatchStrategy {
    /// The operation content is the complete new file.
    #[default]
    Replace,
    /// The operation content is a unified diff against the current file.
    StandardDiff,
    /// The operation content is a list of search/replace blocks.
    SearchReplace,
}

impl fmt::Display for PatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Replace => "replace",
            Self::StandardDiff => "standard-diff",
            Self::SearchReplace => "search-replace",
        })
    }
}

/// One requested mutation of the project tree.
///
/// Paths are relative to the project directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FileOperation {
    /// Replace or edit a file's content.
    #[serde(rename_all = "camelCase")]
    Write {
        /// Target path.
        path: String,
        /// New content, or an edit interpreted by `patch_strategy`.
        content: String,
        /// Content-transform engine to use.
        #[serde(default)]
        patch_strategy: PatchStrategy,
    },
    /// Remove a file.
    Delete {
        /// Target path.
        path: String,
    },
    /// Move a file.
    Rename {
        /// Source path.
        from: String,
        /// Destination path.
        to: String,
    },
}

impl FileOperation {
    /// Creates a full-replace write.
    pub fn write(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Write {
            path: path.into(),
            content: content.into(),
            patch_strategy: PatchStrategy::Replace,
        }
    }

    /// Creates a write using a specific strategy.
    pub fn write_with(
        path: impl Into<String>,
        content: impl Into<String>,
        patch_strategy: PatchStrategy,
    ) -> Self {
        Self::Write {
            path: path.into(),
            content: content.into(),
            patch_strategy,
        }
    }

    /// Creates a delete.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::Delete { path: path.into() }
    }

    /// Creates a rename.
    pub fn rename(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::Rename {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Returns every path this operation reads or writes.
    #[must_use]
    pub fn paths(&self) -> Vec<&str> {
        match self {
            Self::Write { path, .. } | Self::Delete { path } => vec![path.as_str()],
            Self::Rename { from, to } => vec![from.as_str(), to.as_str()],
        }
    }
}

/// Pre-transaction content per path; `None` means the file did not exist.
pub type FileSnapshot = BTreeMap<String, Option<String>>;

/// Collects every path touched by `operations`, first occurrence first.
#[must_use]
pub fn affected_paths(operations: &[FileOperation]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    operations
        .iter()
        .flat_map(FileOperation::paths)
        .filter(|path| seen.insert(*path))
        .map(str::to_string)
        .collect()
}
