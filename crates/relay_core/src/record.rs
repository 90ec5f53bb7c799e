//! Durable transaction records and the inputs that create them.

use crate::stats::LineStats;
use crate::types::{FileOperation, FileSnapshot, TransactionId, TransactionStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reasoning prefix that marks a transaction as the revert of another one.
pub const REVERT_PREFIX: &str = "Reverting transaction ";

/// A batch of operations proposed for one transaction.
///
/// The id is kept as text so that malformed identifiers can be reported by
/// the coordinator instead of failing at deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInput {
    /// Proposed transaction id.
    #[serde(alias = "uuid")]
    pub id: String,
    /// Project the batch was generated for.
    pub project_id: String,
    /// Operations, applied in order.
    pub operations: Vec<FileOperation>,
    /// Free-text justification.
    #[serde(default)]
    pub reasoning: Vec<String>,
    /// Commit message proposed for external version control.
    #[serde(default)]
    pub git_commit_msg: Option<String>,
    /// Short summary of the prompt that produced the batch.
    #[serde(default)]
    pub prompt_summary: Option<String>,
}

impl TransactionInput {
    /// Creates an input with a fresh id.
    pub fn new(project_id: impl Into<String>, operations: Vec<FileOperation>) -> Self {
        Self {
            id: TransactionId::new().to_string(),
            project_id: project_id.into(),
            operations,
            reasoning: Vec::new(),
            git_commit_msg: None,
            prompt_summary: None,
        }
    }

    /// Sets the id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the reasoning lines.
    #[must_use]
    pub fn with_reasoning<I, S>(mut self, reasoning: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reasoning = reasoning.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the commit message.
    #[must_use]
    pub fn with_git_commit_msg(mut self, message: impl Into<String>) -> Self {
        self.git_commit_msg = Some(message.into());
        self
    }
}

/// The durable representation of one transaction and its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    /// Unique id.
    #[serde(alias = "uuid")]
    pub id: TransactionId,
    /// Owning project.
    pub project_id: String,
    /// Creation time; never changes.
    pub created_at: DateTime<Utc>,
    /// Lifecycle status.
    pub status: TransactionStatus,
    /// Set immediately before commit.
    pub approved: bool,
    /// Operations in application order.
    pub operations: Vec<FileOperation>,
    /// Content of every touched path before the transaction.
    pub snapshot: FileSnapshot,
    /// Free-text justification.
    pub reasoning: Vec<String>,
    /// Commit message proposed for external version control.
    #[serde(default)]
    pub git_commit_msg: Option<String>,
    /// Short summary of the originating prompt.
    #[serde(default)]
    pub prompt_summary: Option<String>,
    /// Lines added across all operations.
    #[serde(default)]
    pub lines_added: Option<u64>,
    /// Lines removed across all operations.
    #[serde(default)]
    pub lines_removed: Option<u64>,
    /// `lines_added - lines_removed`.
    #[serde(default)]
    pub lines_difference: Option<i64>,
    /// When the change was recorded into external version control.
    #[serde(default)]
    pub git_committed_at: Option<DateTime<Utc>>,
}

impl TransactionRecord {
    /// Creates a `pending` record from a validated input and its snapshot.
    pub fn pending(id: TransactionId, input: &TransactionInput, snapshot: FileSnapshot) -> Self {
        Self {
            id,
            project_id: input.project_id.clone(),
            created_at: Utc::now(),
            status: TransactionStatus::Pending,
            approved: false,
            operations: input.operations.clone(),
            snapshot,
            reasoning: input.reasoning.clone(),
            git_commit_msg: input.git_commit_msg.clone(),
            prompt_summary: input.prompt_summary.clone(),
            lines_added: None,
            lines_removed: None,
            lines_difference: None,
            git_committed_at: None,
        }
    }

    /// Stores line statistics on the record.
    pub fn set_line_stats(&mut self, stats: LineStats) {
        self.lines_added = Some(stats.added);
        self.lines_removed = Some(stats.removed);
        self.lines_difference = Some(stats.difference());
    }

    /// Returns the stored line statistics, if computed.
    #[must_use]
    pub fn line_stats(&self) -> Option<LineStats> {
        Some(LineStats {
            added: self.lines_added?,
            removed: self.lines_removed?,
        })
    }

    /// Returns true if this record reverts another transaction.
    #[must_use]
    pub fn is_revert(&self) -> bool {
        self.reasoning.iter().any(|r| r.starts_with(REVERT_PREFIX))
    }

    /// Returns the id of the transaction this record reverts, if any.
    ///
    /// Recognizes reasoning lines of the form `Reverting transaction <uuid>.`.
    #[must_use]
    pub fn reverted_id(&self) -> Option<TransactionId> {
        self.reasoning.iter().find_map(|line| {
            let rest = line.strip_prefix(REVERT_PREFIX)?;
            let (candidate, _) = rest.split_once('.')?;
            TransactionId::parse(candidate).ok()
        })
    }

    /// Returns the first reasoning line, or a placeholder.
    #[must_use]
    pub fn headline(&self) -> &str {
        self.reasoning
            .first()
            .map(String::as_str)
            .filter(|line| !line.trim().is_empty())
            .unwrap_or("No reasoning provided.")
    }
}
