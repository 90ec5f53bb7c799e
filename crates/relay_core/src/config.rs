//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// How a batch gets approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalMode {
    /// Approve automatically while the check error count stays within the
    /// configured threshold.
    #[default]
    Auto,
    /// Always ask.
    Manual,
}

/// Where the post-commit branch name comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BranchTemplate {
    /// The transaction id.
    #[default]
    Uuid,
    /// The proposed commit message, falling back to the id.
    GitCommitMsg,
}

/// Post-commit branch settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GitConfig {
    /// Create a branch after every commit.
    pub auto_git_branch: bool,
    /// Prefix of created branch names.
    pub git_branch_prefix: String,
    /// Source of the branch name segment.
    pub git_branch_template: BranchTemplate,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            auto_git_branch: false,
            git_branch_prefix: "relay/".to_string(),
            git_branch_template: BranchTemplate::Uuid,
        }
    }
}

/// Configuration for a [`TransactionCoordinator`](crate::TransactionCoordinator).
///
/// # Example
///
/// ```
/// use relay_core::{ApprovalMode, EngineConfig};
///
/// let config = EngineConfig::new("my-project")
///     .approval_mode(ApprovalMode::Manual)
///     .linter("cargo check")
///     .max_file_changes(Some(20));
/// assert_eq!(config.project_id, "my-project");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Inputs for any other project are skipped.
    pub project_id: String,
    /// Approval mode.
    pub approval_mode: ApprovalMode,
    /// Highest check error count that is still auto-approved.
    pub approval_on_error_count: u32,
    /// Check command. Empty means no check.
    pub linter: String,
    /// Hook run before anything is touched. Empty means none.
    pub pre_command: String,
    /// Hook run after operations are applied. Empty means none.
    pub post_command: String,
    /// Minimum number of operations. Zero means no lower bound.
    pub min_file_changes: usize,
    /// Maximum number of operations.
    pub max_file_changes: Option<usize>,
    /// Consult the notification channel before prompting.
    pub enable_notifications: bool,
    /// How long to wait for the notification channel.
    pub notification_timeout_secs: u64,
    /// Post-commit branch settings.
    pub git: GitConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            approval_mode: ApprovalMode::Auto,
            approval_on_error_count: 0,
            linter: String::new(),
            pre_command: String::new(),
            post_command: String::new(),
            min_file_changes: 0,
            max_file_changes: None,
            enable_notifications: true,
            notification_timeout_secs: 30,
            git: GitConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Creates a default configuration for `project_id`.
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            ..Self::default()
        }
    }

    /// Sets the approval mode.
    #[must_use]
    pub fn approval_mode(mut self, mode: ApprovalMode) -> Self {
        self.approval_mode = mode;
        self
    }

    /// Sets the auto-approve threshold.
    #[must_use]
    pub fn approval_on_error_count(mut self, count: u32) -> Self {
        self.approval_on_error_count = count;
        self
    }

    /// Sets the check command.
    #[must_use]
    pub fn linter(mut self, command: impl Into<String>) -> Self {
        self.linter = command.into();
        self
    }

    /// Sets the pre-command hook.
    #[must_use]
    pub fn pre_command(mut self, command: impl Into<String>) -> Self {
        self.pre_command = command.into();
        self
    }

    /// Sets the post-command hook.
    #[must_use]
    pub fn post_command(mut self, command: impl Into<String>) -> Self {
        self.post_command = command.into();
        self
    }

    /// Sets the minimum operation count.
    #[must_use]
    pub fn min_file_changes(mut self, count: usize) -> Self {
        self.min_file_changes = count;
        self
    }

    /// Sets the maximum operation count.
    #[must_use]
    pub fn max_file_changes(mut self, count: Option<usize>) -> Self {
        self.max_file_changes = count;
        self
    }

    /// Enables or disables the notification channel.
    #[must_use]
    pub fn enable_notifications(mut self, enabled: bool) -> Self {
        self.enable_notifications = enabled;
        self
    }

    /// Sets the notification timeout in seconds.
    #[must_use]
    pub fn notification_timeout_secs(mut self, secs: u64) -> Self {
        self.notification_timeout_secs = secs;
        self
    }

    /// Sets the post-commit branch settings.
    #[must_use]
    pub fn git(mut self, git: GitConfig) -> Self {
        self.git = git;
        self
    }

    /// Returns the notification timeout.
    #[must_use]
    pub fn notification_timeout(&self) -> Duration {
        Duration::from_secs(self.notification_timeout_secs)
    }
}

/// Per-call options for [`TransactionCoordinator::process`](crate::TransactionCoordinator::process).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOptions {
    /// Project directory all operation paths are relative to.
    pub directory: PathBuf,
    /// Answer the interactive prompt with "yes" without asking.
    pub auto_approve_all: bool,
}

impl ProcessOptions {
    /// Creates options for `directory`.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            auto_approve_all: false,
        }
    }

    /// Sets `auto_approve_all`.
    #[must_use]
    pub fn auto_approve_all(mut self, yes: bool) -> Self {
        self.auto_approve_all = yes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.approval_mode, ApprovalMode::Auto);
        assert_eq!(config.approval_on_error_count, 0);
        assert!(config.linter.is_empty());
        assert_eq!(config.max_file_changes, None);
        assert!(config.enable_notifications);
        assert_eq!(config.notification_timeout(), Duration::from_secs(30));
        assert_eq!(config.git.git_branch_prefix, "relay/");
        assert!(!config.git.auto_git_branch);
    }

    #[test]
    fn deserializes_partial_camel_case() {
        let json = r#"{
            "projectId": "demo",
            "approvalMode": "manual",
            "maxFileChanges": 5,
            "git": { "autoGitBranch": true, "gitBranchTemplate": "gitCommitMsg" }
        }"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.project_id, "demo");
        assert_eq!(config.approval_mode, ApprovalMode::Manual);
        assert_eq!(config.max_file_changes, Some(5));
        assert!(config.git.auto_git_branch);
        assert_eq!(config.git.git_branch_template, BranchTemplate::GitCommitMsg);
        assert_eq!(config.git.git_branch_prefix, "relay/");
        assert_eq!(config.min_file_changes, 0);
    }

    #[test]
    fn builder() {
        let config = EngineConfig::new("p")
            .approval_on_error_count(3)
            .pre_command("make prep")
            .post_command("make test")
            .min_file_changes(2)
            .enable_notifications(false);
        assert_eq!(config.approval_on_error_count, 3);
        assert_eq!(config.pre_command, "make prep");
        assert_eq!(config.post_command, "make test");
        assert_eq!(config.min_file_changes, 2);
        assert!(!config.enable_notifications);

        let options = ProcessOptions::new("/tmp/p").auto_approve_all(true);
        assert!(options.auto_approve_all);
    }
}
