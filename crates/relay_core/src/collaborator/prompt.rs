use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Asks the user a yes/no question.
#[async_trait]
pub trait Prompter: Send + Sync {
    /// Returns the user's answer.
    async fn ask(&self, question: &str) -> bool;
}

/// Answers every question with a fixed value.
#[derive(Debug, Clone, Copy)]
pub struct AutoPrompter(pub bool);

#[async_trait]
impl Prompter for AutoPrompter {
    async fn ask(&self, _question: &str) -> bool {
        self.0
    }
}

/// Result of asking for approval out of band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationOutcome {
    /// The user approved.
    Approved,
    /// The user rejected.
    Rejected,
    /// No answer arrived.
    Timeout,
}

/// Out-of-band approval channel such as a desktop notification.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Requests approval for a pending change in `project_id`.
    async fn request_approval(&self, project_id: &str) -> NotificationOutcome;
}

/// A channel that never answers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNotifications;

#[async_trait]
impl NotificationChannel for NoNotifications {
    async fn request_approval(&self, _project_id: &str) -> NotificationOutcome {
        NotificationOutcome::Timeout
    }
}
