//! The commit-or-rollback decision.

use crate::collaborator::{NotificationChannel, NotificationOutcome, Prompter};
use crate::config::ApprovalMode;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Question asked when falling back to the interactive prompt.
pub const APPROVAL_QUESTION: &str = "Do you want to approve and commit these changes?";

/// Who made the approval decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionSource {
    /// Auto mode, within the error threshold.
    Automatic,
    /// The notification channel answered.
    Notification,
    /// The interactive prompt answered.
    Prompt,
}

impl fmt::Display for DecisionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Automatic => "automatic",
            Self::Notification => "notification",
            Self::Prompt => "prompt",
        })
    }
}

/// Result of [`ApprovalGate::decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApprovalDecision {
    /// Whether the transaction may be committed.
    pub approved: bool,
    /// Who decided.
    pub source: DecisionSource,
}

/// Decides whether an applied transaction is committed.
///
/// In [`ApprovalMode::Auto`] a check error count within the threshold
/// approves immediately; anything above escalates to the manual path. The
/// manual path asks the notification channel first (bounded by a timeout)
/// and only falls back to the prompt when the channel times out or is
/// absent.
#[derive(Clone)]
pub struct ApprovalGate {
    mode: ApprovalMode,
    threshold: u32,
    notifications: Option<Arc<dyn NotificationChannel>>,
    notification_timeout: Duration,
    prompter: Arc<dyn Prompter>,
}

impl fmt::Debug for ApprovalGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApprovalGate")
            .field("mode", &self.mode)
            .field("threshold", &self.threshold)
            .field("notifications", &self.notifications.is_some())
            .field("notification_timeout", &self.notification_timeout)
            .finish_non_exhaustive()
    }
}

impl ApprovalGate {
    /// Creates a gate that prompts with `prompter` and has no notification
    /// channel.
    pub fn new(mode: ApprovalMode, threshold: u32, prompter: Arc<dyn Prompter>) -> Self {
        Self {
            mode,
            threshold,
            notifications: None,
            notification_timeout: Duration::from_secs(30),
            prompter,
        }
    }

    /// Attaches a notification channel consulted before the prompt.
    #[must_use]
    pub fn with_notifications(
        mut self,
        channel: Arc<dyn NotificationChannel>,
        timeout: Duration,
    ) -> Self {
        self.notifications = Some(channel);
        self.notification_timeout = timeout;
        self
    }

    /// Decides for a transaction of `project_id` whose check reported
    /// `error_count` errors.
    pub async fn decide(&self, project_id: &str, error_count: u32) -> ApprovalDecision {
        if self.mode == ApprovalMode::Auto {
            if error_count <= self.threshold {
                debug!(error_count, threshold = self.threshold, "auto-approved");
                return ApprovalDecision {
                    approved: true,
                    source: DecisionSource::Automatic,
                };
            }
            info!(
                error_count,
                threshold = self.threshold,
                "check errors exceed threshold, asking for approval"
            );
        }

        if let Some(approved) = self.ask_channel(project_id).await {
            return ApprovalDecision {
                approved,
                source: DecisionSource::Notification,
            };
        }

        ApprovalDecision {
            approved: self.prompter.ask(APPROVAL_QUESTION).await,
            source: DecisionSource::Prompt,
        }
    }

    async fn ask_channel(&self, project_id: &str) -> Option<bool> {
        let channel = self.notifications.as_ref()?;
        let outcome = tokio::time::timeout(
            self.notification_timeout,
            channel.request_approval(project_id),
        )
        .await
        .unwrap_or(NotificationOutcome::Timeout);

        match outcome {
            NotificationOutcome::Approved => Some(true),
            NotificationOutcome::Rejected => Some(false),
            NotificationOutcome::Timeout => {
                debug!("notification timed out, falling back to prompt");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::{AutoPrompter, NoNotifications};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingPrompter {
        answer: bool,
        asked: AtomicUsize,
    }

    #[async_trait]
    impl Prompter for CountingPrompter {
        async fn ask(&self, _question: &str) -> bool {
            self.asked.fetch_add(1, Ordering::SeqCst);
            self.answer
        }
    }

    struct Fixed(NotificationOutcome);

    #[async_trait]
    impl NotificationChannel for Fixed {
        async fn request_approval(&self, _project_id: &str) -> NotificationOutcome {
            self.0
        }
    }

    struct Silent;

    #[async_trait]
    impl NotificationChannel for Silent {
        async fn request_approval(&self, _project_id: &str) -> NotificationOutcome {
            std::future::pending::<()>().await;
            NotificationOutcome::Approved
        }
    }

    fn counting(answer: bool) -> Arc<CountingPrompter> {
        Arc::new(CountingPrompter {
            answer,
            asked: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn auto_within_threshold_does_not_prompt() {
        let prompter = counting(false);
        let gate = ApprovalGate::new(ApprovalMode::Auto, 2, prompter.clone());

        let decision = gate.decide("p", 2).await;
        assert_eq!(
            decision,
            ApprovalDecision {
                approved: true,
                source: DecisionSource::Automatic
            }
        );
        assert_eq!(prompter.asked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn auto_above_threshold_escalates() {
        let prompter = counting(false);
        let gate = ApprovalGate::new(ApprovalMode::Auto, 0, prompter.clone());

        let decision = gate.decide("p", 1).await;
        assert!(!decision.approved);
        assert_eq!(decision.source, DecisionSource::Prompt);
        assert_eq!(prompter.asked.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn notification_short_circuits_prompt() {
        for (outcome, approved) in [
            (NotificationOutcome::Approved, true),
            (NotificationOutcome::Rejected, false),
        ] {
            let prompter = counting(!approved);
            let gate = ApprovalGate::new(ApprovalMode::Manual, 0, prompter.clone())
                .with_notifications(Arc::new(Fixed(outcome)), Duration::from_secs(1));

            let decision = gate.decide("p", 0).await;
            assert_eq!(decision.approved, approved);
            assert_eq!(decision.source, DecisionSource::Notification);
            assert_eq!(prompter.asked.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn timeout_falls_back_to_prompt() {
        let gate = ApprovalGate::new(ApprovalMode::Manual, 0, Arc::new(AutoPrompter(true)))
            .with_notifications(Arc::new(NoNotifications), Duration::from_secs(1));
        let decision = gate.decide("p", 0).await;
        assert!(decision.approved);
        assert_eq!(decision.source, DecisionSource::Prompt);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_channel_times_out() {
        let gate = ApprovalGate::new(ApprovalMode::Manual, 0, Arc::new(AutoPrompter(false)))
            .with_notifications(Arc::new(Silent), Duration::from_secs(30));
        let decision = gate.decide("p", 0).await;
        assert!(!decision.approved);
        assert_eq!(decision.source, DecisionSource::Prompt);
    }
}
