//! The transaction lifecycle.

use crate::applier::OperationApplier;
use crate::approval::ApprovalGate;
use crate::branch::create_branch;
use crate::collaborator::{
    AutoPrompter, CheckRunner, ContentTransformer, NotificationChannel, Prompter,
    ReplaceTransformer, ShellCheckRunner, ShellExecutor, SystemShell,
};
use crate::config::{EngineConfig, ProcessOptions};
use crate::error::{CoreError, CoreResult};
use crate::lock::{DirectoryLock, DirectoryTicket};
use crate::record::{TransactionInput, TransactionRecord};
use crate::revert::plan_revert;
use crate::snapshot::SnapshotManager;
use crate::store::TransactionStore;
use crate::transaction::state::{
    CommitSummary, ProcessOutcome, RollbackCause, RollbackSummary, SkipReason,
};
use crate::fs::directory_key;
use crate::types::{affected_paths, FileOperation, TransactionId, TransactionStatus};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Builds the store for a project directory.
pub type StoreFactory = Arc<dyn Fn(&Path) -> CoreResult<TransactionStore> + Send + Sync>;

/// Caches one store per absolute project directory.
struct StoreRegistry {
    factory: StoreFactory,
    stores: Mutex<HashMap<PathBuf, Arc<TransactionStore>>>,
}

impl StoreRegistry {
    fn new(factory: StoreFactory) -> Self {
        Self {
            factory,
            stores: Mutex::new(HashMap::new()),
        }
    }

    fn get(&self, directory: &Path) -> CoreResult<Arc<TransactionStore>> {
        let key = directory_key(directory)?;
        let mut stores = self.stores.lock();
        if let Some(store) = stores.get(&key) {
            return Ok(Arc::clone(store));
        }
        let store = Arc::new((self.factory)(&key)?);
        stores.insert(key, Arc::clone(&store));
        Ok(store)
    }
}

/// Runs transactions from validation to a terminal status.
///
/// ```text
/// Validate -> PreCheck -> Snapshot -> Stage -> Apply -> PostCheck -> Approve -> Commit
///                                        \________________________________/
///                                                       |
///                                                   Rollback
/// ```
///
/// Nothing is written before Stage. From Stage on, every path ends with the
/// record `committed` or `undone`.
///
/// A coordinator does not serialize calls by itself; route concurrent work
/// for one directory through a [`DirectoryLock`], for example with
/// [`submit`](Self::submit).
pub struct TransactionCoordinator {
    config: EngineConfig,
    transformer: Arc<dyn ContentTransformer>,
    shell: Arc<dyn ShellExecutor>,
    check_runner: Arc<dyn CheckRunner>,
    prompter: Arc<dyn Prompter>,
    notifications: Option<Arc<dyn NotificationChannel>>,
    stores: StoreRegistry,
}

impl std::fmt::Debug for TransactionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionCoordinator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TransactionCoordinator {
    /// Creates a coordinator with the default collaborators.
    ///
    /// The default prompter answers "no", so manual approval rejects unless
    /// a real prompter is installed or `auto_approve_all` is set.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            transformer: Arc::new(ReplaceTransformer),
            shell: Arc::new(SystemShell),
            check_runner: Arc::new(ShellCheckRunner::new()),
            prompter: Arc::new(AutoPrompter(false)),
            notifications: None,
            stores: StoreRegistry::new(Arc::new(|dir: &Path| TransactionStore::open(dir))),
        }
    }

    /// Sets the content transformer.
    #[must_use]
    pub fn with_transformer(mut self, transformer: Arc<dyn ContentTransformer>) -> Self {
        self.transformer = transformer;
        self
    }

    /// Sets the shell used for hooks and the branch action.
    #[must_use]
    pub fn with_shell(mut self, shell: Arc<dyn ShellExecutor>) -> Self {
        self.shell = shell;
        self
    }

    /// Sets the check runner.
    #[must_use]
    pub fn with_check_runner(mut self, runner: Arc<dyn CheckRunner>) -> Self {
        self.check_runner = runner;
        self
    }

    /// Sets the interactive prompter.
    #[must_use]
    pub fn with_prompter(mut self, prompter: Arc<dyn Prompter>) -> Self {
        self.prompter = prompter;
        self
    }

    /// Sets the notification channel.
    #[must_use]
    pub fn with_notifications(mut self, channel: Arc<dyn NotificationChannel>) -> Self {
        self.notifications = Some(channel);
        self
    }

    /// Sets how stores are opened for a project directory.
    #[must_use]
    pub fn with_store_factory(mut self, factory: StoreFactory) -> Self {
        self.stores = StoreRegistry::new(factory);
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the store for `directory`, opening it on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened.
    pub fn store(&self, directory: &Path) -> CoreResult<Arc<TransactionStore>> {
        self.stores.get(directory)
    }

    /// Processes one transaction.
    ///
    /// Skips are reported as [`ProcessOutcome::Skipped`] and write nothing.
    /// Failures after staging are rolled back and reported as
    /// [`ProcessOutcome::RolledBack`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidIdentifier`] for a malformed id. Other
    /// errors come from the store or from snapshotting before anything was
    /// written.
    pub async fn process(
        &self,
        mut input: TransactionInput,
        options: &ProcessOptions,
    ) -> CoreResult<ProcessOutcome> {
        let started = Instant::now();
        let dir = options.directory.as_path();

        // Validate
        if input.project_id != self.config.project_id {
            let reason = SkipReason::ProjectMismatch {
                expected: self.config.project_id.clone(),
                actual: input.project_id.clone(),
            };
            warn!(%reason, "skipping transaction");
            return Ok(ProcessOutcome::Skipped(reason));
        }

        let id = TransactionId::parse(&input.id)?;
        let store = self.store(dir)?;

        let existing = on_store(&store, move |s| s.find_by_id(&id)).await?;
        if let Some(existing) = existing.filter(|r| r.status.is_terminal()) {
            let reason = SkipReason::AlreadyProcessed {
                status: existing.status,
            };
            info!(id = %id, %reason, "skipping transaction");
            return Ok(ProcessOutcome::Skipped(reason));
        }

        input.operations = match self.validate_operations(&input.operations) {
            Ok(operations) => operations,
            Err(reason) => {
                warn!(id = %id, %reason, "skipping transaction");
                return Ok(ProcessOutcome::Skipped(reason));
            }
        };

        // PreCheck
        if let Some(reason) = self.run_pre_command(dir).await {
            warn!(id = %id, %reason, "skipping transaction");
            return Ok(ProcessOutcome::Skipped(reason));
        }

        // Snapshot
        let snapshots = SnapshotManager::new(dir);
        let snapshot = snapshots
            .create_snapshot(affected_paths(&input.operations))
            .await?;

        // Stage
        let record = TransactionRecord::pending(id, &input, snapshot);
        let staged = record.clone();
        on_store(&store, move |s| s.insert(&staged)).await?;
        info!(id = %id, operations = record.operations.len(), "transaction staged");

        let summary = match self.apply_and_commit(&record, &store, options).await {
            Ok(Some(summary)) => summary,
            Ok(None) => {
                return self
                    .rollback(&store, &snapshots, &record, RollbackCause::Rejected)
                    .await;
            }
            Err(e) => {
                return self
                    .rollback(&store, &snapshots, &record, RollbackCause::Failed(e.to_string()))
                    .await;
            }
        };

        // The record is final; nothing below may undo it.
        let branch = if self.config.git.auto_git_branch {
            create_branch(self.shell.as_ref(), &self.config.git, &record, dir).await
        } else {
            None
        };

        info!(
            id = %id,
            lines_added = summary.stats.added,
            lines_removed = summary.stats.removed,
            "Summary: {} file operation(s) applied in {:.2}s. Linter errors: {}.",
            record.operations.len(),
            started.elapsed().as_secs_f64(),
            summary.error_count,
        );

        Ok(ProcessOutcome::Committed(CommitSummary { branch, ..summary }))
    }

    /// Queues [`process`](Self::process) behind earlier work for the same
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the work cannot be queued.
    pub fn submit(
        self: &Arc<Self>,
        lock: &DirectoryLock,
        input: TransactionInput,
        options: ProcessOptions,
    ) -> CoreResult<DirectoryTicket<CoreResult<ProcessOutcome>>> {
        let coordinator = Arc::clone(self);
        let directory = options.directory.clone();
        lock.process(&directory, async move {
            coordinator.process(input, &options).await
        })
    }

    /// Reverts a committed transaction by processing its inverse.
    ///
    /// `identifier` is a transaction id or a 1-based recency index. Returns
    /// `None` if no matching transaction exists or it needs no revert.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or processing fails.
    pub async fn revert(
        &self,
        identifier: &str,
        include_reverts: bool,
        options: &ProcessOptions,
    ) -> CoreResult<Option<ProcessOutcome>> {
        let store = self.store(&options.directory)?;
        let lookup = identifier.to_string();
        let target =
            on_store(&store, move |s| s.find_by_identifier(&lookup, !include_reverts)).await?;
        let Some(target) = target else {
            info!(identifier, "no committed transaction to revert");
            return Ok(None);
        };
        let Some(input) = plan_revert(&target, &self.config.project_id) else {
            warn!(id = %target.id, "nothing to revert");
            return Ok(None);
        };

        info!(id = %target.id, revert_id = %input.id, "reverting transaction");
        self.process(input, options).await.map(Some)
    }

    /// Checks the batch size and rewrites every path to its canonical form.
    fn validate_operations(
        &self,
        operations: &[FileOperation],
    ) -> Result<Vec<FileOperation>, SkipReason> {
        let count = operations.len();
        let min = self.config.min_file_changes;
        if min > 0 && count < min {
            return Err(SkipReason::TooFewOperations { count, min });
        }
        if let Some(max) = self.config.max_file_changes {
            if count > max {
                return Err(SkipReason::TooManyOperations { count, max });
            }
        }
        operations.iter().map(canonical_operation).collect()
    }

    async fn run_pre_command(&self, dir: &Path) -> Option<SkipReason> {
        let command = self.config.pre_command.trim();
        if command.is_empty() {
            return None;
        }
        match self.shell.run(command, dir).await {
            Ok(output) if output.success() => None,
            Ok(output) => {
                debug!(stderr = %output.stderr, "pre-command output");
                Some(SkipReason::PreCommandFailed {
                    exit_code: output.exit_code,
                })
            }
            Err(e) => {
                warn!(error = %e, "pre-command could not run");
                Some(SkipReason::PreCommandFailed { exit_code: -1 })
            }
        }
    }

    /// Everything between Stage and Commit. `Ok(None)` means rejected.
    async fn apply_and_commit(
        &self,
        record: &TransactionRecord,
        store: &Arc<TransactionStore>,
        options: &ProcessOptions,
    ) -> CoreResult<Option<CommitSummary>> {
        let dir = options.directory.as_path();

        // Apply
        let applier = OperationApplier::with_transformer(dir, Arc::clone(&self.transformer));
        let applied = applier.apply(&record.operations, &record.snapshot).await?;
        let stats = applied.stats();

        // PostCheck
        let post_command = self.config.post_command.trim();
        if !post_command.is_empty() {
            let output = self.shell.run(post_command, dir).await?;
            if !output.success() {
                return Err(CoreError::PostCommandFailed {
                    exit_code: output.exit_code,
                    stderr: output.stderr,
                });
            }
        }

        // Lint + approve
        let error_count = self.check_errors(dir).await;
        info!(
            id = %record.id,
            lines_added = stats.added,
            lines_removed = stats.removed,
            error_count,
            "changes applied"
        );

        let decision = self
            .gate(options)
            .decide(&record.project_id, error_count)
            .await;
        if !decision.approved {
            info!(id = %record.id, source = %decision.source, "transaction rejected");
            return Ok(None);
        }

        // Commit
        let id = record.id;
        let committed = on_store(store, move |s| {
            let updated = s.update_pending(&id, |r| {
                r.approved = true;
                r.set_line_stats(stats);
            })?;
            if !updated {
                return Ok(false);
            }
            s.set_status(&id, TransactionStatus::Pending, TransactionStatus::Committed)
        })
        .await?;
        if !committed {
            return Err(CoreError::invalid_operation(format!(
                "transaction {id} is no longer pending"
            )));
        }
        info!(id = %record.id, source = %decision.source, "transaction committed");

        Ok(Some(CommitSummary {
            id: record.id,
            stats,
            error_count,
            branch: None,
        }))
    }

    async fn rollback(
        &self,
        store: &Arc<TransactionStore>,
        snapshots: &SnapshotManager,
        record: &TransactionRecord,
        cause: RollbackCause,
    ) -> CoreResult<ProcessOutcome> {
        if let RollbackCause::Failed(message) = &cause {
            warn!(id = %record.id, error = %message, "transaction failed, rolling back");
        } else {
            info!(id = %record.id, "rolling back rejected transaction");
        }

        let restore_error = match snapshots.restore_snapshot(&record.snapshot).await {
            Ok(()) => {
                info!(id = %record.id, "files restored");
                None
            }
            Err(e) => {
                error!(
                    id = %record.id,
                    error = %e,
                    "rollback incomplete, manual recovery may be required"
                );
                Some(e.to_string())
            }
        };

        // Undone even if restoring failed; it must not stay pending.
        let id = record.id;
        on_store(store, move |s| {
            s.set_status(&id, TransactionStatus::Pending, TransactionStatus::Undone)
        })
        .await?;

        Ok(ProcessOutcome::RolledBack(RollbackSummary {
            id: record.id,
            cause,
            restore_error,
        }))
    }

    async fn check_errors(&self, dir: &Path) -> u32 {
        let command = self.config.linter.trim();
        if command.is_empty() {
            return 0;
        }
        match self.check_runner.error_count(command, dir).await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "check could not run, counting one error");
                1
            }
        }
    }

    fn gate(&self, options: &ProcessOptions) -> ApprovalGate {
        let prompter: Arc<dyn Prompter> = if options.auto_approve_all {
            Arc::new(AutoPrompter(true))
        } else {
            Arc::clone(&self.prompter)
        };
        let gate = ApprovalGate::new(
            self.config.approval_mode,
            self.config.approval_on_error_count,
            prompter,
        );
        match &self.notifications {
            Some(channel) if self.config.enable_notifications => {
                gate.with_notifications(Arc::clone(channel), self.config.notification_timeout())
            }
            _ => gate,
        }
    }
}

/// Runs blocking store I/O on the blocking pool.
async fn on_store<T, F>(store: &Arc<TransactionStore>, f: F) -> CoreResult<T>
where
    F: FnOnce(&TransactionStore) -> CoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || f(&store))
        .await
        .map_err(|e| CoreError::invalid_operation(format!("store task failed: {e}")))?
}

fn canonical_operation(op: &FileOperation) -> Result<FileOperation, SkipReason> {
    let canonical = |path: &str| {
        canonical_path(path).ok_or_else(|| SkipReason::UnsafePath {
            path: path.to_string(),
        })
    };
    Ok(match op {
        FileOperation::Write {
            path,
            content,
            patch_strategy,
        } => FileOperation::Write {
            path: canonical(path)?,
            content: content.clone(),
            patch_strategy: *patch_strategy,
        },
        FileOperation::Delete { path } => FileOperation::Delete {
            path: canonical(path)?,
        },
        FileOperation::Rename { from, to } => FileOperation::Rename {
            from: canonical(from)?,
            to: canonical(to)?,
        },
    })
}

/// Joins the normal components of `path` with `/`.
///
/// Returns `None` for empty, absolute or parent-escaping paths, so two
/// spellings of one file always map to the same key.
fn canonical_path(path: &str) -> Option<String> {
    let mut parts = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {}
            _ => return None,
        }
    }
    (!parts.is_empty()).then(|| parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn coordinator(config: EngineConfig) -> TransactionCoordinator {
        TransactionCoordinator::new(config)
            .with_store_factory(Arc::new(|_: &Path| Ok(TransactionStore::in_memory())))
    }

    #[test]
    fn canonical_paths() {
        assert_eq!(canonical_path("a.txt").as_deref(), Some("a.txt"));
        assert_eq!(canonical_path("./a.txt").as_deref(), Some("a.txt"));
        assert_eq!(canonical_path("src/./lib.rs").as_deref(), Some("src/lib.rs"));
        assert_eq!(canonical_path("a//b/").as_deref(), Some("a/b"));
        assert_eq!(canonical_path(""), None);
        assert_eq!(canonical_path("."), None);
        assert_eq!(canonical_path("/etc/passwd"), None);
        assert_eq!(canonical_path("../outside"), None);
        assert_eq!(canonical_path("a/../../b"), None);
    }

    #[test]
    fn operations_are_rewritten_to_canonical_paths() {
        let coordinator = coordinator(EngineConfig::new("p"));
        let operations = coordinator
            .validate_operations(&[
                FileOperation::write("./a.txt", "x"),
                FileOperation::delete("src//lib.rs"),
                FileOperation::rename("./a.txt", "docs/./b.txt"),
            ])
            .unwrap();
        assert_eq!(
            operations,
            vec![
                FileOperation::write("a.txt", "x"),
                FileOperation::delete("src/lib.rs"),
                FileOperation::rename("a.txt", "docs/b.txt"),
            ]
        );

        let unsafe_path = coordinator
            .validate_operations(&[FileOperation::rename("a.txt", "../b.txt")])
            .unwrap_err();
        assert_eq!(
            unsafe_path,
            SkipReason::UnsafePath {
                path: "../b.txt".into()
            }
        );
    }

    #[tokio::test]
    async fn commits_with_defaults() {
        let dir = tempdir().unwrap();
        let coordinator = coordinator(EngineConfig::new("p"));
        let input = TransactionInput::new("p", vec![FileOperation::write("a.txt", "X\n")]);
        let id = TransactionId::parse(&input.id).unwrap();

        let outcome = coordinator
            .process(input, &ProcessOptions::new(dir.path()))
            .await
            .unwrap();
        assert!(outcome.is_committed());

        let record = coordinator.store(dir.path()).unwrap().find_by_id(&id).unwrap().unwrap();
        assert_eq!(record.status, TransactionStatus::Committed);
        assert!(record.approved);
        assert_eq!(record.lines_added, Some(1));
        assert_eq!(record.lines_difference, Some(1));
    }

    #[tokio::test]
    async fn invalid_identifier_is_an_error() {
        let dir = tempdir().unwrap();
        let coordinator = coordinator(EngineConfig::new("p"));
        let input = TransactionInput::new("p", vec![FileOperation::write("a.txt", "X")])
            .with_id("not-a-uuid");

        let err = coordinator
            .process(input, &ProcessOptions::new(dir.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidIdentifier { .. }));
        assert!(!dir.path().join("a.txt").exists());
    }

    #[tokio::test]
    async fn unsafe_path_is_skipped() {
        let dir = tempdir().unwrap();
        let coordinator = coordinator(EngineConfig::new("p"));
        let input = TransactionInput::new("p", vec![FileOperation::write("../escape.txt", "X")]);

        let outcome = coordinator
            .process(input, &ProcessOptions::new(dir.path()))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            ProcessOutcome::Skipped(SkipReason::UnsafePath { .. })
        ));
        assert!(coordinator.store(dir.path()).unwrap().all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn store_is_cached_per_directory() {
        let a = tempdir().unwrap();
        let b = tempdir().unwrap();
        let coordinator = coordinator(EngineConfig::new("p"));

        let first = coordinator.store(a.path()).unwrap();
        let again = coordinator.store(a.path()).unwrap();
        let other = coordinator.store(b.path()).unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &other));
    }
}
