//! Applying an ordered batch of operations to a project tree.
//!
//! Application happens in two phases. [`OperationApplier::compute`] folds the
//! operations over the snapshot entirely in memory; a transform failure there
//! leaves the disk untouched. [`OperationApplier::apply`] then performs the
//! physical renames in order and reconciles every remaining path with its
//! final content, concurrently.

use crate::collaborator::{ContentTransformer, ReplaceTransformer};
use crate::error::{CoreError, CoreResult, PathFailure};
use crate::fs::{delete_file, rename_file, write_file};
use crate::stats::LineStats;
use crate::types::{FileOperation, FileSnapshot};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, trace};

/// Result of folding a batch over its snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedState {
    /// Content of every touched path after the batch; `None` means absent.
    pub final_state: FileSnapshot,
    /// Line statistics per operation, in operation order.
    pub op_stats: Vec<LineStats>,
}

impl AppliedState {
    /// Totals across all operations.
    #[must_use]
    pub fn stats(&self) -> LineStats {
        self.op_stats.iter().copied().sum()
    }
}

/// Turns operations into filesystem changes under a project directory.
#[derive(Clone)]
pub struct OperationApplier {
    root: PathBuf,
    transformer: Arc<dyn ContentTransformer>,
}

impl std::fmt::Debug for OperationApplier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationApplier")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl OperationApplier {
    /// Creates an applier using [`ReplaceTransformer`].
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_transformer(root, Arc::new(ReplaceTransformer))
    }

    /// Creates an applier with a custom content transformer.
    pub fn with_transformer(
        root: impl Into<PathBuf>,
        transformer: Arc<dyn ContentTransformer>,
    ) -> Self {
        Self {
            root: root.into(),
            transformer,
        }
    }

    /// Returns the project directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Folds `operations` over `original` without touching the disk.
    ///
    /// Each operation sees the result of the previous ones. Paths missing
    /// from `original` are treated as absent.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Transform`] if the transformer fails or a rename
    /// source does not exist at that point of the batch.
    pub fn compute(
        &self,
        operations: &[FileOperation],
        original: &FileSnapshot,
    ) -> CoreResult<AppliedState> {
        let mut state = original.clone();
        let mut op_stats = Vec::with_capacity(operations.len());

        for op in operations {
            let stats = match op {
                FileOperation::Write {
                    path,
                    content,
                    patch_strategy,
                } => {
                    let current = state.get(path).cloned().flatten();
                    let next = self.transformer.transform(
                        path,
                        content,
                        *patch_strategy,
                        current.as_deref(),
                    )?;
                    let stats = LineStats::between(current.as_deref(), Some(&next));
                    state.insert(path.clone(), Some(next));
                    stats
                }
                FileOperation::Delete { path } => {
                    let current = state.insert(path.clone(), None).flatten();
                    LineStats::between(current.as_deref(), None)
                }
                FileOperation::Rename { from, to } => {
                    if from != to {
                        let moved = state.insert(from.clone(), None).flatten().ok_or_else(|| {
                            CoreError::transform(
                                from.as_str(),
                                format!("cannot rename to {to}: source does not exist"),
                            )
                        })?;
                        state.insert(to.clone(), Some(moved));
                    }
                    LineStats::default()
                }
            };
            trace!(?op, added = stats.added, removed = stats.removed, "operation folded");
            op_stats.push(stats);
        }

        Ok(AppliedState {
            final_state: state,
            op_stats,
        })
    }

    /// Applies `operations` to disk.
    ///
    /// Renames run first, in order, for every source that exists on disk at
    /// that point. Every other path whose final content differs from what the
    /// disk holds after those renames is then written or deleted. Failures
    /// are collected for all paths before returning.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Transform`] before any disk change if the fold
    /// fails, or [`CoreError::FileOperations`] naming every failed path.
    pub async fn apply(
        &self,
        operations: &[FileOperation],
        original: &FileSnapshot,
    ) -> CoreResult<AppliedState> {
        let applied = self.compute(operations, original)?;
        let on_disk = self.perform_renames(operations, original).await?;
        self.reconcile(&applied.final_state, &on_disk).await?;
        debug!(
            operations = operations.len(),
            paths = applied.final_state.len(),
            "operations applied"
        );
        Ok(applied)
    }

    /// Performs the physical renames and returns the resulting disk state.
    async fn perform_renames(
        &self,
        operations: &[FileOperation],
        original: &FileSnapshot,
    ) -> CoreResult<FileSnapshot> {
        let mut on_disk = original.clone();

        for op in operations {
            let FileOperation::Rename { from, to } = op else {
                continue;
            };
            if from == to {
                continue;
            }
            let Some(content) = on_disk.get(from).cloned().flatten() else {
                continue;
            };

            rename_file(&self.root.join(from), &self.root.join(to))
                .await
                .map_err(|e| CoreError::FileOperations {
                    failures: vec![PathFailure::new(from.as_str(), e)],
                })?;
            on_disk.insert(from.clone(), None);
            on_disk.insert(to.clone(), Some(content));
            debug!(from = %from, to = %to, "renamed");
        }

        Ok(on_disk)
    }

    async fn reconcile(&self, target: &FileSnapshot, on_disk: &FileSnapshot) -> CoreResult<()> {
        let mut tasks = JoinSet::new();

        for (path, content) in target {
            let current = on_disk.get(path).cloned().flatten();
            if current == *content {
                continue;
            }
            let absolute = self.root.join(path);
            let path = path.clone();
            let content = content.clone();
            tasks.spawn(async move {
                let result = match &content {
                    Some(content) => write_file(&absolute, content).await,
                    None => delete_file(&absolute).await,
                };
                result.map_err(|e| PathFailure::new(path, e))
            });
        }

        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(failure)) => failures.push(failure),
                Err(e) => failures.push(PathFailure::new("<task>", e)),
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            failures.sort_by(|a, b| a.path.cmp(&b.path));
            Err(CoreError::FileOperations { failures })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PatchStrategy;
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn snapshot(entries: &[(&str, Option<&str>)]) -> FileSnapshot {
        entries
            .iter()
            .map(|(p, c)| ((*p).to_string(), c.map(str::to_string)))
            .collect()
    }

    /// Appends the operation content to the current content.
    struct AppendTransformer;

    impl ContentTransformer for AppendTransformer {
        fn transform(
            &self,
            _path: &str,
            content: &str,
            _strategy: PatchStrategy,
            current: Option<&str>,
        ) -> CoreResult<String> {
            Ok(format!("{}{content}", current.unwrap_or_default()))
        }
    }

    #[test]
    fn later_operations_see_earlier_results() {
        let applier = OperationApplier::with_transformer("/unused", Arc::new(AppendTransformer));
        let ops = vec![
            FileOperation::write("a.txt", "1\n"),
            FileOperation::write("a.txt", "2\n"),
            FileOperation::rename("a.txt", "b.txt"),
            FileOperation::write("b.txt", "3\n"),
        ];
        let original = snapshot(&[("a.txt", Some("0\n")), ("b.txt", None)]);

        let applied = applier.compute(&ops, &original).unwrap();
        assert_eq!(applied.final_state["a.txt"], None);
        assert_eq!(applied.final_state["b.txt"].as_deref(), Some("0\n1\n2\n3\n"));
        assert_eq!(applied.stats(), LineStats { added: 3, removed: 0 });
    }

    #[test]
    fn rename_of_missing_source_fails() {
        let applier = OperationApplier::new("/unused");
        let ops = vec![FileOperation::rename("a.txt", "b.txt")];
        let err = applier
            .compute(&ops, &snapshot(&[("a.txt", None), ("b.txt", None)]))
            .unwrap_err();
        assert!(matches!(err, CoreError::Transform { ref path, .. } if path == "a.txt"));
    }

    #[test]
    fn delete_counts_removed_lines() {
        let applier = OperationApplier::new("/unused");
        let ops = vec![FileOperation::delete("a.txt")];
        let applied = applier
            .compute(&ops, &snapshot(&[("a.txt", Some("x\ny\n"))]))
            .unwrap();
        assert_eq!(applied.op_stats, vec![LineStats { added: 0, removed: 2 }]);
    }

    #[tokio::test]
    async fn transform_failure_leaves_disk_untouched() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "A").unwrap();
        let applier = OperationApplier::new(dir.path());
        let ops = vec![
            FileOperation::delete("a.txt"),
            FileOperation::write_with("b.txt", "@@", PatchStrategy::SearchReplace),
        ];

        let err = applier
            .apply(&ops, &snapshot(&[("a.txt", Some("A")), ("b.txt", None)]))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Transform { .. }));
        assert!(dir.path().join("a.txt").exists());
        assert!(!dir.path().join("b.txt").exists());
    }

    #[tokio::test]
    async fn rename_then_write_destination() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "old").unwrap();
        let applier = OperationApplier::new(dir.path());
        let ops = vec![
            FileOperation::rename("a.txt", "sub/b.txt"),
            FileOperation::write("sub/b.txt", "new"),
        ];

        applier
            .apply(&ops, &snapshot(&[("a.txt", Some("old")), ("sub/b.txt", None)]))
            .await
            .unwrap();
        assert!(!dir.path().join("a.txt").exists());
        assert_eq!(std::fs::read_to_string(dir.path().join("sub/b.txt")).unwrap(), "new");
    }

    #[tokio::test]
    async fn rename_of_file_created_in_batch() {
        let dir = tempdir().unwrap();
        let applier = OperationApplier::new(dir.path());
        let ops = vec![
            FileOperation::write("a.txt", "fresh"),
            FileOperation::rename("a.txt", "b.txt"),
        ];

        applier
            .apply(&ops, &snapshot(&[("a.txt", None), ("b.txt", None)]))
            .await
            .unwrap();
        assert!(!dir.path().join("a.txt").exists());
        assert_eq!(std::fs::read_to_string(dir.path().join("b.txt")).unwrap(), "fresh");
    }

    #[tokio::test]
    async fn write_to_rename_source_after_move() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "moved").unwrap();
        let applier = OperationApplier::new(dir.path());
        let ops = vec![
            FileOperation::rename("a.txt", "b.txt"),
            FileOperation::write("a.txt", "replacement"),
        ];

        applier
            .apply(&ops, &snapshot(&[("a.txt", Some("moved")), ("b.txt", None)]))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "replacement");
        assert_eq!(std::fs::read_to_string(dir.path().join("b.txt")).unwrap(), "moved");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn write_failures_are_aggregated() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("blocker"), "").unwrap();
        let applier = OperationApplier::new(dir.path());
        let ops = vec![
            FileOperation::write("blocker/x.txt", "x"),
            FileOperation::write("blocker/y.txt", "y"),
            FileOperation::write("ok.txt", "ok"),
        ];
        let original = snapshot(&[("blocker/x.txt", None), ("blocker/y.txt", None), ("ok.txt", None)]);

        let err = applier.apply(&ops, &original).await.unwrap_err();
        let failed: Vec<_> = err.path_failures().iter().map(|f| f.path.as_str()).collect();
        assert_eq!(failed, vec!["blocker/x.txt", "blocker/y.txt"]);
        // Independent paths still complete.
        assert!(dir.path().join("ok.txt").exists());
    }

    fn op_strategy() -> impl Strategy<Value = FileOperation> {
        let path = prop::sample::select(vec!["a", "b", "c"]);
        prop_oneof![
            (path.clone(), "[a-z]{0,4}").prop_map(|(p, c)| FileOperation::write(p, c)),
            path.clone().prop_map(FileOperation::delete),
            (path.clone(), path).prop_map(|(f, t)| FileOperation::rename(f, t)),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn disk_matches_fold(ops in prop::collection::vec(op_strategy(), 1..8)) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let dir = tempdir().unwrap();
            std::fs::write(dir.path().join("a"), "seed").unwrap();
            let original = snapshot(&[("a", Some("seed")), ("b", None), ("c", None)]);
            let applier = OperationApplier::new(dir.path());

            let Ok(expected) = applier.compute(&ops, &original) else {
                // Invalid batches are rejected before any disk change.
                prop_assert!(runtime.block_on(applier.apply(&ops, &original)).is_err());
                prop_assert_eq!(std::fs::read_to_string(dir.path().join("a")).unwrap(), "seed");
                return Ok(());
            };

            runtime.block_on(applier.apply(&ops, &original)).unwrap();
            for (path, content) in &expected.final_state {
                let on_disk = std::fs::read_to_string(dir.path().join(path)).ok();
                prop_assert_eq!(&on_disk, content, "path {}", path);
            }
        }
    }
}
