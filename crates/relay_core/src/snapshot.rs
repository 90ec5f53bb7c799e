//! Capturing and restoring the pre-transaction state of a file set.

use crate::error::{CoreError, CoreResult, PathFailure};
use crate::fs::{delete_file, read_optional, remove_empty_parent_directories, write_file};
use crate::types::FileSnapshot;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Reads and restores snapshots relative to a project directory.
#[derive(Debug, Clone)]
pub struct SnapshotManager {
    root: PathBuf,
}

impl SnapshotManager {
    /// Creates a manager rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the project directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Records the current content of every path.
    ///
    /// Paths that do not exist are recorded as `None`. Reads run
    /// concurrently.
    ///
    /// # Errors
    ///
    /// Returns an error if any existing file cannot be read.
    pub async fn create_snapshot<I, S>(&self, paths: I) -> CoreResult<FileSnapshot>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut reads = JoinSet::new();
        for path in paths {
            let path: String = path.into();
            let absolute = self.root.join(&path);
            reads.spawn(async move {
                let content = read_optional(&absolute).await;
                (path, content)
            });
        }

        let mut snapshot = FileSnapshot::new();
        while let Some(joined) = reads.join_next().await {
            let (path, content) = joined.map_err(|e| CoreError::invalid_operation(e.to_string()))?;
            snapshot.insert(path, content?);
        }

        debug!(paths = snapshot.len(), "snapshot captured");
        Ok(snapshot)
    }

    /// Writes `snapshot` back to disk.
    ///
    /// Paths recorded as absent are deleted, then any directories left empty
    /// by those deletions are removed, deepest first, without ever removing
    /// the project directory. Every path is attempted even if some fail.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RollbackFailed`] listing every path that could not
    /// be restored.
    pub async fn restore_snapshot(&self, snapshot: &FileSnapshot) -> CoreResult<()> {
        let mut tasks = JoinSet::new();
        let mut vacated_dirs = BTreeSet::new();

        for (path, content) in snapshot {
            let absolute = self.root.join(path);
            if content.is_none() {
                if let Some(parent) = absolute.parent() {
                    vacated_dirs.insert(parent.to_path_buf());
                }
            }
            let path = path.clone();
            let content = content.clone();
            tasks.spawn(async move {
                let result = match content {
                    Some(content) => write_file(&absolute, &content).await,
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

        // Deepest first so a parent is only examined after its children.
        let mut dirs: Vec<PathBuf> = vacated_dirs.into_iter().collect();
        dirs.sort_by_key(|dir| std::cmp::Reverse(dir.components().count()));
        for dir in dirs {
            let removed = remove_empty_parent_directories(&dir, &self.root).await;
            if removed > 0 {
                debug!(dir = %dir.display(), removed, "removed empty directories");
            }
        }

        if failures.is_empty() {
            debug!(paths = snapshot.len(), "snapshot restored");
            Ok(())
        } else {
            failures.sort_by(|a, b| a.path.cmp(&b.path));
            warn!(failed = failures.len(), "snapshot restore incomplete");
            Err(CoreError::RollbackFailed { failures })
        }
    }
}
