//! Test fixtures and project helpers.
//!
//! Provides temporary project directories and convenience functions for
//! building inputs against them.

use relay_core::{
    EngineConfig, FileOperation, ProcessOptions, TransactionCoordinator, TransactionInput,
    TransactionStore, STATE_DIR,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use crate::collaborators::{FixedCheckRunner, ScriptedPrompter};

/// Project id used by fixtures.
pub const TEST_PROJECT_ID: &str = "test-project";

/// A temporary project directory with automatic cleanup.
pub struct TestProject {
    dir: TempDir,
}

impl TestProject {
    /// Creates an empty project.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Creates a project containing `files`.
    pub fn with_files(files: &[(&str, &str)]) -> Self {
        let project = Self::new();
        for (path, content) in files {
            project.write(path, content);
        }
        project
    }

    /// Returns the project directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Returns the absolute path of a project file.
    pub fn file(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    /// Writes a file, creating parent directories.
    pub fn write(&self, relative: &str, content: &str) {
        let path = self.file(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(path, content).expect("Failed to write file");
    }

    /// Reads a file, or `None` if it does not exist.
    pub fn read(&self, relative: &str) -> Option<String> {
        std::fs::read_to_string(self.file(relative)).ok()
    }

    /// Returns true if the file or directory exists.
    pub fn exists(&self, relative: &str) -> bool {
        self.file(relative).exists()
    }

    /// Returns every project file and its content, excluding engine state.
    pub fn tree(&self) -> BTreeMap<String, String> {
        let mut files = BTreeMap::new();
        collect_files(self.path(), self.path(), &mut files);
        files
    }

    /// Opens the project's file-backed transaction store.
    pub fn store(&self) -> TransactionStore {
        TransactionStore::open(self.path()).expect("Failed to open transaction store")
    }

    /// Returns process options for this project.
    pub fn options(&self) -> ProcessOptions {
        ProcessOptions::new(self.path())
    }

    /// Creates a coordinator for this project that approves with zero check
    /// errors and answers prompts with "no".
    pub fn coordinator(&self, config: EngineConfig) -> TransactionCoordinator {
        TransactionCoordinator::new(config)
            .with_check_runner(Arc::new(FixedCheckRunner::new(0)))
            .with_prompter(Arc::new(ScriptedPrompter::always(false)))
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

fn collect_files(root: &Path, dir: &Path, files: &mut BTreeMap<String, String>) {
    let entries = std::fs::read_dir(dir).expect("Failed to read directory");
    for entry in entries {
        let path = entry.expect("Failed to read directory entry").path();
        let relative = path
            .strip_prefix(root)
            .expect("Entry outside project")
            .to_string_lossy()
            .replace('\\', "/");
        if relative == STATE_DIR {
            continue;
        }
        if path.is_dir() {
            collect_files(root, &path, files);
        } else {
            let content = std::fs::read_to_string(&path).unwrap_or_default();
            files.insert(relative, content);
        }
    }
}

/// Creates an input for [`TEST_PROJECT_ID`] with a fresh id.
pub fn test_input(operations: Vec<FileOperation>) -> TransactionInput {
    TransactionInput::new(TEST_PROJECT_ID, operations)
}

/// Creates the default configuration for [`TEST_PROJECT_ID`].
pub fn test_config() -> EngineConfig {
    EngineConfig::new(TEST_PROJECT_ID)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_skips_engine_state() {
        let project = TestProject::with_files(&[("a.txt", "A"), ("src/b.rs", "B")]);
        project.write(".relay/transactions/x.json", "{}");

        let tree = project.tree();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree["a.txt"], "A");
        assert_eq!(tree["src/b.rs"], "B");
        assert_eq!(project.read("missing"), None);
        assert!(project.exists("src"));
    }
}
