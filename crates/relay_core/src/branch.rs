//! Post-commit branch creation.

use crate::collaborator::ShellExecutor;
use crate::config::{BranchTemplate, GitConfig};
use crate::record::TransactionRecord;
use std::path::Path;
use tracing::{debug, info, warn};

const MAX_SEGMENT_LEN: usize = 70;
const GIT_FATAL_EXIT: i32 = 128;

/// Turns free text into a branch name segment.
///
/// Lowercases, drops everything but ASCII word characters, whitespace and
/// `-`, turns runs of whitespace and `_` into a single `-`, trims `-` from
/// both ends and keeps at most 70 characters.
#[must_use]
pub fn sanitize_segment(text: &str) -> String {
    let lowered = text.trim().to_lowercase();

    let mut segment = String::with_capacity(lowered.len());
    for c in lowered.chars() {
        let c = if c.is_whitespace() || c == '_' {
            '-'
        } else if c.is_ascii_alphanumeric() || c == '-' {
            c
        } else {
            continue;
        };
        if c == '-' && segment.ends_with('-') {
            continue;
        }
        segment.push(c);
    }

    segment
        .trim_matches('-')
        .chars()
        .take(MAX_SEGMENT_LEN)
        .collect()
}

/// Returns the full branch name for a committed record, if one can be built.
#[must_use]
pub fn branch_name(git: &GitConfig, record: &TransactionRecord) -> Option<String> {
    let commit_subject = record
        .git_commit_msg
        .as_deref()
        .and_then(|msg| msg.lines().map(str::trim).find(|line| !line.is_empty()));

    let source = match (git.git_branch_template, commit_subject) {
        (BranchTemplate::GitCommitMsg, Some(subject)) => subject.to_string(),
        _ => record.id.to_string(),
    };

    let segment = sanitize_segment(&source);
    (!segment.is_empty()).then(|| format!("{}{segment}", git.git_branch_prefix))
}

/// Creates and switches to a branch for `record`.
///
/// Never fails: every problem is logged and the committed transaction is
/// left as it is. Returns the branch name when the branch was created.
pub async fn create_branch(
    shell: &dyn ShellExecutor,
    git: &GitConfig,
    record: &TransactionRecord,
    dir: &Path,
) -> Option<String> {
    let Some(name) = branch_name(git, record) else {
        warn!(id = %record.id, "could not derive a branch name, skipping branch creation");
        return None;
    };

    info!(branch = %name, "creating git branch");
    let command = format!("git checkout -b \"{name}\"");
    match shell.run(&command, dir).await {
        Ok(output) if output.success() => {
            info!(branch = %name, "switched to new branch");
            Some(name)
        }
        Ok(output) => {
            if output.exit_code == GIT_FATAL_EXIT && output.stderr.contains("already exists") {
                warn!(branch = %name, "branch already exists");
            } else {
                warn!(branch = %name, exit_code = output.exit_code, "could not create git branch");
            }
            debug!(command, stderr = %output.stderr, "branch command failed");
            None
        }
        Err(e) => {
            warn!(branch = %name, error = %e, "could not run git");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::CommandOutput;
    use crate::error::CoreResult;
    use crate::record::TransactionInput;
    use crate::types::{FileOperation, FileSnapshot, TransactionId};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[test]
    fn sanitize() {
        assert_eq!(sanitize_segment("  Fix: the Parser!  "), "fix-the-parser");
        assert_eq!(sanitize_segment("feat(core)__add   x--y"), "featcore-add-x-y");
        assert_eq!(sanitize_segment("--edge--"), "edge");
        assert_eq!(sanitize_segment("!!!"), "");
        assert_eq!(sanitize_segment(&"a".repeat(100)).len(), 70);
    }

    fn record(msg: Option<&str>) -> TransactionRecord {
        let mut input = TransactionInput::new("p", vec![FileOperation::write("a", "b")]);
        if let Some(msg) = msg {
            input = input.with_git_commit_msg(msg);
        }
        TransactionRecord::pending(TransactionId::new(), &input, FileSnapshot::new())
    }

    #[test]
    fn name_from_template() {
        let mut git = GitConfig::default();
        let rec = record(Some("feat: Add login\n\nlong body"));
        assert_eq!(branch_name(&git, &rec), Some(format!("relay/{}", rec.id)));

        git.git_branch_template = BranchTemplate::GitCommitMsg;
        assert_eq!(branch_name(&git, &rec).as_deref(), Some("relay/feat-add-login"));

        let bare = record(None);
        assert_eq!(branch_name(&git, &bare), Some(format!("relay/{}", bare.id)));
    }

    struct Recording {
        commands: Mutex<Vec<String>>,
        output: CommandOutput,
    }

    #[async_trait]
    impl ShellExecutor for Recording {
        async fn run(&self, command: &str, _dir: &Path) -> CoreResult<CommandOutput> {
            self.commands.lock().push(command.to_string());
            Ok(self.output.clone())
        }
    }

    #[tokio::test]
    async fn runs_checkout() {
        let shell = Recording {
            commands: Mutex::new(Vec::new()),
            output: CommandOutput::default(),
        };
        let rec = record(None);
        let created = create_branch(&shell, &GitConfig::default(), &rec, Path::new(".")).await;

        assert_eq!(created, Some(format!("relay/{}", rec.id)));
        assert_eq!(
            shell.commands.lock().as_slice(),
            [format!("git checkout -b \"relay/{}\"", rec.id)]
        );
    }

    #[tokio::test]
    async fn existing_branch_is_not_fatal() {
        let shell = Recording {
            commands: Mutex::new(Vec::new()),
            output: CommandOutput {
                exit_code: 128,
                stdout: String::new(),
                stderr: "fatal: a branch named 'x' already exists".into(),
            },
        };
        let created = create_branch(&shell, &GitConfig::default(), &record(None), Path::new(".")).await;
        assert_eq!(created, None);
    }
}
