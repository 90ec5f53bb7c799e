//! Integration tests for failures after staging and for path aliasing.

use async_trait::async_trait;
use relay_core::{
    ApprovalMode, CommandOutput, CoreResult, FileOperation, ProcessOutcome, Prompter,
    RollbackCause, ShellExecutor, StoreFactory, TransactionId, TransactionStatus,
    TransactionStore,
};
use relay_storage::{InMemoryBackend, RecordBackend, StorageError, StorageResult};
use relay_testkit::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Backend whose `n`-th put (0-based) fails.
struct FailingPut {
    inner: InMemoryBackend,
    puts: AtomicUsize,
    fail_at: usize,
}

impl FailingPut {
    fn new(fail_at: usize) -> Self {
        Self {
            inner: InMemoryBackend::new(),
            puts: AtomicUsize::new(0),
            fail_at,
        }
    }
}

impl RecordBackend for FailingPut {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.inner.get(key)
    }

    fn put(&self, key: &str, data: &[u8]) -> StorageResult<()> {
        if self.puts.fetch_add(1, Ordering::SeqCst) == self.fail_at {
            return Err(StorageError::Corrupted("disk full".into()));
        }
        self.inner.put(key, data)
    }

    fn remove(&self, key: &str) -> StorageResult<bool> {
        self.inner.remove(key)
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        self.inner.keys()
    }
}

fn shared_store(backend: Arc<dyn RecordBackend>) -> StoreFactory {
    Arc::new(move |_: &Path| Ok(TransactionStore::with_backend(Arc::clone(&backend))))
}

/// Post-command that turns the `dir` directory into a regular file.
struct ClobberShell;

#[async_trait]
impl ShellExecutor for ClobberShell {
    async fn run(&self, _command: &str, dir: &Path) -> CoreResult<CommandOutput> {
        let target = dir.join("dir");
        tokio::fs::remove_dir_all(&target).await?;
        tokio::fs::write(&target, "not a directory").await?;
        Ok(CommandOutput {
            exit_code: 1,
            stdout: String::new(),
            stderr: "checks failed".into(),
        })
    }
}

/// Answers "yes" after another writer has already closed every pending record.
struct RacingPrompter {
    store: TransactionStore,
}

#[async_trait]
impl Prompter for RacingPrompter {
    async fn ask(&self, _question: &str) -> bool {
        for record in self.store.query_by_status(TransactionStatus::Pending).unwrap() {
            self.store
                .set_status(&record.id, TransactionStatus::Pending, TransactionStatus::Undone)
                .unwrap();
        }
        true
    }
}

#[tokio::test]
async fn restore_failure_still_marks_undone() {
    let project = TestProject::with_files(&[("dir/a.txt", "A")]);
    let coordinator = project
        .coordinator(test_config().post_command("check"))
        .with_shell(Arc::new(ClobberShell));
    let input = test_input(vec![FileOperation::write("dir/a.txt", "B")]);
    let id = TransactionId::parse(&input.id).unwrap();

    let outcome = coordinator.process(input, &project.options()).await.unwrap();

    let ProcessOutcome::RolledBack(summary) = outcome else {
        panic!("expected rollback, got {outcome:?}");
    };
    assert!(matches!(summary.cause, RollbackCause::Failed(ref m) if m.contains("exit code 1")));
    let restore_error = summary.restore_error.expect("restore should fail");
    assert!(restore_error.contains("dir/a.txt"), "{restore_error}");

    let record = project.store().find_by_id(&id).unwrap().unwrap();
    assert_eq!(record.status, TransactionStatus::Undone);
    assert!(!record.approved);
}

#[tokio::test]
async fn store_failure_while_committing_rolls_back() {
    let project = TestProject::with_files(&[("a.txt", "A")]);
    // Put 0 stages the record, put 1 is the commit update.
    let backend: Arc<dyn RecordBackend> = Arc::new(FailingPut::new(1));
    let coordinator = project
        .coordinator(test_config())
        .with_store_factory(shared_store(Arc::clone(&backend)));
    let input = test_input(vec![
        FileOperation::write("a.txt", "B"),
        FileOperation::write("new.txt", "N"),
    ]);
    let id = TransactionId::parse(&input.id).unwrap();

    let outcome = coordinator.process(input, &project.options()).await.unwrap();

    let ProcessOutcome::RolledBack(summary) = outcome else {
        panic!("expected rollback, got {outcome:?}");
    };
    assert!(matches!(summary.cause, RollbackCause::Failed(ref m) if m.contains("disk full")));
    assert_eq!(summary.restore_error, None);
    assert_eq!(
        project.tree(),
        BTreeMap::from([("a.txt".to_string(), "A".to_string())])
    );

    let record = TransactionStore::with_backend(backend)
        .find_by_id(&id)
        .unwrap()
        .unwrap();
    assert_eq!(record.status, TransactionStatus::Undone);
}

#[tokio::test]
async fn record_closed_elsewhere_is_not_reported_committed() {
    let project = TestProject::with_files(&[("a.txt", "A")]);
    let backend: Arc<dyn RecordBackend> = Arc::new(InMemoryBackend::new());
    let coordinator = project
        .coordinator(test_config().approval_mode(ApprovalMode::Manual))
        .with_store_factory(shared_store(Arc::clone(&backend)))
        .with_prompter(Arc::new(RacingPrompter {
            store: TransactionStore::with_backend(Arc::clone(&backend)),
        }));
    let input = test_input(vec![FileOperation::write("a.txt", "B")]);
    let id = TransactionId::parse(&input.id).unwrap();

    let outcome = coordinator.process(input, &project.options()).await.unwrap();

    let ProcessOutcome::RolledBack(summary) = outcome else {
        panic!("expected rollback, got {outcome:?}");
    };
    assert!(matches!(
        summary.cause,
        RollbackCause::Failed(ref m) if m.contains("no longer pending")
    ));
    assert_eq!(project.read("a.txt").as_deref(), Some("A"));

    let record = TransactionStore::with_backend(backend)
        .find_by_id(&id)
        .unwrap()
        .unwrap();
    assert_eq!(record.status, TransactionStatus::Undone);
    assert!(!record.approved);
}

#[tokio::test]
async fn aliased_paths_fold_as_one_file() {
    let project = TestProject::with_files(&[("a.txt", "A")]);
    let coordinator = project.coordinator(test_config());

    // The rename source was deleted earlier in the batch.
    let input = test_input(vec![
        FileOperation::delete("a.txt"),
        FileOperation::rename("./a.txt", "b.txt"),
    ]);
    let outcome = coordinator.process(input, &project.options()).await.unwrap();

    let ProcessOutcome::RolledBack(summary) = outcome else {
        panic!("expected rollback, got {outcome:?}");
    };
    assert!(matches!(summary.cause, RollbackCause::Failed(_)));
    assert_eq!(
        project.tree(),
        BTreeMap::from([("a.txt".to_string(), "A".to_string())])
    );
}

#[tokio::test]
async fn committed_record_keeps_canonical_paths() {
    let project = TestProject::new();
    let coordinator = project.coordinator(test_config());
    let input = test_input(vec![
        FileOperation::write("./src//lib.rs", "one\n"),
        FileOperation::write("src/lib.rs", "two\n"),
    ]);
    let id = TransactionId::parse(&input.id).unwrap();

    let outcome = coordinator.process(input, &project.options()).await.unwrap();

    assert!(outcome.is_committed(), "unexpected outcome {outcome:?}");
    assert_eq!(project.read("src/lib.rs").as_deref(), Some("two\n"));

    let record = project.store().find_by_id(&id).unwrap().unwrap();
    assert_eq!(
        record.operations,
        vec![
            FileOperation::write("src/lib.rs", "one\n"),
            FileOperation::write("src/lib.rs", "two\n"),
        ]
    );
    assert_eq!(record.snapshot.keys().collect::<Vec<_>>(), vec!["src/lib.rs"]);
}
