//! Building the inverse of a committed transaction.

use crate::record::{TransactionInput, TransactionRecord, REVERT_PREFIX};
use crate::types::FileOperation;
use std::collections::BTreeSet;

/// Plans a transaction that returns the tree to `record`'s snapshot.
///
/// Every path that exists after `record` but not in its snapshot is deleted,
/// and every snapshot path with content is rewritten with that content. The
/// result carries a fresh id and a reasoning line naming the reverted
/// transaction. Returns `None` if there is nothing to undo.
#[must_use]
pub fn plan_revert(record: &TransactionRecord, project_id: &str) -> Option<TransactionInput> {
    let mut existing_after: BTreeSet<&str> = record
        .snapshot
        .iter()
        .filter(|(_, content)| content.is_some())
        .map(|(path, _)| path.as_str())
        .collect();

    for op in &record.operations {
        match op {
            FileOperation::Write { path, .. } => {
                existing_after.insert(path.as_str());
            }
            FileOperation::Delete { path } => {
                existing_after.remove(path.as_str());
            }
            FileOperation::Rename { from, to } => {
                if existing_after.remove(from.as_str()) {
                    existing_after.insert(to.as_str());
                }
            }
        }
    }

    let deletes = existing_after
        .into_iter()
        .filter(|path| !matches!(record.snapshot.get(*path), Some(Some(_))))
        .map(FileOperation::delete);
    let restores = record
        .snapshot
        .iter()
        .filter_map(|(path, content)| Some(FileOperation::write(path.as_str(), content.as_deref()?)));
    let operations: Vec<FileOperation> = deletes.chain(restores).collect();

    if operations.is_empty() {
        return None;
    }

    let reasoning = vec![
        format!("{REVERT_PREFIX}{}.", record.id),
        format!(
            "Reasoning from original transaction: {}",
            record.reasoning.join(" ")
        ),
    ];

    Some(TransactionInput::new(project_id, operations).with_reasoning(reasoning))
}
