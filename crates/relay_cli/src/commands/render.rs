//! Text rendering shared by the commands.

use relay_core::{FileOperation, ProcessOutcome, TransactionRecord};

/// Formats `+added -removed`, or `-` when stats were never computed.
pub fn stats(record: &TransactionRecord) -> String {
    match record.line_stats() {
        Some(stats) => format!("+{} -{}", stats.added, stats.removed),
        None => "-".to_string(),
    }
}

/// One line per record for listings.
pub fn summary_line(index: usize, record: &TransactionRecord) -> String {
    format!(
        "{:>3}  {}  {}  {:<12}  {}",
        index,
        record.id.short(),
        record.created_at.format("%Y-%m-%d %H:%M"),
        stats(record),
        record.headline()
    )
}

/// Describes an operation in a single line.
pub fn operation(op: &FileOperation) -> String {
    match op {
        FileOperation::Write {
            path,
            patch_strategy,
            ..
        } => format!("write   {path} ({patch_strategy})"),
        FileOperation::Delete { path } => format!("delete  {path}"),
        FileOperation::Rename { from, to } => format!("rename  {from} -> {to}"),
    }
}

/// Full multi-line description of a record.
pub fn details(record: &TransactionRecord) -> String {
    let mut out = String::new();
    out.push_str(&format!("Transaction: {}\n", record.id));
    out.push_str(&format!("Project:     {}\n", record.project_id));
    out.push_str(&format!("Status:      {}\n", record.status));
    out.push_str(&format!("Created:     {}\n", record.created_at.to_rfc3339()));
    out.push_str(&format!("Lines:       {}\n", stats(record)));
    if let Some(message) = &record.git_commit_msg {
        out.push_str(&format!("Commit msg:  {}\n", message));
    }
    if let Some(at) = record.git_committed_at {
        out.push_str(&format!("Recorded:    {}\n", at.to_rfc3339()));
    }
    if !record.reasoning.is_empty() {
        out.push_str("\nReasoning:\n");
        for line in &record.reasoning {
            out.push_str(&format!("  {}\n", line));
        }
    }
    out.push_str(&format!("\nOperations ({}):\n", record.operations.len()));
    for op in &record.operations {
        out.push_str(&format!("  {}\n", operation(op)));
    }
    out
}

/// Describes what processing did with a batch.
pub fn outcome(outcome: &ProcessOutcome) -> String {
    match outcome {
        ProcessOutcome::Skipped(reason) => format!("Skipped: {}", reason),
        ProcessOutcome::Committed(summary) => {
            let mut line = format!(
                "Committed {} (+{} -{}, {} linter error(s))",
                summary.id, summary.stats.added, summary.stats.removed, summary.error_count
            );
            if let Some(branch) = &summary.branch {
                line.push_str(&format!(" on branch {}", branch));
            }
            line
        }
        ProcessOutcome::RolledBack(summary) => {
            let mut line = format!("Rolled back {}: {}", summary.id, summary.cause);
            if let Some(error) = &summary.restore_error {
                line.push_str(&format!(" (restore incomplete: {})", error));
            }
            line
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::{
        CommitSummary, LineStats, RollbackCause, RollbackSummary, SkipReason, TransactionId,
        TransactionInput, TransactionRecord,
    };

    fn record() -> TransactionRecord {
        let input = TransactionInput::new(
            "demo",
            vec![
                FileOperation::write("a.txt", "hi\n"),
                FileOperation::rename("b.txt", "c.txt"),
            ],
        )
        .with_reasoning(["Add greeting"]);
        let id = TransactionId::parse(&input.id).unwrap();
        TransactionRecord::pending(id, &input, Default::default())
    }

    #[test]
    fn stats_placeholder_until_computed() {
        let mut record = record();
        assert_eq!(stats(&record), "-");
        record.set_line_stats(LineStats {
            added: 3,
            removed: 1,
        });
        assert_eq!(stats(&record), "+3 -1");
    }

    #[test]
    fn details_lists_operations() {
        let text = details(&record());
        assert!(text.contains("Status:      pending"));
        assert!(text.contains("  Add greeting"));
        assert!(text.contains("write   a.txt (replace)"));
        assert!(text.contains("rename  b.txt -> c.txt"));
    }

    #[test]
    fn outcome_lines() {
        let id = TransactionId::new();
        let committed = ProcessOutcome::Committed(CommitSummary {
            id,
            stats: LineStats {
                added: 2,
                removed: 0,
            },
            error_count: 0,
            branch: Some("relay/fix".into()),
        });
        assert_eq!(
            outcome(&committed),
            format!("Committed {id} (+2 -0, 0 linter error(s)) on branch relay/fix")
        );

        let undone = ProcessOutcome::RolledBack(RollbackSummary {
            id,
            cause: RollbackCause::Rejected,
            restore_error: None,
        });
        assert_eq!(outcome(&undone), format!("Rolled back {id}: rejected"));

        let skipped = ProcessOutcome::Skipped(SkipReason::TooFewOperations { count: 1, min: 2 });
        assert_eq!(
            outcome(&skipped),
            "Skipped: 1 operation(s), below the minimum of 2"
        );
    }
}
