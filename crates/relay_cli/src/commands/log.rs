//! Log command implementation.

use super::render;
use relay_core::TransactionStore;
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Totals printed under a listing.
#[derive(Debug, Default, Serialize)]
pub struct LogTotals {
    /// Number of transactions listed.
    pub transactions: usize,
    /// Lines added across them.
    pub lines_added: u64,
    /// Lines removed across them.
    pub lines_removed: u64,
}

/// Runs the log command.
pub fn run(
    path: &Path,
    limit: Option<usize>,
    include_reverts: bool,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Reading transaction log at {:?}", path);

    let store = TransactionStore::open(path)?;
    let mut records = store.committed(!include_reverts)?;
    if let Some(limit) = limit {
        records.truncate(limit);
    }

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No committed transactions.");
        return Ok(());
    }

    let mut totals = LogTotals::default();
    for (i, record) in records.iter().enumerate() {
        println!("{}", render::summary_line(i + 1, record));
        totals.transactions += 1;
        if let Some(stats) = record.line_stats() {
            totals.lines_added += stats.added;
            totals.lines_removed += stats.removed;
        }
    }
    println!();
    println!(
        "{} transaction(s), +{} -{}",
        totals.transactions, totals.lines_added, totals.lines_removed
    );

    Ok(())
}
