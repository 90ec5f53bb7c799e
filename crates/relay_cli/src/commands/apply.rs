//! Apply command implementation.

use super::render;
use crate::prompt::TerminalPrompter;
use relay_core::{
    CoreResult, DirectoryLock, EngineConfig, ProcessOptions, ProcessOutcome,
    TransactionCoordinator, TransactionInput,
};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Reads a batch from `file`, or from stdin for `-`.
pub fn read_input(file: &Path) -> Result<TransactionInput, Box<dyn std::error::Error>> {
    let text = if file.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        text
    } else {
        std::fs::read_to_string(file).map_err(|e| format!("Cannot read {:?}: {}", file, e))?
    };
    let input = serde_json::from_str(&text)
        .map_err(|e| format!("Invalid transaction in {:?}: {}", file, e))?;
    Ok(input)
}

/// Runs the apply command.
///
/// Batches are queued on one directory lock, so they apply strictly in the
/// order given.
pub async fn run(
    path: &Path,
    config: EngineConfig,
    files: &[PathBuf],
    yes: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let inputs = files
        .iter()
        .map(|file| read_input(file))
        .collect::<Result<Vec<_>, _>>()?;

    info!("Applying {} batch(es) to {:?}", inputs.len(), path);

    let coordinator =
        Arc::new(TransactionCoordinator::new(config).with_prompter(Arc::new(TerminalPrompter)));
    let lock = DirectoryLock::new();
    let options = ProcessOptions::new(path).auto_approve_all(yes);

    let tickets: Vec<_> = inputs
        .into_iter()
        .map(|input| coordinator.submit(&lock, input, options.clone()))
        .collect();

    // Every ticket is awaited before returning so no batch is cut off mid-run.
    let mut report = ApplyReport::default();
    for ticket in tickets {
        let result = match ticket {
            Ok(ticket) => ticket.await.and_then(|outcome| outcome),
            Err(e) => Err(e),
        };
        report.record(result);
    }
    lock.shutdown();

    report.finish()
}

/// Tally of batch results for one `apply` run.
#[derive(Debug, Default)]
struct ApplyReport {
    total: usize,
    committed: usize,
    errors: Vec<String>,
}

impl ApplyReport {
    fn record(&mut self, result: CoreResult<ProcessOutcome>) {
        self.total += 1;
        match result {
            Ok(outcome) => {
                if outcome.is_committed() {
                    self.committed += 1;
                }
                println!("{}", render::outcome(&outcome));
            }
            Err(e) => {
                println!("Error: {}", e);
                self.errors.push(e.to_string());
            }
        }
    }

    fn finish(self) -> Result<(), Box<dyn std::error::Error>> {
        if self.total > 1 {
            println!("{} of {} batch(es) committed.", self.committed, self.total);
        }
        if self.errors.is_empty() {
            Ok(())
        } else {
            let failed = self.errors.len();
            Err(format!("{} batch(es) failed: {}", failed, self.errors.join("; ")).into())
        }
    }
}
