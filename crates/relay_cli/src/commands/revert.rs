//! Revert command implementation.

use super::render;
use crate::prompt::TerminalPrompter;
use relay_core::{EngineConfig, ProcessOptions, Prompter, TransactionCoordinator};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Runs the revert command.
pub async fn run(
    path: &Path,
    config: EngineConfig,
    identifier: &str,
    include_reverts: bool,
    yes: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Reverting {:?} in {:?}", identifier, path);

    let coordinator =
        TransactionCoordinator::new(config).with_prompter(Arc::new(TerminalPrompter));
    let store = coordinator.store(path)?;
    let Some(target) = store.find_by_identifier(identifier, !include_reverts)? else {
        println!("No committed transaction found for {:?}.", identifier);
        return Ok(());
    };

    print!("{}", render::details(&target));
    if !yes {
        let question = format!("Revert transaction {}?", target.id);
        if !TerminalPrompter.ask(&question).await {
            println!("Revert cancelled.");
            return Ok(());
        }
    }

    let options = ProcessOptions::new(path).auto_approve_all(yes);
    match coordinator
        .revert(&target.id.to_string(), true, &options)
        .await?
    {
        Some(outcome) => println!("{}", render::outcome(&outcome)),
        None => println!("Nothing to revert."),
    }
    Ok(())
}
