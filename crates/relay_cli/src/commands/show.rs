//! Show command implementation.

use super::render;
use relay_core::{Identifier, TransactionStore};
use std::path::Path;
use tracing::info;

/// Runs the show command.
///
/// A transaction id shows the record in any status; an index counts
/// committed records only.
pub fn run(
    path: &Path,
    identifier: &str,
    include_reverts: bool,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Looking up transaction {:?} in {:?}", identifier, path);

    let store = TransactionStore::open(path)?;
    let record = match Identifier::parse(identifier) {
        Some(Identifier::Id(id)) => store.find_by_id(&id)?,
        Some(Identifier::Index(_)) => store.find_by_identifier(identifier, !include_reverts)?,
        None => return Err(format!("Invalid identifier: {:?}", identifier).into()),
    };
    let record = record.ok_or_else(|| format!("No transaction found for {:?}", identifier))?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print!("{}", render::details(&record));
    }

    Ok(())
}
