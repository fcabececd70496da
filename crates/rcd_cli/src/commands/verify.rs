//! Verify command implementation.

use crate::catalog::Catalog;
use crate::error::{CliError, CliResult};

/// Runs the verify command.
pub fn run(catalog: &Catalog) -> CliResult<()> {
    let mut corrupted = Vec::new();
    for entry in catalog.entries() {
        let indexed = entry.indexed_count()?;
        let stored = entry.stored_count()?;
        let state = if indexed == stored { "ok" } else { "CORRUPTED" };
        println!("{:<14} {:>10} indexed {:>10} stored  {}", entry.name(), indexed, stored, state);
        if indexed != stored {
            corrupted.push(entry.name());
        }
    }

    println!();
    if corrupted.is_empty() {
        println!("✓ All indexes match their data files");
        Ok(())
    } else {
        println!("✗ Corrupted indexes: {}", corrupted.join(", "));
        Err(CliError::Failed(
            "verification failed, run `rcd rebuild` to repair".to_string(),
        ))
    }
}
