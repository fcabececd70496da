//! Rebuild command implementation.

use crate::catalog::Catalog;
use crate::error::{CliError, CliResult};
use rcd_index::{CancellationToken, RebuildRequest};

/// Runs the rebuild command.
pub fn run(catalog: &Catalog, targets: Vec<String>, force: bool) -> CliResult<()> {
    let request = RebuildRequest {
        targets: if targets.is_empty() { None } else { Some(targets) },
        force,
    };
    let summary = catalog
        .coordinator()
        .rebuild_all(&request, &CancellationToken::new())?;

    for unit in &summary.units {
        match &unit.error {
            Some(error) => println!("{:<14} {:<9} {}", unit.entity_type, unit.status, error),
            None => println!(
                "{:<14} {:<9} {:>10}",
                unit.entity_type, unit.status, unit.document_count
            ),
        }
    }
    println!();
    println!(
        "{} rebuilt, {} skipped, {} failed",
        summary.finished, summary.skipped, summary.errors
    );

    if summary.is_success() {
        Ok(())
    } else {
        Err(CliError::Failed(format!("{} rebuilds failed", summary.errors)))
    }
}
