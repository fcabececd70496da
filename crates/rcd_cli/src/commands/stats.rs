//! Stats command implementation.

use crate::catalog::Catalog;
use crate::error::{CliError, CliResult};
use rcd_index::IndexStatsSnapshot;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IndexRow {
    entity_type: &'static str,
    documents: usize,
    generation: Option<u64>,
    stats: IndexStatsSnapshot,
}

/// Runs the stats command.
pub fn run(catalog: &Catalog, format: &str) -> CliResult<()> {
    let mut rows = Vec::new();
    for entry in catalog.entries() {
        rows.push(IndexRow {
            entity_type: entry.name(),
            documents: entry.indexed_count()?,
            generation: entry.generation(),
            stats: entry.stats(),
        });
    }

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&rows)?),
        "text" => {
            println!("{:<14} {:>10} {:>10}", "Index", "Documents", "Generation");
            println!("{}", "-".repeat(36));
            for row in &rows {
                let generation = row.generation.map_or_else(|| "-".to_string(), |g| g.to_string());
                println!("{:<14} {:>10} {:>10}", row.entity_type, row.documents, generation);
            }
            let total: usize = rows.iter().map(|row| row.documents).sum();
            println!("{}", "-".repeat(36));
            println!("{:<14} {:>10}", "Total", total);
        }
        other => return Err(CliError::UnknownFormat(other.to_string())),
    }
    Ok(())
}
