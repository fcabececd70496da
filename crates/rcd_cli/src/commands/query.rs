//! Query command implementation.

use crate::catalog::Catalog;
use crate::error::CliResult;
use rcd_model::FilterCriteria;

/// Runs the query command.
pub fn run(catalog: &Catalog, entity: &str, criteria: Option<&str>) -> CliResult<()> {
    let entry = catalog.entry(entity)?;
    let criteria = match criteria {
        Some(json) => parse(json)?,
        None => entry.default_criteria(),
    };
    let result = entry.query(&criteria)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Parses criteria JSON. Missing keys take their defaults.
pub fn parse(json: &str) -> CliResult<FilterCriteria> {
    Ok(serde_json::from_str(json)?)
}
