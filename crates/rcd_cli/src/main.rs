//! RCD CLI
//!
//! Operator tools for the indexes of the RCD master-data store.
//!
//! # Commands
//!
//! - `rebuild` - Rebuild corrupted (or all) indexes from the data files
//! - `verify` - Compare index and data file document counts
//! - `query` - Run filter criteria against one index
//! - `stats` - Display document counts and generations

mod catalog;
mod commands;
mod error;

use clap::{Parser, Subcommand};
use rcd_index::IndexConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// RCD command-line index tools.
#[derive(Parser)]
#[command(name = "rcd")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding one index per entity type
    #[arg(global = true, long, default_value = "index")]
    index_dir: PathBuf,

    /// Directory holding one `<EntityType>.jsonl` data file per entity type
    #[arg(global = true, long, default_value = "data")]
    data_dir: PathBuf,

    /// Entities read per page while rebuilding
    #[arg(global = true, long)]
    page_size: Option<usize>,

    /// Writer memory budget in megabytes
    #[arg(global = true, long)]
    writer_heap_mb: Option<usize>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild indexes from the data files
    Rebuild {
        /// Rebuild intact indexes too
        #[arg(short, long)]
        force: bool,

        /// Entity types to rebuild (default: all)
        #[arg(short, long = "target")]
        targets: Vec<String>,
    },

    /// Compare index and data file document counts
    Verify,

    /// Run filter criteria against one index
    Query {
        /// Entity type to query
        entity: String,

        /// Filter criteria as JSON (default: first page, active only)
        #[arg(short, long)]
        criteria: Option<String>,
    },

    /// Display document counts and generations
    Stats {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

impl Cli {
    fn config(&self) -> IndexConfig {
        let mut config = IndexConfig::new(&self.index_dir);
        if let Some(size) = self.page_size {
            config = config.rebuild_page_size(size);
        }
        if let Some(megabytes) = self.writer_heap_mb {
            config = config.writer_heap_bytes(megabytes.saturating_mul(1024 * 1024));
        }
        config
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Commands::Version = cli.command {
        println!("RCD CLI v{}", env!("CARGO_PKG_VERSION"));
        println!("RCD Index v{}", rcd_index::VERSION);
        return Ok(());
    }

    let catalog = catalog::Catalog::open(&cli.data_dir, cli.config())?;
    match cli.command {
        Commands::Rebuild { force, targets } => {
            commands::rebuild::run(&catalog, targets, force)?;
        }
        Commands::Verify => {
            commands::verify::run(&catalog)?;
        }
        Commands::Query { entity, criteria } => {
            commands::query::run(&catalog, &entity, criteria.as_deref())?;
        }
        Commands::Stats { format } => {
            commands::stats::run(&catalog, &format)?;
        }
        Commands::Version => {}
    }
    catalog.close()?;

    Ok(())
}
