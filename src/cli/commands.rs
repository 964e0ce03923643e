//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Incremental CJ commissions tap
#[derive(Parser, Debug)]
#[command(name = "tap-cj")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (JSON)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Inline config JSON, used instead of --config
    #[arg(long, global = true)]
    pub config_json: Option<String>,

    /// Catalog file (YAML or JSON) applied on top of the built-in streams
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    /// State file (JSON), read at start and rewritten at every checkpoint
    #[arg(short, long, global = true)]
    pub state: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the catalog with schemas
    Discover,

    /// Validate config and catalog, then fetch one page
    Check,

    /// Sync the selected streams
    Read {
        /// Streams to sync (comma-separated, empty = all selected)
        #[arg(long, value_delimiter = ',')]
        streams: Vec<String>,

        /// Ignore bookmarks and start every stream over
        #[arg(long)]
        full_refresh: bool,

        /// Checkpoint after this many pages
        #[arg(long)]
        checkpoint_every: Option<u64>,
    },

    /// List stream names
    Catalog,
}
