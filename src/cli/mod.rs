//! CLI module
//!
//! Command-line interface for the tap.
//!
//! # Commands
//!
//! - `discover` - Print the catalog with schemas
//! - `check` - Validate config and catalog, then fetch one page
//! - `read` - Sync the selected streams to stdout
//! - `catalog` - List stream names

mod commands;
mod runner;

pub use commands::{Cli, Commands};
pub use runner::Runner;
