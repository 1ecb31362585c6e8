//! CLI module
//!
//! Command-line interface for the extractor.
//!
//! # Commands
//!
//! - `run` - Load every configured resource
//! - `load` - Load the named resources
//! - `backfill` - Windowed backfill, then an incremental load
//! - `resources` - List the resource table
//! - `check` - Validate settings and test the connection
//! - `partner-transactions` - Load Partner API transactions

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;
