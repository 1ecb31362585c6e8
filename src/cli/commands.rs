//! CLI commands and argument parsing

use crate::config::SinkKind;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Incremental extraction of a Shopify store into a local sink
#[derive(Parser, Debug)]
#[command(name = "shopify-sync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Settings file (YAML)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Resource table (YAML) instead of the built-in one
    #[arg(short = 'r', long = "resources", global = true)]
    pub resource_table: Option<PathBuf>,

    /// Sink kind, overriding the settings file
    #[arg(long, global = true)]
    pub sink: Option<SinkKind>,

    /// Sink location (DuckDB file or JSONL directory)
    #[arg(long, global = true)]
    pub sink_path: Option<PathBuf>,

    /// Extract into memory and discard the rows
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load every configured resource: primaries first, then secondaries
    Run {
        /// Only records updated at or after (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        start_date: Option<String>,

        /// Only records updated before (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        end_date: Option<String>,
    },

    /// Load the named resources, in the order given
    Load {
        /// Resource names
        #[arg(required = true)]
        resources: Vec<String>,

        /// Only records updated at or after (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        start_date: Option<String>,

        /// Only records updated before (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        end_date: Option<String>,
    },

    /// Backfill one resource window by window, then load it incrementally
    Backfill {
        /// Resource to backfill
        #[arg(long)]
        resource: Option<String>,

        /// Resource for the final incremental load
        #[arg(long)]
        incremental_resource: Option<String>,

        /// First window start
        #[arg(long)]
        start_date: Option<String>,

        /// Window width, e.g. 7d or 12h
        #[arg(long)]
        window: Option<String>,
    },

    /// List the resource table
    Resources,

    /// Validate settings and make one request against the shop
    Check,

    /// Load Partner API transactions
    PartnerTransactions,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one message per line)
    Json,
    /// Human-readable output
    Pretty,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_load_with_globals() {
        let cli = Cli::try_parse_from([
            "shopify-sync",
            "load",
            "products",
            "orders",
            "--sink",
            "jsonl",
            "--sink-path",
            "out",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert_eq!(cli.sink, Some(SinkKind::Jsonl));
        assert_eq!(cli.sink_path, Some(PathBuf::from("out")));
        match cli.command {
            Commands::Load { resources, .. } => assert_eq!(resources, vec!["products", "orders"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_load_requires_a_resource() {
        assert!(Cli::try_parse_from(["shopify-sync", "load"]).is_err());
    }

    #[test]
    fn test_parse_backfill_and_partner() {
        let cli = Cli::try_parse_from([
            "shopify-sync",
            "--config",
            "settings.yaml",
            "backfill",
            "--window",
            "1d",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("settings.yaml")));
        assert!(matches!(
            cli.command,
            Commands::Backfill { window: Some(ref w), .. } if w == "1d"
        ));

        let cli = Cli::try_parse_from(["shopify-sync", "partner-transactions"]).unwrap();
        assert!(matches!(cli.command, Commands::PartnerTransactions));
    }
}
