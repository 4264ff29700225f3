//! CLI argument definitions using clap
//!
//! Commands:
//! - planopt optimize --query <q> [--table <t>]...
//! - planopt entangle --query-a <q> --query-b <q> [--table-a <t>]... [--table-b <t>]...
//! - planopt sample --query <q> [--table <t>]... --draws <n>

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// planopt - cost-weighted query plan selection
#[derive(Parser, Debug)]
#[command(name = "planopt")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct CommonOptions {
    /// Path to a JSON configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Fixed seed for plan selection (overrides the config file)
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate, cost and select a plan for one query
    Optimize {
        /// Query text
        #[arg(long)]
        query: String,

        /// Table the query touches (repeatable)
        #[arg(long = "table")]
        tables: Vec<String>,

        #[command(flatten)]
        common: CommonOptions,
    },

    /// Resolve two related queries together
    Entangle {
        #[arg(long)]
        query_a: String,

        #[arg(long = "table-a")]
        tables_a: Vec<String>,

        #[arg(long)]
        query_b: String,

        #[arg(long = "table-b")]
        tables_b: Vec<String>,

        #[command(flatten)]
        common: CommonOptions,
    },

    /// Draw many selections and report observed frequencies
    Sample {
        /// Query text
        #[arg(long)]
        query: String,

        /// Table the query touches (repeatable)
        #[arg(long = "table")]
        tables: Vec<String>,

        /// Number of draws
        #[arg(long, default_value_t = 10_000)]
        draws: u64,

        #[command(flatten)]
        common: CommonOptions,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_optimize() {
        let cli = Cli::try_parse_from([
            "planopt",
            "optimize",
            "--query",
            "SELECT * FROM orders",
            "--table",
            "orders",
            "--table",
            "customers",
            "--seed",
            "7",
        ])
        .unwrap();

        match cli.command {
            Command::Optimize {
                query,
                tables,
                common,
            } => {
                assert_eq!(query, "SELECT * FROM orders");
                assert_eq!(tables, vec!["orders", "customers"]);
                assert_eq!(common.seed, Some(7));
                assert!(common.config.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_entangle() {
        let cli = Cli::try_parse_from([
            "planopt",
            "entangle",
            "--query-a",
            "SELECT * FROM orders",
            "--table-a",
            "orders",
            "--query-b",
            "SELECT id FROM orders",
            "--table-b",
            "orders",
        ])
        .unwrap();

        assert!(matches!(cli.command, Command::Entangle { .. }));
    }

    #[test]
    fn test_sample_default_draws() {
        let cli = Cli::try_parse_from(["planopt", "sample", "--query", "SELECT 1"]).unwrap();
        match cli.command {
            Command::Sample { draws, tables, .. } => {
                assert_eq!(draws, 10_000);
                assert!(tables.is_empty());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_query_is_required() {
        assert!(Cli::try_parse_from(["planopt", "optimize"]).is_err());
    }
}
