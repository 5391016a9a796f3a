//! Command line argument parsing for the Glaive CLI using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// Glaive - an embeddable full-text search engine
#[derive(Parser, Debug, Clone)]
#[command(name = "glaive")]
#[command(about = "Index and search documents with a segment-based full-text index")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct GlaiveArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Index configuration file (JSON); defaults to the one stored with the index
    #[arg(short, long, global = true, env = "GLAIVE_CONFIG", value_name = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl GlaiveArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1,
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create a new, empty index
    Create(CreateArgs),

    /// Add documents from a JSON Lines file
    Add(AddArgs),

    /// Search an index
    Search(SearchArgs),

    /// Delete the documents matching a query
    Delete(DeleteArgs),

    /// Merge segments
    Optimize(OptimizeArgs),

    /// Show index statistics
    Stats(StatsArgs),
}

/// Arguments for creating an index
#[derive(Parser, Debug, Clone)]
pub struct CreateArgs {
    /// Path to the index directory
    #[arg(value_name = "INDEX_PATH")]
    pub index_path: PathBuf,

    /// Overwrite an existing index
    #[arg(long)]
    pub force: bool,
}

/// Arguments for adding documents
#[derive(Parser, Debug, Clone)]
pub struct AddArgs {
    /// Path to the index directory
    #[arg(value_name = "INDEX_PATH")]
    pub index_path: PathBuf,

    /// Document file, one JSON object per line
    #[arg(value_name = "DOCUMENT_FILE")]
    pub document_file: PathBuf,

    /// Commit after every this many documents
    #[arg(short, long, default_value = "10000")]
    pub batch_size: usize,

    /// Replace documents with the same value in this field
    #[arg(long, value_name = "FIELD")]
    pub update_on: Option<String>,

    /// Don't commit after adding documents
    #[arg(long)]
    pub no_commit: bool,
}

/// Arguments for searching
#[derive(Parser, Debug, Clone)]
pub struct SearchArgs {
    /// Path to the index directory
    #[arg(value_name = "INDEX_PATH")]
    pub index_path: PathBuf,

    /// Query string
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Fields searched by unqualified words (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub fields: Vec<String>,

    /// Operator between clauses without one
    #[arg(long)]
    pub operator: Option<OperatorArg>,

    /// Maximum number of results to return
    #[arg(short, long, default_value = "10")]
    pub limit: usize,

    /// Offset for pagination
    #[arg(short, long, default_value = "0")]
    pub offset: usize,

    /// Sort keys such as `rank:integer:desc` (repeatable)
    #[arg(short, long)]
    pub sort: Vec<String>,

    /// Stored fields to show (comma-separated); all when empty
    #[arg(long, value_delimiter = ',')]
    pub show: Vec<String>,

    /// Group results by a stored field
    #[arg(long, value_name = "FIELD", conflicts_with = "group_by_day")]
    pub group_by: Option<String>,

    /// Group results by the day of a date field
    #[arg(long, value_name = "FIELD")]
    pub group_by_day: Option<String>,
}

/// Operator choice on the command line
#[derive(ValueEnum, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatorArg {
    /// All clauses are required
    And,
    /// Any clause may match
    Or,
}

/// Arguments for deleting documents
#[derive(Parser, Debug, Clone)]
pub struct DeleteArgs {
    /// Path to the index directory
    #[arg(value_name = "INDEX_PATH")]
    pub index_path: PathBuf,

    /// Query selecting the documents to delete
    #[arg(value_name = "QUERY")]
    pub query: String,
}

/// Arguments for merging segments
#[derive(Parser, Debug, Clone)]
pub struct OptimizeArgs {
    /// Path to the index directory
    #[arg(value_name = "INDEX_PATH")]
    pub index_path: PathBuf,

    /// Maximum number of segments after optimization
    #[arg(long, default_value = "1")]
    pub max_segments: usize,
}

/// Arguments for index statistics
#[derive(Parser, Debug, Clone)]
pub struct StatsArgs {
    /// Path to the index directory
    #[arg(value_name = "INDEX_PATH")]
    pub index_path: PathBuf,

    /// Include per-segment details
    #[arg(short, long)]
    pub detailed: bool,
}

/// Output formats for CLI
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search() {
        let args = GlaiveArgs::try_parse_from([
            "glaive", "-vv", "search", "idx", "title:rust", "--fields", "t,v", "-s", "rank:integer:desc",
            "--limit", "5",
        ])
        .unwrap();
        assert_eq!(args.verbosity(), 2);
        match args.command {
            Command::Search(search) => {
                assert_eq!(search.fields, vec!["t", "v"]);
                assert_eq!(search.sort, vec!["rank:integer:desc"]);
                assert_eq!(search.limit, 5);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_quiet_overrides_verbose() {
        let args = GlaiveArgs::try_parse_from(["glaive", "-q", "-vvv", "stats", "idx"]).unwrap();
        assert_eq!(args.verbosity(), 0);
    }
}
