//! CLI command definitions for the `procflow` binary.

pub mod catalog;
pub mod file;
pub mod graph;
pub mod run;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use procflow_types::graph::GraphId;

/// Define and run DAGs of typed operations.
#[derive(Parser)]
#[command(name = "procflow", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all logging except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// More logging (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Data directory (defaults to $PROCFLOW_DATA_DIR, then ~/.procflow).
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check a graph file without storing it.
    Validate {
        /// Graph definition file (JSON or YAML).
        file: PathBuf,
    },

    /// Store a new graph from a file.
    Create {
        /// Graph definition file (JSON or YAML).
        file: PathBuf,
    },

    /// Replace a stored graph with the contents of a file.
    Update {
        id: GraphId,
        file: PathBuf,
    },

    /// List stored graphs.
    #[command(alias = "ls")]
    List,

    /// Show a stored graph with its nodes and last results.
    Show { id: GraphId },

    /// Delete a stored graph.
    #[command(alias = "rm")]
    Delete {
        id: GraphId,

        /// Skip the confirmation prompt.
        #[arg(short, long)]
        force: bool,
    },

    /// Execute a stored graph.
    Run {
        id: GraphId,

        /// Report the run id as soon as the run starts.
        #[arg(long)]
        no_wait: bool,

        /// Seconds to wait for completion before stopping the run.
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Show the current state of a graph.
    Status { id: GraphId },

    /// List the registered node types.
    #[command(name = "node-types")]
    NodeTypes,

    /// Create a built-in example graph.
    Example {
        #[command(subcommand)]
        example: ExampleCommand,
    },

    /// Generate shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum ExampleCommand {
    /// 10 * ((1*3) + (2*3) + (3*5) + (4*6)) / 2
    Arithmetic {
        /// Run the graph right after creating it.
        #[arg(long)]
        run: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_run_flags() {
        let cli = Cli::parse_from([
            "procflow",
            "--json",
            "run",
            "0190f3a0-0000-7000-8000-000000000000",
            "--timeout",
            "5",
        ]);
        assert!(cli.json);
        match cli.command {
            Commands::Run { no_wait, timeout, .. } => {
                assert!(!no_wait);
                assert_eq!(timeout, Some(5));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn rejects_malformed_graph_id() {
        assert!(Cli::try_parse_from(["procflow", "show", "not-a-uuid"]).is_err());
    }
}
