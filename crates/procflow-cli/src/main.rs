//! procflow CLI entry point.
//!
//! Binary name: `procflow`
//!
//! Parses arguments, sets up tracing, wires the engine and dispatches to the
//! command handlers.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;
use procflow_observe::{TracingOptions, init_tracing};

use cli::{Cli, Commands, ExampleCommand};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut tracing_options = TracingOptions::from_verbosity(cli.verbose);
    if cli.quiet && cli.verbose == 0 {
        tracing_options.default_filter = "error".to_string();
    }
    tracing_options.json = cli.json;
    tracing_options.otel = std::env::var_os("PROCFLOW_OTEL").is_some();
    let _tracing = match init_tracing(&tracing_options) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: tracing setup failed: {e}");
            None
        }
    };

    dispatch(cli).await
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "procflow", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init(cli.data_dir.clone()).await?;
    let json = cli.json;

    match cli.command {
        Commands::Validate { file } => cli::graph::validate_file(&state, &file, json).await?,
        Commands::Create { file } => cli::graph::create_graph(&state, &file, json).await?,
        Commands::Update { id, file } => cli::graph::update_graph(&state, id, &file, json).await?,
        Commands::List => cli::graph::list_graphs(&state, json).await?,
        Commands::Show { id } => cli::graph::show_graph(&state, id, json).await?,
        Commands::Delete { id, force } => cli::graph::delete_graph(&state, id, force, json).await?,
        Commands::Run {
            id,
            no_wait,
            timeout,
        } => cli::run::run_graph(&state, id, no_wait, timeout, json).await?,
        Commands::Status { id } => cli::run::graph_status(&state, id, json).await?,
        Commands::NodeTypes => cli::catalog::list_node_types(&state, json)?,
        Commands::Example { example } => match example {
            ExampleCommand::Arithmetic { run } => {
                cli::catalog::arithmetic_example(&state, run, json).await?
            }
        },
        Commands::Completions { .. } => unreachable!("handled above"),
    }

    Ok(())
}
