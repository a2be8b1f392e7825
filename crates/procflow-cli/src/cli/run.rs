//! Run commands: run, status.

use std::time::Duration;

use anyhow::{Result, bail};
use console::style;
use procflow_core::execution::coordinator::{RunHandle, Submission};
use procflow_types::graph::GraphId;
use procflow_types::run::{GraphRun, RunStatus};

use super::graph::{node_table, print_graph, summary_line};
use crate::state::AppState;

/// Execute a stored graph and report the terminal state.
///
/// The run lives in this process, so it is always driven to a terminal
/// state before the command returns. `--no-wait` only changes what is
/// reported. Ctrl+C stops the run at the next level boundary. So does an
/// elapsed timeout, which is reported as `timed_out` rather than as a
/// finished or cancelled run.
pub async fn run_graph(
    state: &AppState,
    id: GraphId,
    no_wait: bool,
    timeout: Option<u64>,
    json: bool,
) -> Result<()> {
    let handle = state.runs.execute(id).await?;
    let wait_secs = timeout.unwrap_or(state.config.default_wait_timeout_secs);
    let limit = (!no_wait).then(|| Duration::from_secs(wait_secs));

    let submission = tokio::select! {
        submission = handle.wait_for(limit) => submission?,
        _ = tokio::signal::ctrl_c() => {
            let run = stop_and_wait(state, &handle).await?;
            print_run(&run, json)?;
            bail!("run {} was interrupted", run.run_id);
        }
    };

    match submission {
        Submission::Started(handle) => {
            print_started(&handle, json)?;
            let run = settle(state, &handle).await?;
            if !json {
                println!("  {} run {} {}", style("•").dim(), style(run.run_id).dim(), run.status);
            }
            Ok(())
        }
        Submission::Finished(run) => {
            print_run(&run, json)?;
            if run.status == RunStatus::Cancelled {
                bail!("run {} was cancelled", run.run_id);
            }
            Ok(())
        }
        Submission::TimedOut(handle) => {
            tracing::warn!(graph_id = %handle.graph_id, run_id = %handle.run_id, wait_secs, "wait timed out, stopping run");
            let run = stop_and_wait(state, &handle).await?;
            print_timed_out(&run, wait_secs, json)?;
            bail!("run {} did not finish within {wait_secs}s and was stopped", run.run_id);
        }
    }
}

/// Wait for the handle. Ctrl+C stops the run and waits for it to settle.
async fn settle(state: &AppState, handle: &RunHandle) -> Result<GraphRun> {
    tokio::select! {
        result = handle.wait() => Ok(result?),
        _ = tokio::signal::ctrl_c() => stop_and_wait(state, handle).await,
    }
}

async fn stop_and_wait(state: &AppState, handle: &RunHandle) -> Result<GraphRun> {
    eprintln!("  Stopping run...");
    state.runs.stop(handle.graph_id);
    Ok(handle.wait().await?)
}

/// JSON report for a run whose wait elapsed before it finished.
fn timed_out_report(run: &GraphRun, wait_secs: u64) -> serde_json::Value {
    serde_json::json!({
        "graphId": run.graph_id,
        "runId": run.run_id,
        "status": "timed_out",
        "waitSecs": wait_secs,
        "run": run,
    })
}

fn print_timed_out(run: &GraphRun, wait_secs: u64, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&timed_out_report(run, wait_secs))?);
        return Ok(());
    }
    println!();
    println!(
        "  {} Run {} timed out after {}s",
        style("⏱").yellow().bold(),
        style(run.run_id).dim(),
        wait_secs
    );
    print_run(run, false)
}

fn print_started(handle: &RunHandle, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::json!({
                "graphId": handle.graph_id,
                "runId": handle.run_id,
                "status": "started",
            })
        );
    } else {
        println!(
            "  {} Run {} started",
            style("▶").cyan().bold(),
            style(handle.run_id).dim()
        );
    }
    Ok(())
}

fn print_run(run: &GraphRun, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(run)?);
        return Ok(());
    }

    let status = match run.status {
        RunStatus::Completed if run.summary().all_completed() => style("completed").green().bold(),
        RunStatus::Completed => style("completed with failures").yellow().bold(),
        RunStatus::Cancelled => style("cancelled").red().bold(),
        RunStatus::Initializing | RunStatus::Running => style("unfinished").dim(),
    };
    let elapsed = run
        .finished_at
        .map(|end| (end - run.started_at).num_milliseconds())
        .unwrap_or_default();

    println!();
    println!(
        "  {} {}  {}",
        style(&run.graph.name).cyan().bold(),
        status,
        style(format!("{elapsed}ms")).dim()
    );
    println!();
    println!("{}", node_table(&run.graph));
    println!("  {}", summary_line(&run.summary()));
    println!();
    Ok(())
}

pub async fn graph_status(state: &AppState, id: GraphId, json: bool) -> Result<()> {
    let status = state.runs.status(id).await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "running": status.running,
                "runId": status.run_id,
                "runStatus": status.run_status,
                "graph": status.graph,
            }))?
        );
        return Ok(());
    }

    if let Some(run_id) = status.run_id {
        println!(
            "  {} Run {} in progress",
            style("◐").yellow().bold(),
            style(run_id).dim()
        );
    }
    print_graph(&status.graph);
    Ok(())
}
