//! Node type palette and built-in example graphs.

use std::time::Duration;

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use procflow_core::execution::coordinator::Submission;
use procflow_core::graph::builder::ArithmeticGraphBuilder;

use super::graph::node_table;
use crate::state::AppState;

pub fn list_node_types(state: &AppState, json: bool) -> Result<()> {
    let types = state.runs.node_types();

    if json {
        println!("{}", serde_json::to_string_pretty(&types)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Type").fg(Color::White),
        Cell::new("Properties").fg(Color::White),
    ]);
    for node_type in &types {
        table.add_row(vec![
            Cell::new(node_type).fg(Color::Cyan),
            Cell::new(describe(node_type)).fg(Color::DarkGrey),
        ]);
    }
    println!("{table}");
    Ok(())
}

fn describe(node_type: &str) -> &'static str {
    match node_type {
        "logging" => "message",
        "http" => "url, method, body, header.<name>",
        "script" => "script (JEXL)",
        "conditional" => "condition (JEXL)",
        t if t.starts_with("math.") => "leftOperand | leftNodeResult, rightOperand | rightNodeResult",
        _ => "",
    }
}

/// Store the arithmetic example and optionally run it.
pub async fn arithmetic_example(state: &AppState, run: bool, json: bool) -> Result<()> {
    let created = state
        .definitions
        .create(ArithmeticGraphBuilder::example()?)
        .await?;

    if !run {
        if json {
            println!("{}", serde_json::to_string_pretty(&created)?);
        } else {
            println!();
            println!(
                "  {} Example graph created: {}",
                style("✓").green().bold(),
                style(created.id).dim()
            );
            println!("{}", node_table(&created));
            println!("  Run it: {}", style(format!("procflow run {}", created.id)).yellow());
            println!();
        }
        return Ok(());
    }

    let wait = Duration::from_secs(state.config.default_wait_timeout_secs);
    let outcome = state.runs.submit(created.id, Some(wait)).await?;
    let graph_run = match outcome {
        Submission::Finished(graph_run) => graph_run,
        Submission::Started(handle) => handle.wait().await?,
        Submission::TimedOut(handle) => {
            eprintln!("  Run did not finish within {}s, stopping it...", wait.as_secs());
            state.runs.stop(created.id);
            handle.wait().await?
        }
    };

    let answer = graph_run
        .graph
        .node_by_id("div1")
        .and_then(|n| n.result.as_ref())
        .and_then(|v| v.as_f64());

    if json {
        println!("{}", serde_json::to_string_pretty(&graph_run)?);
    } else {
        println!();
        println!("{}", node_table(&graph_run.graph));
        match answer {
            Some(value) => println!(
                "  10 * ((1*3) + (2*3) + (3*5) + (4*6)) / 2 = {}",
                style(value).green().bold()
            ),
            None => println!("  {} the run did not produce a result", style("✗").red().bold()),
        }
        println!();
    }
    Ok(())
}
