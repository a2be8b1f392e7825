//! Graph definition commands: validate, create, update, list, show, delete.

use std::path::Path;

use anyhow::{Result, bail};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::Confirm;
use procflow_types::graph::{GraphDefinition, GraphId, Node, NodeStatus};
use procflow_types::run::RunSummary;

use super::file::load_graph_file;
use crate::state::AppState;

pub async fn validate_file(state: &AppState, path: &Path, json: bool) -> Result<()> {
    let def = load_graph_file(path).await?;
    let errors = state.definitions.validate(&def);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "valid": errors.is_empty(),
                "errors": errors,
            }))?
        );
    } else if errors.is_empty() {
        println!(
            "  {} '{}' is valid ({} nodes)",
            style("✓").green().bold(),
            def.name,
            def.nodes.len()
        );
    } else {
        println!("  {} '{}' is invalid:", style("✗").red().bold(), def.name);
        for error in &errors {
            println!("    {} {error}", style("•").dim());
        }
    }

    if !errors.is_empty() {
        bail!("validation failed with {} error(s)", errors.len());
    }
    Ok(())
}

pub async fn create_graph(state: &AppState, path: &Path, json: bool) -> Result<()> {
    let def = load_graph_file(path).await?;
    let created = state.definitions.create(def).await?;
    print_saved(&created, "created", json)
}

pub async fn update_graph(state: &AppState, id: GraphId, path: &Path, json: bool) -> Result<()> {
    let def = load_graph_file(path).await?;
    let updated = state.definitions.update(id, def).await?;
    print_saved(&updated, "updated", json)
}

fn print_saved(def: &GraphDefinition, verb: &str, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(def)?);
        return Ok(());
    }
    println!();
    println!("  {} Graph {verb}", style("✓").green().bold());
    println!("  {}  {}", style("Name:").bold(), style(&def.name).cyan());
    println!("  {}  {}", style("ID:").bold(), style(def.id).dim());
    println!("  {}  {}", style("Nodes:").bold(), def.nodes.len());
    println!();
    println!("  Run it: {}", style(format!("procflow run {}", def.id)).yellow());
    println!();
    Ok(())
}

pub async fn list_graphs(state: &AppState, json: bool) -> Result<()> {
    let graphs = state.definitions.list().await?;

    if json {
        let rows: Vec<_> = graphs
            .iter()
            .map(|g| {
                serde_json::json!({
                    "id": g.id,
                    "name": g.name,
                    "description": g.description,
                    "nodes": g.nodes.len(),
                    "summary": RunSummary::of(g),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if graphs.is_empty() {
        println!();
        println!(
            "  {} No graphs found. Create one with: {}",
            style("i").blue().bold(),
            style("procflow example arithmetic").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("ID").fg(Color::White),
        Cell::new("Name").fg(Color::White),
        Cell::new("Nodes").fg(Color::White),
        Cell::new("Last Run").fg(Color::White),
    ]);

    for graph in &graphs {
        table.add_row(vec![
            Cell::new(graph.id.to_string()).fg(Color::DarkGrey),
            Cell::new(&graph.name),
            Cell::new(graph.nodes.len()),
            summary_cell(&RunSummary::of(graph)),
        ]);
    }

    println!("{table}");
    Ok(())
}

pub async fn show_graph(state: &AppState, id: GraphId, json: bool) -> Result<()> {
    let graph = state.definitions.get(id).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&graph)?);
        return Ok(());
    }
    print_graph(&graph);
    Ok(())
}

pub async fn delete_graph(state: &AppState, id: GraphId, force: bool, json: bool) -> Result<()> {
    let graph = state.definitions.get(id).await?;

    if state.runs.is_running(id) {
        bail!("graph '{}' has a run in progress", graph.name);
    }

    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Permanently delete graph '{}'?",
                style(&graph.name).red().bold()
            ))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    let deleted = state.definitions.delete(id).await?;

    if json {
        println!("{}", serde_json::json!({"deleted": deleted, "id": id}));
    } else {
        println!("  {} Graph '{}' deleted.", style("✓").red().bold(), graph.name);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Rendering shared with the run commands
// ---------------------------------------------------------------------------

/// Header plus a node table ordered by level.
pub fn print_graph(graph: &GraphDefinition) {
    println!();
    println!("  {}  {}", style(&graph.name).cyan().bold(), style(graph.id).dim());
    if let Some(description) = &graph.description {
        println!("  {description}");
    }
    println!();
    println!("{}", node_table(graph));
    println!("  {}", summary_line(&RunSummary::of(graph)));
    println!();
}

pub fn node_table(graph: &GraphDefinition) -> Table {
    let mut nodes: Vec<&Node> = graph.nodes.iter().collect();
    nodes.sort_by_key(|n| n.level.unwrap_or(u32::MAX));

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Level").fg(Color::White),
        Cell::new("ID").fg(Color::White),
        Cell::new("Type").fg(Color::White),
        Cell::new("Status").fg(Color::White),
        Cell::new("Result").fg(Color::White),
    ]);

    for node in nodes {
        let level = node.level.map_or_else(|| "-".to_string(), |l| l.to_string());
        let outcome = match (&node.result, &node.error) {
            (_, Some(error)) => Cell::new(error).fg(Color::Red),
            (Some(result), None) => Cell::new(render_value(result)),
            (None, None) => Cell::new(""),
        };
        table.add_row(vec![
            Cell::new(level),
            Cell::new(&node.id),
            Cell::new(&node.node_type).fg(Color::DarkGrey),
            status_cell(node.status),
            outcome,
        ]);
    }
    table
}

fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn status_cell(status: NodeStatus) -> Cell {
    match status {
        NodeStatus::Pending => Cell::new("○ pending").fg(Color::DarkGrey),
        NodeStatus::Running => Cell::new("◐ running").fg(Color::Yellow),
        NodeStatus::Completed => Cell::new("● completed").fg(Color::Green),
        NodeStatus::Failed => Cell::new("✗ failed").fg(Color::Red),
    }
}

fn summary_cell(summary: &RunSummary) -> Cell {
    if summary.failed > 0 {
        Cell::new(format!("{} failed", summary.failed)).fg(Color::Red)
    } else if summary.all_completed() {
        Cell::new("completed").fg(Color::Green)
    } else if summary.completed > 0 || summary.running > 0 {
        Cell::new("partial").fg(Color::Yellow)
    } else {
        Cell::new("never").fg(Color::DarkGrey)
    }
}

pub fn summary_line(summary: &RunSummary) -> String {
    format!(
        "{} completed, {} failed, {} running, {} pending",
        style(summary.completed).green(),
        style(summary.failed).red(),
        style(summary.running).yellow(),
        style(summary.pending).dim()
    )
}
