//! Run records: the terminal (or live) state of one execution of a graph.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::graph::{GraphDefinition, GraphId, NodeStatus};

/// Lifecycle of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Initializing,
    Running,
    /// All reachable levels were processed. Individual nodes may still be failed.
    Completed,
    /// A stop request was observed before the level queue drained.
    Cancelled,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// One execution attempt of a graph definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphRun {
    /// UUIDv7 run ID.
    pub run_id: Uuid,
    pub graph_id: GraphId,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Run-scoped copy of the definition carrying per-node status and results.
    pub graph: GraphDefinition,
}

impl GraphRun {
    pub fn summary(&self) -> RunSummary {
        RunSummary::of(&self.graph)
    }
}

/// Node counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn of(graph: &GraphDefinition) -> Self {
        let mut summary = Self::default();
        for node in &graph.nodes {
            match node.status {
                NodeStatus::Pending => summary.pending += 1,
                NodeStatus::Running => summary.running += 1,
                NodeStatus::Completed => summary.completed += 1,
                NodeStatus::Failed => summary.failed += 1,
            }
        }
        summary
    }

    /// True when every node completed.
    pub fn all_completed(&self) -> bool {
        self.pending == 0 && self.running == 0 && self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Node;

    #[test]
    fn test_summary_counts_each_status() {
        let mut graph = GraphDefinition::new("g")
            .with_node(Node::new("a", "A", "logging"))
            .with_node(Node::new("b", "B", "logging"))
            .with_node(Node::new("c", "C", "logging"));
        graph.node_by_id_mut("a").unwrap().complete(serde_json::json!("ok"));
        graph.node_by_id_mut("b").unwrap().fail("bad");

        let summary = RunSummary::of(&graph);
        assert_eq!(
            summary,
            RunSummary { pending: 1, running: 0, completed: 1, failed: 1 }
        );
        assert!(!summary.all_completed());
    }

    #[test]
    fn test_run_status_serializes_snake_case() {
        let json = serde_json::to_string(&RunStatus::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");
        assert_eq!(RunStatus::Initializing.to_string(), "initializing");
    }
}
