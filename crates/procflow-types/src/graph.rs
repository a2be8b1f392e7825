//! Graph definition types.
//!
//! A [`GraphDefinition`] is a DAG of typed [`Node`]s. Edges are expressed by
//! `child_node_ids`: a node's children consume its result and run after it.
//! Run-scoped fields (`status`, `result`, `error`) live on the node but are
//! reset at the start of every run, which always operates on its own copy.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a graph definition, wrapping a UUID v7 (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GraphId(pub Uuid);

impl GraphId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for GraphId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GraphId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Run-scoped status of a single node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl NodeStatus {
    /// Completed and failed nodes are never dispatched again within a run.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A single operation in a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Stable node id, unique within its graph.
    #[serde(default)]
    pub id: String,
    pub name: String,
    /// Key into the operation registry, e.g. `"logging"` or `"math.addition"`.
    #[serde(rename = "type")]
    pub node_type: String,
    /// Distance from the roots. Computed, never user-supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    #[serde(default)]
    pub properties: HashMap<String, String>,
    /// Downstream nodes that consume this node's result.
    #[serde(default)]
    pub child_node_ids: Vec<String>,
    #[serde(default)]
    pub status: NodeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Node {
    pub fn new(id: impl Into<String>, name: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            node_type: node_type.into(),
            level: None,
            properties: HashMap::new(),
            child_node_ids: Vec::new(),
            status: NodeStatus::Pending,
            result: None,
            error: None,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_child(mut self, child_id: impl Into<String>) -> Self {
        self.child_node_ids.push(child_id.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn reset_run_state(&mut self) {
        self.status = NodeStatus::Pending;
        self.result = None;
        self.error = None;
    }

    pub fn complete(&mut self, result: serde_json::Value) {
        self.status = NodeStatus::Completed;
        self.result = Some(result);
        self.error = None;
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = NodeStatus::Failed;
        self.result = None;
        self.error = Some(error.into());
    }
}

/// A user-defined computation graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDefinition {
    #[serde(default)]
    pub id: GraphId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    /// Entry points: nodes with no incoming edges.
    #[serde(default)]
    pub root_node_ids: Vec<String>,
    /// Node id -> position in `nodes`. Derived, never persisted.
    #[serde(skip)]
    node_index: HashMap<String, usize>,
}

impl GraphDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: GraphId::new(),
            name: name.into(),
            description: None,
            nodes: Vec::new(),
            root_node_ids: Vec::new(),
            node_index: HashMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_node(mut self, node: Node) -> Self {
        self.push_node(node);
        self
    }

    pub fn with_root(mut self, node_id: impl Into<String>) -> Self {
        self.root_node_ids.push(node_id.into());
        self
    }

    pub fn push_node(&mut self, node: Node) {
        self.node_index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
    }

    /// Rebuild the id index. Must be called after `nodes` is mutated directly.
    ///
    /// On duplicate ids the first occurrence wins.
    pub fn build_node_index(&mut self) {
        self.node_index.clear();
        for (idx, node) in self.nodes.iter().enumerate() {
            self.node_index.entry(node.id.clone()).or_insert(idx);
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        match self.node_index.get(id) {
            Some(&idx) if self.nodes.get(idx).is_some_and(|n| n.id == id) => Some(idx),
            // Stale or missing index: fall back to a scan.
            _ => self.nodes.iter().position(|n| n.id == id),
        }
    }

    pub fn node_by_id(&self, id: &str) -> Option<&Node> {
        self.position(id).map(|idx| &self.nodes[idx])
    }

    pub fn node_by_id_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.position(id).map(move |idx| &mut self.nodes[idx])
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn root_nodes(&self) -> Vec<&Node> {
        self.root_node_ids
            .iter()
            .filter_map(|id| self.node_by_id(id))
            .collect()
    }

    /// Reset every node to `Pending` with no result.
    pub fn reset_run_state(&mut self) {
        for node in &mut self.nodes {
            node.reset_run_state();
        }
    }

    pub fn count_by_status(&self, status: NodeStatus) -> usize {
        self.nodes.iter().filter(|n| n.status == status).count()
    }
}
