//! Structural validation and level computation.
//!
//! Uses `petgraph` to model the node/edge relation as a directed graph with
//! edges from parent to child. Cycle detection is a depth-first search that
//! flags any edge back to a node still on the search stack; levels are the
//! longest path from a root, computed over a topological order.

use std::collections::{HashMap, HashSet};

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Control, DfsEvent, depth_first_search};
use procflow_types::error::ValidationError;
use procflow_types::graph::GraphDefinition;

/// Petgraph view of a definition. Edges to unknown children are dropped.
struct GraphIndex<'a> {
    graph: DiGraph<&'a str, ()>,
    indices: HashMap<&'a str, NodeIndex>,
}

impl<'a> GraphIndex<'a> {
    fn build(def: &'a GraphDefinition) -> Self {
        let mut graph = DiGraph::<&str, ()>::new();
        let mut indices = HashMap::new();
        for node in &def.nodes {
            indices
                .entry(node.id.as_str())
                .or_insert_with(|| graph.add_node(node.id.as_str()));
        }
        for node in &def.nodes {
            let from = indices[node.id.as_str()];
            for child in &node.child_node_ids {
                if let Some(&to) = indices.get(child.as_str()) {
                    graph.update_edge(from, to, ());
                }
            }
        }
        Self { graph, indices }
    }

    /// First node found revisiting itself through a back edge, if any.
    fn find_cycle(&self) -> Option<&'a str> {
        let starts: Vec<NodeIndex> = self.graph.node_indices().collect();
        let found = depth_first_search(&self.graph, starts, |event| match event {
            DfsEvent::BackEdge(_, target) => Control::Break(target),
            _ => Control::Continue,
        });
        match found {
            Control::Break(idx) => Some(self.graph[idx]),
            _ => None,
        }
    }
}

/// Check a definition for structural soundness.
///
/// Returns every problem found; an empty list means the graph is valid.
pub fn validate(def: &GraphDefinition) -> Vec<String> {
    let mut errors = Vec::new();

    if def.name.trim().is_empty() {
        errors.push("Graph definition must have a name".to_string());
    }
    if def.nodes.is_empty() {
        errors.push("Graph definition must have at least one node".to_string());
    }
    if def.root_node_ids.is_empty() {
        errors.push("Graph definition must have at least one root node".to_string());
    }

    let mut seen = HashSet::new();
    for (position, node) in def.nodes.iter().enumerate() {
        if node.id.is_empty() {
            errors.push(format!("Node at position {position} has no id"));
        } else if !seen.insert(node.id.as_str()) {
            errors.push(format!("Duplicate node id: {}", node.id));
        }
    }

    for root_id in &def.root_node_ids {
        if !seen.contains(root_id.as_str()) {
            errors.push(format!("Root node not found: {root_id}"));
        }
    }

    let mut has_parent: HashMap<&str, &str> = HashMap::new();
    for node in &def.nodes {
        for child_id in &node.child_node_ids {
            if seen.contains(child_id.as_str()) {
                has_parent.entry(child_id.as_str()).or_insert(node.id.as_str());
            } else {
                errors.push(format!(
                    "Child node not found: {child_id} (referenced by node {})",
                    node.id
                ));
            }
        }
    }

    for root_id in &def.root_node_ids {
        if let Some(parent) = has_parent.get(root_id.as_str()) {
            errors.push(format!(
                "Root node has an incoming edge: {root_id} (child of node {parent})"
            ));
        }
    }

    if let Some(node_id) = GraphIndex::build(def).find_cycle() {
        errors.push(format!(
            "Graph definition contains a cycle (through node {node_id})"
        ));
    }

    errors
}

/// [`validate`], reporting failure as a [`ValidationError`].
pub fn ensure_valid(def: &GraphDefinition) -> Result<(), ValidationError> {
    let errors = validate(def);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new(errors))
    }
}

/// Assign each node its level: the longest path from any root.
///
/// Roots are level 0 and every edge satisfies
/// `level(child) >= level(parent) + 1`. Nodes unreachable from a root get
/// no level. Fails only when the graph is cyclic.
pub fn compute_levels(def: &mut GraphDefinition) -> Result<(), ValidationError> {
    let levels = {
        let index = GraphIndex::build(def);
        let sorted = toposort(&index.graph, None).map_err(|cycle| {
            ValidationError::new(vec![format!(
                "Graph definition contains a cycle (through node {})",
                index.graph[cycle.node_id()]
            )])
        })?;

        let mut levels: HashMap<String, u32> = HashMap::new();
        for root_id in &def.root_node_ids {
            if index.indices.contains_key(root_id.as_str()) {
                levels.insert(root_id.clone(), 0);
            }
        }

        for idx in sorted {
            let node_id = index.graph[idx];
            let Some(&level) = levels.get(node_id) else {
                continue;
            };
            for child in index.graph.neighbors(idx) {
                let entry = levels.entry(index.graph[child].to_string()).or_insert(0);
                *entry = (*entry).max(level + 1);
            }
        }
        levels
    };

    for node in &mut def.nodes {
        node.level = levels.get(&node.id).copied();
    }
    def.build_node_index();
    Ok(())
}

/// Nodes grouped by computed level, index 0 first. Unleveled nodes are
/// omitted.
pub fn group_by_level(def: &GraphDefinition) -> Vec<Vec<&str>> {
    let max_level = def.nodes.iter().filter_map(|n| n.level).max();
    let Some(max_level) = max_level else {
        return Vec::new();
    };
    let mut groups = vec![Vec::new(); max_level as usize + 1];
    for node in &def.nodes {
        if let Some(level) = node.level {
            groups[level as usize].push(node.id.as_str());
        }
    }
    groups
}
