//! Graph structure: validation, level computation, dependency lookups and
//! the arithmetic graph builder.

pub mod builder;
pub mod validator;

use std::collections::HashMap;

use procflow_types::graph::GraphDefinition;

/// Node id -> ids of the nodes that list it as a child, in definition order.
///
/// A node's parents are its dependencies: it runs only after all of them
/// completed.
pub fn parent_map(def: &GraphDefinition) -> HashMap<String, Vec<String>> {
    let mut parents: HashMap<String, Vec<String>> = HashMap::new();
    for node in &def.nodes {
        for child in &node.child_node_ids {
            let entry = parents.entry(child.clone()).or_default();
            if !entry.contains(&node.id) {
                entry.push(node.id.clone());
            }
        }
    }
    parents
}

/// Whether `a` and `b` describe the same graph, ignoring levels and per-node
/// run state.
pub fn same_structure(a: &GraphDefinition, b: &GraphDefinition) -> bool {
    a.id == b.id
        && a.name == b.name
        && a.description == b.description
        && a.root_node_ids == b.root_node_ids
        && a.nodes.len() == b.nodes.len()
        && a.nodes.iter().zip(&b.nodes).all(|(x, y)| {
            x.id == y.id
                && x.name == y.name
                && x.node_type == y.node_type
                && x.properties == y.properties
                && x.child_node_ids == y.child_node_ids
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use procflow_types::graph::Node;

    #[test]
    fn test_parent_map_collects_every_parent_once() {
        let def = GraphDefinition::new("g")
            .with_node(Node::new("a", "A", "logging").with_child("c").with_child("c"))
            .with_node(Node::new("b", "B", "logging").with_child("c"))
            .with_node(Node::new("c", "C", "logging"));
        let parents = parent_map(&def);
        assert_eq!(parents["c"], vec!["a", "b"]);
        assert!(!parents.contains_key("a"));
    }

    #[test]
    fn test_same_structure_ignores_run_state() {
        let def = GraphDefinition::new("g")
            .with_node(Node::new("a", "A", "logging").with_child("b"))
            .with_node(Node::new("b", "B", "logging"))
            .with_root("a");
        let mut ran = def.clone();
        ran.nodes[0].level = Some(0);
        ran.nodes[0].complete(serde_json::json!("done"));
        assert!(same_structure(&def, &ran));

        let mut edited = def.clone();
        edited.nodes[1] = edited.nodes[1].clone().with_property("message", "hi");
        assert!(!same_structure(&def, &edited));
    }
}
