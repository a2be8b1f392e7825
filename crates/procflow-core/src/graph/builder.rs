//! Fluent construction of arithmetic expression graphs.
//!
//! Each operation becomes a `math.*` node. An operand that refers to an
//! earlier operation is wired twice: the operand property names the node,
//! and the referenced node lists the new one as its child so it runs first.

use std::collections::HashMap;

use procflow_types::error::ValidationError;
use procflow_types::graph::{GraphDefinition, Node};

use super::validator::{compute_levels, ensure_valid};
use crate::node::arithmetic::ArithmeticOp;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("operand refers to unknown node '{0}'")]
    UnknownNode(String),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// One side of an arithmetic operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Literal(f64),
    /// Result of another node in the same graph.
    Node(String),
}

impl From<f64> for Operand {
    fn from(value: f64) -> Self {
        Self::Literal(value)
    }
}

impl From<&str> for Operand {
    fn from(node_id: &str) -> Self {
        Self::Node(node_id.to_string())
    }
}

impl From<&String> for Operand {
    fn from(node_id: &String) -> Self {
        Self::Node(node_id.clone())
    }
}

#[derive(Debug)]
pub struct ArithmeticGraphBuilder {
    graph: GraphDefinition,
    counters: HashMap<ArithmeticOp, usize>,
}

impl ArithmeticGraphBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            graph: GraphDefinition::new(name),
            counters: HashMap::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.graph.description = Some(description.into());
        self
    }

    fn next_id(&mut self, op: ArithmeticOp) -> String {
        let counter = self.counters.entry(op).or_insert(0);
        *counter += 1;
        let prefix = match op {
            ArithmeticOp::Addition => "add",
            ArithmeticOp::Subtraction => "sub",
            ArithmeticOp::Multiplication => "mul",
            ArithmeticOp::Division => "div",
        };
        format!("{prefix}{counter}")
    }

    /// Add `left <op> right` and return the new node's id.
    pub fn operation(
        &mut self,
        op: ArithmeticOp,
        left: impl Into<Operand>,
        right: impl Into<Operand>,
    ) -> Result<String, BuildError> {
        let left = left.into();
        let right = right.into();
        for operand in [&left, &right] {
            if let Operand::Node(id) = operand {
                if !self.graph.contains_node(id) {
                    return Err(BuildError::UnknownNode(id.clone()));
                }
            }
        }

        let id = self.next_id(op);
        let mut node = Node::new(&id, format!("{} {}", id, op.symbol()), op.node_type());
        for (operand, operand_key, reference_key) in [
            (&left, "leftOperand", "leftNodeResult"),
            (&right, "rightOperand", "rightNodeResult"),
        ] {
            match operand {
                Operand::Literal(value) => {
                    node.properties.insert(operand_key.to_string(), value.to_string());
                }
                Operand::Node(dep) => {
                    node.properties.insert(operand_key.to_string(), dep.clone());
                    node.properties.insert(reference_key.to_string(), dep.clone());
                    if let Some(parent) = self.graph.node_by_id_mut(dep) {
                        if !parent.child_node_ids.contains(&id) {
                            parent.child_node_ids.push(id.clone());
                        }
                    }
                }
            }
        }
        self.graph.push_node(node);
        Ok(id)
    }

    /// Finish the graph. Nodes without parents become the roots.
    pub fn build(mut self) -> Result<GraphDefinition, BuildError> {
        let parents = super::parent_map(&self.graph);
        self.graph.root_node_ids = self
            .graph
            .nodes
            .iter()
            .filter(|n| !parents.contains_key(&n.id))
            .map(|n| n.id.clone())
            .collect();
        ensure_valid(&self.graph)?;
        compute_levels(&mut self.graph)?;
        Ok(self.graph)
    }

    /// `10 * ((1*3)+(2*3)+(3*5)+(4*6)) / 2`, which evaluates to 240.
    pub fn example() -> Result<GraphDefinition, BuildError> {
        use ArithmeticOp::*;

        let mut b = Self::new("arithmetic-example")
            .description("10 * ((1*3)+(2*3)+(3*5)+(4*6)) / 2");
        let m1 = b.operation(Multiplication, 1.0, 3.0)?;
        let m2 = b.operation(Multiplication, 2.0, 3.0)?;
        let m3 = b.operation(Multiplication, 3.0, 5.0)?;
        let m4 = b.operation(Multiplication, 4.0, 6.0)?;
        let s1 = b.operation(Addition, &m1, &m2)?;
        let s2 = b.operation(Addition, &m3, &m4)?;
        let s3 = b.operation(Addition, &s1, &s2)?;
        let scaled = b.operation(Multiplication, 10.0, &s3)?;
        b.operation(Division, &scaled, 2.0)?;
        b.build()
    }
}
