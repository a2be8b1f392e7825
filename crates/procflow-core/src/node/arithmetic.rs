//! `math.*` nodes: binary arithmetic over literals or dependency results.
//!
//! Each side is resolved from `<side>Operand` first. A numeric literal is
//! used as-is; otherwise the value is treated as a dependency node id. When
//! that does not resolve either, `<side>NodeResult` names the dependency to
//! read instead.

use procflow_types::graph::Node;
use serde_json::{Value, json};

use super::{DependencyResults, NodeError, NodeExecutor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticOp {
    Addition,
    Subtraction,
    Multiplication,
    Division,
}

impl ArithmeticOp {
    pub const ALL: [ArithmeticOp; 4] = [
        Self::Addition,
        Self::Subtraction,
        Self::Multiplication,
        Self::Division,
    ];

    pub fn node_type(self) -> &'static str {
        match self {
            Self::Addition => "math.addition",
            Self::Subtraction => "math.subtraction",
            Self::Multiplication => "math.multiplication",
            Self::Division => "math.division",
        }
    }

    pub fn from_node_type(node_type: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.node_type() == node_type)
    }

    pub fn symbol(self) -> char {
        match self {
            Self::Addition => '+',
            Self::Subtraction => '-',
            Self::Multiplication => '*',
            Self::Division => '/',
        }
    }

    /// Fails on division by zero and on overflow to infinity, which has no
    /// JSON representation.
    pub fn apply(self, left: f64, right: f64) -> Result<f64, NodeError> {
        let value = match self {
            Self::Addition => left + right,
            Self::Subtraction => left - right,
            Self::Multiplication => left * right,
            Self::Division if right == 0.0 => return Err(NodeError::DivisionByZero),
            Self::Division => left / right,
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(NodeError::NonFiniteResult {
                op: self.symbol(),
                left,
                right,
            })
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Left,
    Right,
}

impl Side {
    fn name(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }

    fn operand_key(self) -> &'static str {
        match self {
            Self::Left => "leftOperand",
            Self::Right => "rightOperand",
        }
    }

    fn reference_key(self) -> &'static str {
        match self {
            Self::Left => "leftNodeResult",
            Self::Right => "rightNodeResult",
        }
    }
}

fn parse_literal(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn dependency_value(deps: &DependencyResults, node_id: &str) -> Option<Result<f64, NodeError>> {
    deps.contains(node_id).then(|| {
        deps.numeric(node_id)
            .ok_or_else(|| NodeError::NonNumericDependency(node_id.to_string()))
    })
}

fn resolve_operand(node: &Node, deps: &DependencyResults, side: Side) -> Result<f64, NodeError> {
    let operand = node.property(side.operand_key()).map(str::trim);
    let reference = node
        .property(side.reference_key())
        .map(str::trim)
        .filter(|r| !r.is_empty());

    if let Some(raw) = operand.filter(|r| !r.is_empty()) {
        if let Some(value) = parse_literal(raw) {
            return Ok(value);
        }
        if let Some(value) = dependency_value(deps, raw) {
            return value;
        }
        if reference.is_none() {
            return Err(NodeError::InvalidOperand {
                side: side.name(),
                value: raw.to_string(),
            });
        }
    }

    match reference {
        Some(node_id) => dependency_value(deps, node_id).unwrap_or_else(|| {
            Err(NodeError::InvalidOperand {
                side: side.name(),
                value: node_id.to_string(),
            })
        }),
        None => Err(NodeError::MissingProperty(side.operand_key())),
    }
}

/// Executes one arithmetic operator.
#[derive(Debug, Clone)]
pub struct ArithmeticNodeExecutor {
    op: ArithmeticOp,
    node_types: [&'static str; 1],
}

impl ArithmeticNodeExecutor {
    pub fn new(op: ArithmeticOp) -> Self {
        Self {
            op,
            node_types: [op.node_type()],
        }
    }

    pub fn op(&self) -> ArithmeticOp {
        self.op
    }

    pub fn compute(&self, node: &Node, deps: &DependencyResults) -> Result<f64, NodeError> {
        let left = resolve_operand(node, deps, Side::Left)?;
        let right = resolve_operand(node, deps, Side::Right)?;
        let value = self.op.apply(left, right)?;
        tracing::debug!(
            node_id = node.id.as_str(),
            left,
            right,
            op = %self.op.symbol(),
            value,
            "arithmetic evaluated"
        );
        Ok(value)
    }
}

impl NodeExecutor for ArithmeticNodeExecutor {
    fn node_types(&self) -> &[&'static str] {
        &self.node_types
    }

    async fn execute(&self, node: &Node, deps: &DependencyResults) -> Result<Value, NodeError> {
        self.compute(node, deps).map(|v| json!(v))
    }
}
