//! Node executors: one implementation per node type, dispatched through the
//! [`registry::OperationRegistry`].
//!
//! An executor reads only its node's `properties` and the results of the
//! node's already-completed dependencies. It reports success as `Ok(value)`
//! and every failure as a [`NodeError`]; the graph executor turns that into
//! the node's terminal `Completed`/`Failed` state.

pub mod arithmetic;
pub mod box_executor;
pub mod conditional;
pub mod expression;
pub mod http;
pub mod logging;
pub mod registry;
pub mod script;

use std::collections::HashMap;

use procflow_types::graph::Node;
use serde_json::Value;

use self::expression::ExpressionError;

/// Errors reported by node executors. Never fatal to a run.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("missing required property '{0}'")]
    MissingProperty(&'static str),

    #[error("property '{0}' is empty")]
    EmptyProperty(&'static str),

    #[error("{side} operand '{value}' is neither a number nor a dependency with a numeric result")]
    InvalidOperand { side: &'static str, value: String },

    #[error("dependency '{0}' has no numeric result")]
    NonNumericDependency(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("result of {left} {op} {right} is not a finite number")]
    NonFiniteResult { op: char, left: f64, right: f64 },

    #[error(transparent)]
    Expression(#[from] ExpressionError),

    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("HTTP request returned error status {0}")]
    ErrorStatus(u16),
}

/// Results of a node's completed dependencies, keyed by dependency node id.
#[derive(Debug, Clone, Default)]
pub struct DependencyResults {
    results: HashMap<String, Value>,
}

impl DependencyResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node_id: impl Into<String>, result: Value) {
        self.results.insert(node_id.into(), result);
    }

    pub fn get(&self, node_id: &str) -> Option<&Value> {
        self.results.get(node_id)
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.results.contains_key(node_id)
    }

    /// Numeric view of a dependency's result.
    ///
    /// Numbers pass through, booleans map to 1/0 and numeric strings are
    /// parsed. Anything else is `None`.
    pub fn numeric(&self, node_id: &str) -> Option<f64> {
        match self.results.get(node_id)? {
            Value::Number(n) => n.as_f64(),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// JSON object view, used as the `deps` binding in expression contexts.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.results
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

impl FromIterator<(String, Value)> for DependencyResults {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            results: iter.into_iter().collect(),
        }
    }
}

/// The behavior bound to one or more node types.
///
/// Implementations must be safe to invoke concurrently for different nodes.
/// Uses RPITIT (native async fn in traits, no async_trait macro).
pub trait NodeExecutor: Send + Sync {
    /// Node type keys this executor handles.
    fn node_types(&self) -> &[&'static str];

    fn can_execute(&self, node_type: &str) -> bool {
        self.node_types().contains(&node_type)
    }

    fn execute(
        &self,
        node: &Node,
        deps: &DependencyResults,
    ) -> impl std::future::Future<Output = Result<Value, NodeError>> + Send;
}
