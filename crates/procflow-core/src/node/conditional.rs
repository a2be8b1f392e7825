//! `conditional` node: evaluates `properties["condition"]` to a boolean.

use std::sync::Arc;

use procflow_types::graph::Node;
use serde_json::Value;

use super::expression::{ExpressionEvaluator, expression_context, is_truthy};
use super::{DependencyResults, NodeError, NodeExecutor};

pub struct ConditionalNodeExecutor {
    evaluator: Arc<dyn ExpressionEvaluator>,
}

impl ConditionalNodeExecutor {
    pub fn new(evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        Self { evaluator }
    }
}

impl NodeExecutor for ConditionalNodeExecutor {
    fn node_types(&self) -> &[&'static str] {
        &["conditional"]
    }

    async fn execute(&self, node: &Node, deps: &DependencyResults) -> Result<Value, NodeError> {
        let condition = node
            .property("condition")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(NodeError::EmptyProperty("condition"))?;

        let raw = self.evaluator.evaluate(condition, &expression_context(node, deps))?;
        Ok(Value::Bool(is_truthy(&raw)))
    }
}
