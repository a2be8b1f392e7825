//! `script` node: evaluates `properties["script"]` and yields the value.

use std::sync::Arc;

use procflow_types::graph::Node;
use serde_json::Value;

use super::expression::{ExpressionEvaluator, expression_context};
use super::{DependencyResults, NodeError, NodeExecutor};

pub struct ScriptNodeExecutor {
    evaluator: Arc<dyn ExpressionEvaluator>,
}

impl ScriptNodeExecutor {
    pub fn new(evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        Self { evaluator }
    }
}

impl NodeExecutor for ScriptNodeExecutor {
    fn node_types(&self) -> &[&'static str] {
        &["script"]
    }

    async fn execute(&self, node: &Node, deps: &DependencyResults) -> Result<Value, NodeError> {
        let script = node
            .property("script")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(NodeError::EmptyProperty("script"))?;

        let context = expression_context(node, deps);
        let value = self.evaluator.evaluate(script, &context)?;
        tracing::debug!(node_id = node.id.as_str(), %value, "script evaluated");
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::expression::JexlEvaluator;
    use serde_json::json;

    fn executor() -> ScriptNodeExecutor {
        ScriptNodeExecutor::new(Arc::new(JexlEvaluator::new()))
    }

    #[tokio::test]
    async fn test_script_reads_dependency_results() {
        let node = Node::new("s", "Script", "script").with_property("script", "deps.up * 2");
        let mut deps = DependencyResults::new();
        deps.insert("up", json!(21.0));
        let value = executor().execute(&node, &deps).await.unwrap();
        assert_eq!(value.as_f64(), Some(42.0));
    }

    #[tokio::test]
    async fn test_empty_script_fails() {
        let node = Node::new("s", "Script", "script").with_property("script", "   ");
        let err = executor().execute(&node, &DependencyResults::new()).await.unwrap_err();
        assert!(matches!(err, NodeError::EmptyProperty("script")));

        let node = Node::new("s", "Script", "script");
        assert!(executor().execute(&node, &DependencyResults::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_evaluation_error_fails() {
        let node = Node::new("s", "Script", "script").with_property("script", "1 +");
        let err = executor().execute(&node, &DependencyResults::new()).await.unwrap_err();
        assert!(matches!(err, NodeError::Expression(_)));
    }
}
