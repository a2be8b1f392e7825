//! `logging` node: emits its message through `tracing`.

use procflow_types::graph::Node;
use serde_json::{Value, json};

use super::{DependencyResults, NodeError, NodeExecutor};

const DEFAULT_MESSAGE: &str = "No message provided";

#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNodeExecutor;

impl NodeExecutor for LoggingNodeExecutor {
    fn node_types(&self) -> &[&'static str] {
        &["logging"]
    }

    async fn execute(&self, node: &Node, _deps: &DependencyResults) -> Result<Value, NodeError> {
        let message = node.property("message").unwrap_or(DEFAULT_MESSAGE);
        tracing::info!(node_id = node.id.as_str(), node_name = node.name.as_str(), "{message}");
        Ok(json!(format!("Logged message: {message}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_logs_message() {
        let node = Node::new("l", "Log", "logging").with_property("message", "hello");
        let result = LoggingNodeExecutor.execute(&node, &DependencyResults::new()).await.unwrap();
        assert_eq!(result, json!("Logged message: hello"));
    }

    #[tokio::test]
    async fn test_missing_message_uses_default() {
        let node = Node::new("l", "Log", "logging");
        let result = LoggingNodeExecutor.execute(&node, &DependencyResults::new()).await.unwrap();
        assert_eq!(result, json!("Logged message: No message provided"));
    }
}
