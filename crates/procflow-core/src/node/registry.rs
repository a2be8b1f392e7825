//! Operation registry: node type string -> executor.
//!
//! Read-mostly and safe for concurrent lookup from multiple runs. New node
//! types are added by registering an executor; the dispatch loop never
//! changes.

use std::sync::Arc;

use dashmap::DashMap;

use super::arithmetic::{ArithmeticNodeExecutor, ArithmeticOp};
use super::box_executor::BoxNodeExecutor;
use super::conditional::ConditionalNodeExecutor;
use super::expression::ExpressionEvaluator;
use super::http::{HttpClient, HttpNodeExecutor};
use super::logging::LoggingNodeExecutor;
use super::script::ScriptNodeExecutor;
use super::NodeExecutor;

#[derive(Debug, Default)]
pub struct OperationRegistry {
    executors: DashMap<String, BoxNodeExecutor>,
}

impl OperationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in node type.
    pub fn with_builtins(
        http_client: Arc<dyn HttpClient>,
        evaluator: Arc<dyn ExpressionEvaluator>,
    ) -> Self {
        let registry = Self::new();
        registry.register_executor(LoggingNodeExecutor);
        registry.register_executor(HttpNodeExecutor::new(http_client));
        registry.register_executor(ScriptNodeExecutor::new(Arc::clone(&evaluator)));
        registry.register_executor(ConditionalNodeExecutor::new(evaluator));
        for op in ArithmeticOp::ALL {
            registry.register_executor(ArithmeticNodeExecutor::new(op));
        }
        registry
    }

    /// Register an executor under an explicit type key.
    ///
    /// If the key is already registered, it is replaced.
    pub fn register<E: NodeExecutor + 'static>(&self, node_type: impl Into<String>, executor: E) {
        self.register_boxed(node_type, BoxNodeExecutor::new(executor));
    }

    pub fn register_boxed(&self, node_type: impl Into<String>, executor: BoxNodeExecutor) {
        let node_type = node_type.into();
        tracing::debug!(node_type = node_type.as_str(), "registering node executor");
        self.executors.insert(node_type, executor);
    }

    /// Register an executor under every type it declares.
    pub fn register_executor<E: NodeExecutor + 'static>(&self, executor: E) {
        let boxed = BoxNodeExecutor::new(executor);
        for node_type in boxed.node_types() {
            self.register_boxed(*node_type, boxed.clone());
        }
    }

    /// Look up the executor for a node type.
    ///
    /// Exact key match first, then any registered executor whose
    /// `can_execute` accepts the type.
    pub fn find(&self, node_type: &str) -> Option<BoxNodeExecutor> {
        if let Some(executor) = self.executors.get(node_type) {
            return Some(executor.value().clone());
        }
        self.executors
            .iter()
            .find(|entry| entry.value().can_execute(node_type))
            .map(|entry| entry.value().clone())
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.find(node_type).is_some()
    }

    /// Registered type names, sorted.
    pub fn list_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.executors.iter().map(|e| e.key().clone()).collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}
