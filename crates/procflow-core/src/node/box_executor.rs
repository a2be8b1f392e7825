//! BoxNodeExecutor -- object-safe dynamic dispatch wrapper for NodeExecutor.
//!
//! 1. Define an object-safe `NodeExecutorDyn` trait with boxed futures
//! 2. Blanket-impl `NodeExecutorDyn` for all `T: NodeExecutor`
//! 3. `BoxNodeExecutor` wraps `Arc<dyn NodeExecutorDyn>` and delegates
//!
//! The wrapper is `Arc`-backed so the graph executor can clone it into the
//! task spawned for each node.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use procflow_types::graph::Node;
use serde_json::Value;

use super::{DependencyResults, NodeError, NodeExecutor};

/// Object-safe version of [`NodeExecutor`] with boxed futures.
pub trait NodeExecutorDyn: Send + Sync {
    fn node_types(&self) -> &[&'static str];

    fn can_execute(&self, node_type: &str) -> bool;

    fn execute_boxed<'a>(
        &'a self,
        node: &'a Node,
        deps: &'a DependencyResults,
    ) -> Pin<Box<dyn Future<Output = Result<Value, NodeError>> + Send + 'a>>;
}

impl<T: NodeExecutor> NodeExecutorDyn for T {
    fn node_types(&self) -> &[&'static str] {
        NodeExecutor::node_types(self)
    }

    fn can_execute(&self, node_type: &str) -> bool {
        NodeExecutor::can_execute(self, node_type)
    }

    fn execute_boxed<'a>(
        &'a self,
        node: &'a Node,
        deps: &'a DependencyResults,
    ) -> Pin<Box<dyn Future<Output = Result<Value, NodeError>> + Send + 'a>> {
        Box::pin(self.execute(node, deps))
    }
}

/// Type-erased node executor, cheap to clone.
#[derive(Clone)]
pub struct BoxNodeExecutor {
    inner: Arc<dyn NodeExecutorDyn>,
}

impl BoxNodeExecutor {
    pub fn new<T: NodeExecutor + 'static>(executor: T) -> Self {
        Self {
            inner: Arc::new(executor),
        }
    }

    pub fn node_types(&self) -> &[&'static str] {
        self.inner.node_types()
    }

    pub fn can_execute(&self, node_type: &str) -> bool {
        self.inner.can_execute(node_type)
    }

    pub async fn execute(
        &self,
        node: &Node,
        deps: &DependencyResults,
    ) -> Result<Value, NodeError> {
        self.inner.execute_boxed(node, deps).await
    }
}

impl std::fmt::Debug for BoxNodeExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxNodeExecutor")
            .field("node_types", &self.node_types())
            .finish()
    }
}
