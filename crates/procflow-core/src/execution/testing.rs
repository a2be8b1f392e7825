//! Test doubles for exercising the run engine.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use procflow_types::graph::Node;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::node::{DependencyResults, NodeError, NodeExecutor};

/// Always fails (`test.fail`).
pub struct FailingExecutor;

impl NodeExecutor for FailingExecutor {
    fn node_types(&self) -> &[&'static str] {
        &["test.fail"]
    }

    async fn execute(&self, _node: &Node, _deps: &DependencyResults) -> Result<Value, NodeError> {
        Err(NodeError::Transport("induced failure".to_string()))
    }
}

/// Panics inside the node task (`test.panic`).
pub struct PanickingExecutor;

impl NodeExecutor for PanickingExecutor {
    fn node_types(&self) -> &[&'static str] {
        &["test.panic"]
    }

    async fn execute(&self, _node: &Node, _deps: &DependencyResults) -> Result<Value, NodeError> {
        panic!("induced panic")
    }
}

/// One-shot latch pair: the node signals `entered`, then blocks until
/// the test calls [`Gate::release`].
#[derive(Clone, Default)]
pub struct Gate {
    entered: CancellationToken,
    open: CancellationToken,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn wait_entered(&self) {
        self.entered.cancelled().await;
    }

    pub fn release(&self) {
        self.open.cancel();
    }
}

/// Blocks on a [`Gate`] (`test.gate`) and yields the node id.
pub struct GateExecutor {
    gate: Gate,
}

impl GateExecutor {
    pub fn new(gate: Gate) -> Self {
        Self { gate }
    }
}

impl NodeExecutor for GateExecutor {
    fn node_types(&self) -> &[&'static str] {
        &["test.gate"]
    }

    async fn execute(&self, node: &Node, _deps: &DependencyResults) -> Result<Value, NodeError> {
        self.gate.entered.cancel();
        self.gate.open.cancelled().await;
        Ok(json!(node.id))
    }
}

#[derive(Default)]
struct Tracking {
    events: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Records start/end events and peak concurrency (`test.track`).
///
/// The result is the sorted list of dependency ids the node received.
#[derive(Clone)]
pub struct TrackingExecutor {
    delay: Duration,
    inner: Arc<Tracking>,
}

impl TrackingExecutor {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            inner: Arc::default(),
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.inner.events.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }
}

impl NodeExecutor for TrackingExecutor {
    fn node_types(&self) -> &[&'static str] {
        &["test.track"]
    }

    async fn execute(&self, node: &Node, deps: &DependencyResults) -> Result<Value, NodeError> {
        self.inner.events.lock().unwrap().push(format!("start:{}", node.id));
        let now = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.inner.events.lock().unwrap().push(format!("end:{}", node.id));

        let mut seen: Vec<String> = deps
            .to_json()
            .as_object()
            .map(|o| o.keys().cloned().collect())
            .unwrap_or_default();
        seen.sort();
        Ok(json!(seen))
    }
}
