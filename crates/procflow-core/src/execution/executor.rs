//! Graph executor: level-synchronized concurrent execution of one run.
//!
//! Every run works on its own copy of the definition. Nodes of a level are
//! spawned onto a `tokio::JoinSet` and the executor waits for the whole set
//! (the barrier) before building the next level from the children of nodes
//! that completed. Cancellation is cooperative and checked between levels.
//!
//! # Execution flow
//!
//! 1. Reset node state and rebuild the node index.
//! 2. Seed the level queue with the root nodes (none: warn and finish).
//! 3. For each level: skip terminal nodes, fail nodes without an executor,
//!    spawn the rest with the results of their parents.
//! 4. Barrier: record every node's outcome.
//! 5. Enqueue children whose parents have all completed.

use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures_util::FutureExt;
use procflow_types::graph::{GraphDefinition, GraphId, NodeStatus};
use procflow_types::run::{GraphRun, RunStatus, RunSummary};
use serde_json::Value;
use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::graph::parent_map;
use crate::node::registry::OperationRegistry;
use crate::node::DependencyResults;

/// Live, run-scoped state.
struct RunState {
    graph: GraphDefinition,
    status: RunStatus,
}

struct ActiveRun {
    graph_id: GraphId,
    started_at: DateTime<Utc>,
    state: Arc<RwLock<RunState>>,
    cancel: CancellationToken,
}

/// Removes the live entry when a run ends, including when its future is dropped.
struct ActiveRunGuard<'a> {
    runs: &'a DashMap<Uuid, ActiveRun>,
    run_id: Uuid,
}

impl Drop for ActiveRunGuard<'_> {
    fn drop(&mut self) {
        self.runs.remove(&self.run_id);
    }
}

type NodeOutcome = (String, Result<Value, String>);

pub struct GraphExecutor {
    registry: Arc<OperationRegistry>,
    max_concurrent_nodes: Option<usize>,
    runs: DashMap<Uuid, ActiveRun>,
    runs_started: AtomicU64,
}

impl GraphExecutor {
    pub fn new(registry: Arc<OperationRegistry>) -> Self {
        Self {
            registry,
            max_concurrent_nodes: None,
            runs: DashMap::new(),
            runs_started: AtomicU64::new(0),
        }
    }

    /// Cap the number of node tasks executing at once within a run.
    pub fn with_max_concurrent_nodes(mut self, limit: Option<usize>) -> Self {
        self.max_concurrent_nodes = limit.map(|n| n.max(1));
        self
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    /// Number of runs ever started by this executor.
    pub fn runs_started(&self) -> u64 {
        self.runs_started.load(Ordering::SeqCst)
    }

    pub fn active_runs(&self) -> usize {
        self.runs.len()
    }

    /// Execute a definition as a new run with its own cancellation token.
    pub async fn run(&self, def: GraphDefinition) -> GraphRun {
        self.run_with(Uuid::now_v7(), def, CancellationToken::new()).await
    }

    /// Execute a definition under a caller-chosen run id and token.
    pub async fn run_with(
        &self,
        run_id: Uuid,
        graph: GraphDefinition,
        cancel: CancellationToken,
    ) -> GraphRun {
        self.run_reporting(run_id, graph, cancel, |_| {}).await
    }

    /// [`run_with`](Self::run_with), handing the terminal run to `on_finish`
    /// while the run is still listed as live. A caller that records the
    /// result there never observes a gap between "live" and "finished".
    pub async fn run_reporting<F>(
        &self,
        run_id: Uuid,
        mut graph: GraphDefinition,
        cancel: CancellationToken,
        on_finish: F,
    ) -> GraphRun
    where
        F: FnOnce(&GraphRun) + Send,
    {
        self.runs_started.fetch_add(1, Ordering::SeqCst);
        let started_at = Utc::now();
        let graph_id = graph.id;

        graph.reset_run_state();
        graph.build_node_index();
        let parents = parent_map(&graph);

        tracing::info!(
            run_id = %run_id,
            graph_id = %graph_id,
            graph = graph.name.as_str(),
            nodes = graph.nodes.len(),
            "starting graph run"
        );

        let state = Arc::new(RwLock::new(RunState {
            graph,
            status: RunStatus::Initializing,
        }));
        self.runs.insert(
            run_id,
            ActiveRun {
                graph_id,
                started_at,
                state: Arc::clone(&state),
                cancel: cancel.clone(),
            },
        );
        let _guard = ActiveRunGuard {
            runs: &self.runs,
            run_id,
        };

        let status = self.drive(run_id, &state, &parents, &cancel).await;

        let mut state = state.write().await;
        state.status = status;
        let summary = RunSummary::of(&state.graph);
        tracing::info!(
            run_id = %run_id,
            graph_id = %graph_id,
            status = %status,
            completed = summary.completed,
            failed = summary.failed,
            pending = summary.pending,
            "graph run finished"
        );

        let run = GraphRun {
            run_id,
            graph_id,
            status,
            started_at,
            finished_at: Some(Utc::now()),
            graph: state.graph.clone(),
        };
        on_finish(&run);
        run
    }

    /// Level loop. Returns the terminal run status.
    async fn drive(
        &self,
        run_id: Uuid,
        state: &RwLock<RunState>,
        parents: &HashMap<String, Vec<String>>,
        cancel: &CancellationToken,
    ) -> RunStatus {
        let roots: Vec<String> = {
            let mut state = state.write().await;
            state.status = RunStatus::Running;
            state.graph.root_nodes().iter().map(|n| n.id.clone()).collect()
        };

        if roots.is_empty() {
            tracing::warn!(run_id = %run_id, "graph has no resolvable root nodes, nothing to execute");
            return RunStatus::Completed;
        }

        let semaphore = self
            .max_concurrent_nodes
            .map(|limit| Arc::new(Semaphore::new(limit)));

        let mut queue: VecDeque<Vec<String>> = VecDeque::from([roots]);
        let mut level_idx = 0usize;

        while let Some(level) = queue.pop_front() {
            if cancel.is_cancelled() {
                tracing::info!(run_id = %run_id, level = level_idx, "run cancelled before level");
                return RunStatus::Cancelled;
            }

            tracing::debug!(run_id = %run_id, level = level_idx, nodes = level.len(), "processing level");

            let dispatched = self.dispatch_level(state, &level, parents, semaphore.as_ref()).await;
            let outcomes = Self::barrier(dispatched).await;

            let next = {
                let mut state = state.write().await;
                for (node_id, outcome) in outcomes {
                    let Some(node) = state.graph.node_by_id_mut(&node_id) else {
                        continue;
                    };
                    match outcome {
                        Ok(value) => node.complete(value),
                        Err(error) => {
                            tracing::warn!(
                                run_id = %run_id,
                                node_id = node_id.as_str(),
                                error = error.as_str(),
                                "node failed"
                            );
                            node.fail(error);
                        }
                    }
                }
                // A task that never reported back must not stay RUNNING.
                for node_id in &level {
                    if let Some(node) = state.graph.node_by_id_mut(node_id) {
                        if node.status == NodeStatus::Running {
                            node.fail("node task did not complete");
                        }
                    }
                }
                Self::next_level(&state.graph, &level, parents)
            };

            if !next.is_empty() {
                queue.push_back(next);
            }
            level_idx += 1;
        }

        RunStatus::Completed
    }

    /// Spawn every runnable node of a level.
    async fn dispatch_level(
        &self,
        state: &RwLock<RunState>,
        level: &[String],
        parents: &HashMap<String, Vec<String>>,
        semaphore: Option<&Arc<Semaphore>>,
    ) -> JoinSet<NodeOutcome> {
        let mut join_set = JoinSet::new();
        let mut state = state.write().await;

        for node_id in level {
            let Some(node) = state.graph.node_by_id(node_id) else {
                continue;
            };
            if node.status.is_terminal() {
                tracing::debug!(node_id = node_id.as_str(), "skipping finished node");
                continue;
            }

            let Some(executor) = self.registry.find(&node.node_type) else {
                tracing::warn!(
                    node_id = node_id.as_str(),
                    node_type = node.node_type.as_str(),
                    "no executor registered for node type"
                );
                let message = format!("No executor registered for node type '{}'", node.node_type);
                if let Some(node) = state.graph.node_by_id_mut(node_id) {
                    node.fail(message);
                }
                continue;
            };

            let deps: DependencyResults = parents
                .get(node_id)
                .into_iter()
                .flatten()
                .filter_map(|parent_id| {
                    let parent = state.graph.node_by_id(parent_id)?;
                    let result = parent.result.clone()?;
                    (parent.status == NodeStatus::Completed).then(|| (parent_id.clone(), result))
                })
                .collect();

            let Some(node) = state.graph.node_by_id_mut(node_id) else {
                continue;
            };
            node.status = NodeStatus::Running;
            let snapshot = node.clone();
            let semaphore = semaphore.cloned();

            join_set.spawn(async move {
                let _permit = match semaphore {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };
                let outcome = AssertUnwindSafe(executor.execute(&snapshot, &deps))
                    .catch_unwind()
                    .await;
                let outcome = match outcome {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(error)) => Err(error.to_string()),
                    Err(_panic) => Err(format!("executor for '{}' panicked", snapshot.node_type)),
                };
                (snapshot.id, outcome)
            });
        }

        join_set
    }

    /// Wait for every task of the level.
    async fn barrier(mut join_set: JoinSet<NodeOutcome>) -> Vec<NodeOutcome> {
        let mut outcomes = Vec::with_capacity(join_set.len());
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => tracing::error!(error = %e, "node task join error"),
            }
        }
        outcomes
    }

    /// Children of completed nodes whose parents have all completed, in
    /// level order without duplicates.
    fn next_level(
        graph: &GraphDefinition,
        level: &[String],
        parents: &HashMap<String, Vec<String>>,
    ) -> Vec<String> {
        let completed = |id: &str| {
            graph
                .node_by_id(id)
                .is_some_and(|n| n.status == NodeStatus::Completed)
        };

        let mut seen = HashSet::new();
        let mut next = Vec::new();
        for node_id in level {
            let Some(node) = graph.node_by_id(node_id) else {
                continue;
            };
            if node.status != NodeStatus::Completed {
                continue;
            }
            for child_id in &node.child_node_ids {
                let ready = graph
                    .node_by_id(child_id)
                    .is_some_and(|c| c.status == NodeStatus::Pending)
                    && parents
                        .get(child_id)
                        .is_none_or(|ps| ps.iter().all(|p| completed(p)));
                if ready && seen.insert(child_id.as_str()) {
                    next.push(child_id.clone());
                }
            }
        }
        next
    }

    /// Snapshot of an in-flight run, or `None` once it has finished.
    pub async fn status(&self, run_id: &Uuid) -> Option<GraphRun> {
        let (graph_id, started_at, state) = {
            let run = self.runs.get(run_id)?;
            (run.graph_id, run.started_at, Arc::clone(&run.state))
        };
        let state = state.read().await;
        Some(GraphRun {
            run_id: *run_id,
            graph_id,
            status: state.status,
            started_at,
            finished_at: None,
            graph: state.graph.clone(),
        })
    }

    /// Request cancellation of an in-flight run. Returns `false` if unknown.
    pub fn cancel(&self, run_id: &Uuid) -> bool {
        match self.runs.get(run_id) {
            Some(run) => {
                run.cancel.cancel();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::testing::{
        FailingExecutor, Gate, GateExecutor, PanickingExecutor, TrackingExecutor,
    };
    use crate::graph::builder::ArithmeticGraphBuilder;
    use crate::node::arithmetic::{ArithmeticNodeExecutor, ArithmeticOp};
    use crate::node::logging::LoggingNodeExecutor;
    use procflow_types::graph::Node;
    use serde_json::json;
    use std::time::Duration;

    fn arithmetic_registry() -> Arc<OperationRegistry> {
        let registry = OperationRegistry::new();
        registry.register_executor(LoggingNodeExecutor);
        for op in ArithmeticOp::ALL {
            registry.register_executor(ArithmeticNodeExecutor::new(op));
        }
        Arc::new(registry)
    }

    fn status_of(run: &GraphRun, id: &str) -> NodeStatus {
        run.graph.node_by_id(id).unwrap().status
    }

    #[tokio::test]
    async fn test_arithmetic_example_evaluates_to_240() {
        let executor = GraphExecutor::new(arithmetic_registry());
        let graph = ArithmeticGraphBuilder::example().unwrap();
        let run = executor.run(graph).await;

        assert_eq!(run.status, RunStatus::Completed);
        assert!(run.summary().all_completed(), "{:?}", run.summary());
        let result = run.graph.node_by_id("div1").unwrap().result.clone().unwrap();
        assert_eq!(result.as_f64(), Some(240.0));
        assert_eq!(run.graph.node_by_id("add2").unwrap().result, Some(json!(39.0)));
        assert_eq!(run.graph.node_by_id("add3").unwrap().result, Some(json!(48.0)));
    }

    #[tokio::test]
    async fn test_run_reporting_sees_terminal_run_while_still_live() {
        let executor = GraphExecutor::new(arithmetic_registry());
        let graph = ArithmeticGraphBuilder::example().unwrap();
        let mut seen = None;
        let run = executor
            .run_reporting(Uuid::now_v7(), graph, CancellationToken::new(), |run| {
                seen = Some((run.status, executor.active_runs()));
            })
            .await;

        assert_eq!(seen, Some((RunStatus::Completed, 1)));
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(executor.active_runs(), 0);
    }

    #[tokio::test]
    async fn test_division_by_zero_fails_node_not_run() {
        let executor = GraphExecutor::new(arithmetic_registry());
        let graph = GraphDefinition::new("div0")
            .with_node(
                Node::new("d", "Divide", "math.division")
                    .with_property("leftOperand", "1")
                    .with_property("rightOperand", "0")
                    .with_child("after"),
            )
            .with_node(Node::new("after", "After", "logging"))
            .with_root("d");

        let run = executor.run(graph).await;
        assert_eq!(run.status, RunStatus::Completed);
        let d = run.graph.node_by_id("d").unwrap();
        assert_eq!(d.status, NodeStatus::Failed);
        assert_eq!(d.error.as_deref(), Some("Division by zero"));
        assert_eq!(status_of(&run, "after"), NodeStatus::Pending);
    }

    #[tokio::test]
    async fn test_failed_branch_isolated_from_independent_branch() {
        let registry = arithmetic_registry();
        registry.register_executor(FailingExecutor);
        let executor = GraphExecutor::new(registry);

        let graph = GraphDefinition::new("isolation")
            .with_node(Node::new("a", "A", "test.fail").with_child("b"))
            .with_node(Node::new("b", "B", "logging"))
            .with_node(Node::new("c", "C", "logging"))
            .with_root("a")
            .with_root("c");

        let run = executor.run(graph).await;
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(status_of(&run, "a"), NodeStatus::Failed);
        assert_eq!(status_of(&run, "b"), NodeStatus::Pending);
        assert_eq!(status_of(&run, "c"), NodeStatus::Completed);
    }

    #[tokio::test]
    async fn test_unregistered_type_fails_node_and_run_continues() {
        let executor = GraphExecutor::new(arithmetic_registry());
        let graph = GraphDefinition::new("unknown")
            .with_node(Node::new("x", "X", "sql.query"))
            .with_node(Node::new("y", "Y", "logging"))
            .with_root("x")
            .with_root("y");

        let run = executor.run(graph).await;
        let x = run.graph.node_by_id("x").unwrap();
        assert_eq!(x.status, NodeStatus::Failed);
        assert!(x.error.as_deref().unwrap().contains("sql.query"));
        assert_eq!(status_of(&run, "y"), NodeStatus::Completed);
    }

    #[tokio::test]
    async fn test_no_roots_returns_unchanged() {
        let executor = GraphExecutor::new(arithmetic_registry());
        let graph = GraphDefinition::new("rootless").with_node(Node::new("a", "A", "logging"));
        let run = executor.run(graph).await;
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(status_of(&run, "a"), NodeStatus::Pending);
        assert_eq!(executor.active_runs(), 0);
    }

    #[tokio::test]
    async fn test_join_waits_for_all_parents() {
        // a -> c, b -> x -> c: c must not start until x (level 1) completed.
        let tracking = TrackingExecutor::new(Duration::from_millis(10));
        let registry = OperationRegistry::new();
        registry.register_executor(tracking.clone());
        let executor = GraphExecutor::new(Arc::new(registry));

        let graph = GraphDefinition::new("join")
            .with_node(Node::new("a", "A", "test.track").with_child("c"))
            .with_node(Node::new("b", "B", "test.track").with_child("x"))
            .with_node(Node::new("x", "X", "test.track").with_child("c"))
            .with_node(Node::new("c", "C", "test.track"))
            .with_root("a")
            .with_root("b");

        let run = executor.run(graph).await;
        assert!(run.summary().all_completed());

        let events = tracking.events();
        let pos = |e: &str| events.iter().position(|x| x == e).unwrap();
        assert!(pos("start:c") > pos("end:x"));
        assert!(pos("start:x") > pos("end:a"), "barrier: level 1 starts after level 0 ends");
        assert_eq!(events.iter().filter(|e| *e == "start:c").count(), 1);

        // c sees both parents' results.
        let c_result = run.graph.node_by_id("c").unwrap().result.clone().unwrap();
        assert_eq!(c_result, json!(["a", "x"]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_level_nodes_run_concurrently() {
        let tracking = TrackingExecutor::new(Duration::from_millis(50));
        let registry = OperationRegistry::new();
        registry.register_executor(tracking.clone());
        let executor = GraphExecutor::new(Arc::new(registry));

        let mut graph = GraphDefinition::new("wide");
        for i in 0..4 {
            let id = format!("n{i}");
            graph = graph.with_node(Node::new(&id, &id, "test.track")).with_root(id);
        }

        executor.run(graph).await;
        assert_eq!(tracking.max_in_flight(), 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_limit_respected() {
        let tracking = TrackingExecutor::new(Duration::from_millis(30));
        let registry = OperationRegistry::new();
        registry.register_executor(tracking.clone());
        let executor = GraphExecutor::new(Arc::new(registry)).with_max_concurrent_nodes(Some(2));

        let mut graph = GraphDefinition::new("wide");
        for i in 0..6 {
            let id = format!("n{i}");
            graph = graph.with_node(Node::new(&id, &id, "test.track")).with_root(id);
        }

        let run = executor.run(graph).await;
        assert!(run.summary().all_completed());
        assert!(tracking.max_in_flight() <= 2);
    }

    #[tokio::test]
    async fn test_cancel_stops_before_next_level() {
        let gate = Gate::new();
        let registry = arithmetic_registry();
        registry.register_executor(GateExecutor::new(gate.clone()));
        let executor = Arc::new(GraphExecutor::new(registry));

        let graph = GraphDefinition::new("cancel")
            .with_node(Node::new("slow", "Slow", "test.gate").with_child("next"))
            .with_node(Node::new("next", "Next", "logging"))
            .with_root("slow");

        let run_id = Uuid::now_v7();
        let task = {
            let executor = Arc::clone(&executor);
            tokio::spawn(async move { executor.run_with(run_id, graph, CancellationToken::new()).await })
        };

        gate.wait_entered().await;
        let live = executor.status(&run_id).await.unwrap();
        assert_eq!(live.status, RunStatus::Running);
        assert_eq!(live.graph.node_by_id("slow").unwrap().status, NodeStatus::Running);

        assert!(executor.cancel(&run_id));
        gate.release();

        let run = task.await.unwrap();
        assert_eq!(run.status, RunStatus::Cancelled);
        assert_eq!(status_of(&run, "slow"), NodeStatus::Completed);
        assert_eq!(status_of(&run, "next"), NodeStatus::Pending);
        assert!(executor.status(&run_id).await.is_none());
        assert!(!executor.cancel(&run_id));
    }

    #[tokio::test]
    async fn test_each_run_gets_fresh_state() {
        let executor = GraphExecutor::new(arithmetic_registry());
        let mut graph = GraphDefinition::new("stale")
            .with_node(Node::new("a", "A", "logging"))
            .with_root("a");
        graph.nodes[0].fail("from an earlier run");

        let run = executor.run(graph.clone()).await;
        assert_eq!(status_of(&run, "a"), NodeStatus::Completed);
        // The caller's definition is untouched.
        assert_eq!(graph.nodes[0].status, NodeStatus::Failed);
        assert_eq!(executor.runs_started(), 1);
    }

    #[tokio::test]
    async fn test_panicking_executor_marks_node_failed() {
        let registry = arithmetic_registry();
        registry.register_executor(PanickingExecutor);
        let executor = GraphExecutor::new(registry);
        let graph = GraphDefinition::new("panic")
            .with_node(Node::new("p", "P", "test.panic").with_child("q"))
            .with_node(Node::new("q", "Q", "logging"))
            .with_root("p");

        let run = executor.run(graph).await;
        let p = run.graph.node_by_id("p").unwrap();
        assert_eq!(p.status, NodeStatus::Failed);
        assert!(p.error.as_deref().unwrap().contains("panicked"));
        assert_eq!(status_of(&run, "q"), NodeStatus::Pending);
    }
}
