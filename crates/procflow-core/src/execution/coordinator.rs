//! Run coordinator: one in-flight run per graph id.
//!
//! `execute` joins an existing run for the same graph instead of starting a
//! second one. Each run is a spawned task wrapped in a shared future, so any
//! number of callers can await the same terminal state. On completion the
//! task writes the terminal graph back through the [`DefinitionStore`] and
//! removes its handle. The write is skipped when the graph was deleted or
//! edited while it ran.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use procflow_types::error::{RepositoryError, ValidationError};
use procflow_types::graph::{GraphDefinition, GraphId};
use procflow_types::run::{GraphRun, RunStatus};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::executor::GraphExecutor;
use crate::graph::same_structure;
use crate::graph::validator::{compute_levels, ensure_valid};
use crate::repository::definition::DefinitionStore;

#[derive(Debug, Clone, thiserror::Error)]
pub enum RunError {
    #[error("graph not found: {0}")]
    NotFound(GraphId),

    #[error("stored graph is invalid: {0}")]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("run task aborted: {0}")]
    Aborted(String),
}

type RunCompletion = Shared<BoxFuture<'static, Result<GraphRun, RunError>>>;

/// Handle to an in-flight run. Clones share the same run.
#[derive(Clone)]
pub struct RunHandle {
    pub graph_id: GraphId,
    pub run_id: Uuid,
    cancel: CancellationToken,
    settled: Arc<OnceLock<GraphRun>>,
    completion: RunCompletion,
}

impl RunHandle {
    /// Wait for the run's terminal state.
    pub async fn wait(&self) -> Result<GraphRun, RunError> {
        self.completion.clone().await
    }

    pub fn is_finished(&self) -> bool {
        self.completion.peek().is_some()
    }

    /// The terminal run, once the executor has finished with it. Set before
    /// the run is written back, so it is visible while that write is pending.
    pub fn settled(&self) -> Option<&GraphRun> {
        self.settled.get()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait up to `limit` for the terminal state. `None` returns at once.
    ///
    /// A wait that times out leaves the run going.
    pub async fn wait_for(&self, limit: Option<Duration>) -> Result<Submission, RunError> {
        let Some(limit) = limit else {
            return Ok(Submission::Started(self.clone()));
        };
        match tokio::time::timeout(limit, self.wait()).await {
            Ok(result) => Ok(Submission::Finished(result?)),
            Err(_elapsed) => {
                tracing::info!(graph_id = %self.graph_id, run_id = %self.run_id, "wait timed out, run continues");
                Ok(Submission::TimedOut(self.clone()))
            }
        }
    }
}

impl std::fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunHandle")
            .field("graph_id", &self.graph_id)
            .field("run_id", &self.run_id)
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Outcome of [`ExecutionService::submit`].
#[derive(Debug)]
pub enum Submission {
    /// The caller did not wait.
    Started(RunHandle),
    Finished(GraphRun),
    /// The wait elapsed. The run keeps going.
    TimedOut(RunHandle),
}

/// Current state of a graph: live if a run is in flight, otherwise the last
/// stored definition.
#[derive(Debug, Clone)]
pub struct GraphStatus {
    pub graph: GraphDefinition,
    pub running: bool,
    pub run_id: Option<Uuid>,
    pub run_status: Option<RunStatus>,
}

pub struct ExecutionService<S: DefinitionStore> {
    store: Arc<S>,
    executor: Arc<GraphExecutor>,
    runs: Arc<DashMap<GraphId, RunHandle>>,
}

impl<S: DefinitionStore + 'static> ExecutionService<S> {
    pub fn new(store: Arc<S>, executor: Arc<GraphExecutor>) -> Self {
        Self {
            store,
            executor,
            runs: Arc::new(DashMap::new()),
        }
    }

    pub fn executor(&self) -> &GraphExecutor {
        &self.executor
    }

    /// Start a run of `graph_id`, or join the one already in flight.
    pub async fn execute(&self, graph_id: GraphId) -> Result<RunHandle, RunError> {
        if let Some(handle) = self.runs.get(&graph_id) {
            tracing::debug!(graph_id = %graph_id, run_id = %handle.run_id, "joining in-flight run");
            return Ok(handle.clone());
        }

        let mut def = self
            .store
            .get(&graph_id)
            .await?
            .ok_or(RunError::NotFound(graph_id))?;
        if def.nodes.iter().any(|n| n.level.is_none()) {
            ensure_valid(&def)?;
            compute_levels(&mut def)?;
        }

        // Insert-if-absent: a concurrent caller may have won the race.
        let handle = match self.runs.entry(graph_id) {
            Entry::Occupied(existing) => existing.get().clone(),
            Entry::Vacant(slot) => {
                let handle = self.spawn_run(graph_id, def);
                slot.insert(handle.clone());
                handle
            }
        };
        Ok(handle)
    }

    fn spawn_run(&self, graph_id: GraphId, def: GraphDefinition) -> RunHandle {
        let run_id = Uuid::now_v7();
        let cancel = CancellationToken::new();
        let settled = Arc::new(OnceLock::new());

        let executor = Arc::clone(&self.executor);
        let store = Arc::clone(&self.store);
        let runs = Arc::clone(&self.runs);
        let token = cancel.clone();
        let slot = Arc::clone(&settled);

        let task = tokio::spawn(async move {
            let run = executor
                .run_reporting(run_id, def, token, |run| {
                    let _ = slot.set(run.clone());
                })
                .await;
            write_back(store.as_ref(), &run).await;
            runs.remove_if(&graph_id, |_, handle| handle.run_id == run_id);
            run
        });

        let completion = async move {
            task.await.map_err(|e| RunError::Aborted(e.to_string()))
        }
        .boxed()
        .shared();

        RunHandle {
            graph_id,
            run_id,
            cancel,
            settled,
            completion,
        }
    }

    /// Execute and optionally wait for the terminal state.
    ///
    /// A wait that times out leaves the run going.
    pub async fn submit(
        &self,
        graph_id: GraphId,
        wait: Option<Duration>,
    ) -> Result<Submission, RunError> {
        self.execute(graph_id).await?.wait_for(wait).await
    }

    /// Live state of an in-flight run, else the last stored state.
    ///
    /// A run whose executor has finished but whose result is still being
    /// written back is reported from its terminal state.
    pub async fn status(&self, graph_id: GraphId) -> Result<GraphStatus, RunError> {
        let handle = self.runs.get(&graph_id).map(|h| h.clone());
        if let Some(handle) = &handle {
            if let Some(live) = self.executor.status(&handle.run_id).await {
                return Ok(GraphStatus {
                    graph: live.graph,
                    running: true,
                    run_id: Some(handle.run_id),
                    run_status: Some(live.status),
                });
            }
            if let Some(run) = handle.settled() {
                return Ok(GraphStatus {
                    graph: run.graph.clone(),
                    running: false,
                    run_id: Some(run.run_id),
                    run_status: Some(run.status),
                });
            }
        }

        let graph = self
            .store
            .get(&graph_id)
            .await?
            .ok_or(RunError::NotFound(graph_id))?;
        // Accepted but not yet picked up by the executor.
        let pending = handle.filter(|h| !h.is_finished());
        Ok(GraphStatus {
            graph,
            running: pending.is_some(),
            run_id: pending.as_ref().map(|h| h.run_id),
            run_status: pending.map(|_| RunStatus::Initializing),
        })
    }

    /// Signal cancellation. Returns `false` if no run is in flight.
    pub fn stop(&self, graph_id: GraphId) -> bool {
        match self.runs.get(&graph_id) {
            Some(handle) => {
                tracing::info!(graph_id = %graph_id, run_id = %handle.run_id, "stop requested");
                handle.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, graph_id: GraphId) -> bool {
        self.runs.contains_key(&graph_id)
    }

    /// Registered node type names, sorted.
    pub fn node_types(&self) -> Vec<String> {
        self.executor.registry().list_types()
    }
}

/// Store the terminal graph over the definition it ran from. Nothing is
/// written when that definition was deleted or replaced during the run.
async fn write_back<S: DefinitionStore>(store: &S, run: &GraphRun) {
    let graph_id = run.graph_id;
    let outcome = match store.get(&graph_id).await {
        Ok(Some(current)) if same_structure(&current, &run.graph) => store.update(&run.graph).await,
        Ok(Some(_)) => {
            tracing::info!(graph_id = %graph_id, run_id = %run.run_id, "graph changed during run, result not stored");
            return;
        }
        Ok(None) => Ok(false),
        Err(e) => Err(e),
    };
    match outcome {
        Ok(true) => tracing::debug!(graph_id = %graph_id, run_id = %run.run_id, "run result stored"),
        Ok(false) => {
            tracing::info!(graph_id = %graph_id, run_id = %run.run_id, "graph deleted during run, result not stored")
        }
        Err(e) => {
            tracing::error!(graph_id = %graph_id, run_id = %run.run_id, error = %e, "failed to persist run result")
        }
    }
}
