//! Graph definition management.
//!
//! Every definition accepted here is validated and leveled before it is
//! stored, so a stored graph is always runnable.

use std::sync::Arc;

use procflow_types::error::{RepositoryError, ValidationError};
use procflow_types::graph::{GraphDefinition, GraphId};

use crate::graph::validator::{compute_levels, ensure_valid, validate};
use crate::id::IdAllocator;
use crate::repository::definition::DefinitionStore;

#[derive(Debug, Clone, thiserror::Error)]
pub enum DefinitionError {
    #[error("invalid graph definition: {0}")]
    Invalid(#[from] ValidationError),

    #[error("graph not found: {0}")]
    NotFound(GraphId),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub struct DefinitionService<S: DefinitionStore> {
    store: Arc<S>,
    ids: Arc<dyn IdAllocator>,
}

impl<S: DefinitionStore> DefinitionService<S> {
    pub fn new(store: Arc<S>, ids: Arc<dyn IdAllocator>) -> Self {
        Self { store, ids }
    }

    /// Problems with `def`, without storing anything.
    pub fn validate(&self, def: &GraphDefinition) -> Vec<String> {
        validate(def)
    }

    /// Store a new definition under a freshly allocated id.
    ///
    /// Nodes without an id get one from the allocator. Run state carried in
    /// the input is discarded.
    pub async fn create(&self, mut def: GraphDefinition) -> Result<GraphDefinition, DefinitionError> {
        def.id = self.ids.graph_id();
        for node in def.nodes.iter_mut().filter(|n| n.id.is_empty()) {
            node.id = self.ids.node_id();
        }
        self.prepare(&mut def)?;
        self.store.save(&def).await?;
        tracing::info!(graph_id = %def.id, name = %def.name, nodes = def.nodes.len(), "graph created");
        Ok(def)
    }

    /// Replace an existing definition.
    pub async fn update(
        &self,
        id: GraphId,
        mut def: GraphDefinition,
    ) -> Result<GraphDefinition, DefinitionError> {
        def.id = id;
        self.prepare(&mut def)?;
        if !self.store.update(&def).await? {
            return Err(DefinitionError::NotFound(id));
        }
        tracing::info!(graph_id = %id, "graph updated");
        Ok(def)
    }

    pub async fn get(&self, id: GraphId) -> Result<GraphDefinition, DefinitionError> {
        self.store
            .get(&id)
            .await?
            .ok_or(DefinitionError::NotFound(id))
    }

    pub async fn list(&self) -> Result<Vec<GraphDefinition>, DefinitionError> {
        Ok(self.store.list().await?)
    }

    /// Returns `false` if nothing was stored under `id`.
    pub async fn delete(&self, id: GraphId) -> Result<bool, DefinitionError> {
        let removed = self.store.delete(&id).await?;
        if removed {
            tracing::info!(graph_id = %id, "graph deleted");
        }
        Ok(removed)
    }

    fn prepare(&self, def: &mut GraphDefinition) -> Result<(), ValidationError> {
        def.reset_run_state();
        def.build_node_index();
        ensure_valid(def)?;
        compute_levels(def)
    }
}
