//! Definition store trait and an in-memory implementation.
//!
//! The infrastructure layer (procflow-infra) implements [`DefinitionStore`]
//! with SQLite persistence.

use dashmap::DashMap;
use procflow_types::error::RepositoryError;
use procflow_types::graph::{GraphDefinition, GraphId};

/// Repository trait for graph definitions.
///
/// The stored value is the last accepted definition or, after a run, the
/// run's terminal state with per-node status and results.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait DefinitionStore: Send + Sync {
    /// Upsert a definition (insert or replace by ID).
    fn save(
        &self,
        def: &GraphDefinition,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Replace a definition that is already stored. Returns `false`, and
    /// stores nothing, when no definition exists under `def.id`.
    fn update(
        &self,
        def: &GraphDefinition,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    fn get(
        &self,
        id: &GraphId,
    ) -> impl std::future::Future<Output = Result<Option<GraphDefinition>, RepositoryError>> + Send;

    /// All definitions, ordered by id (creation order for UUID v7 ids).
    fn list(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<GraphDefinition>, RepositoryError>> + Send;

    /// Delete a definition by ID. Returns `true` if it existed.
    fn delete(
        &self,
        id: &GraphId,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;
}

/// Process-local store backed by a `DashMap`.
#[derive(Debug, Default)]
pub struct InMemoryDefinitionStore {
    graphs: DashMap<GraphId, GraphDefinition>,
}

impl InMemoryDefinitionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DefinitionStore for InMemoryDefinitionStore {
    async fn save(&self, def: &GraphDefinition) -> Result<(), RepositoryError> {
        self.graphs.insert(def.id, def.clone());
        Ok(())
    }

    async fn update(&self, def: &GraphDefinition) -> Result<bool, RepositoryError> {
        Ok(self
            .graphs
            .get_mut(&def.id)
            .map(|mut entry| *entry = def.clone())
            .is_some())
    }

    async fn get(&self, id: &GraphId) -> Result<Option<GraphDefinition>, RepositoryError> {
        Ok(self.graphs.get(id).map(|entry| {
            let mut def = entry.value().clone();
            def.build_node_index();
            def
        }))
    }

    async fn list(&self) -> Result<Vec<GraphDefinition>, RepositoryError> {
        let mut defs: Vec<GraphDefinition> = self.graphs.iter().map(|e| e.value().clone()).collect();
        defs.sort_by_key(|d| d.id);
        Ok(defs)
    }

    async fn delete(&self, id: &GraphId) -> Result<bool, RepositoryError> {
        Ok(self.graphs.remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use procflow_types::graph::Node;

    #[tokio::test]
    async fn test_save_get_list_delete() {
        let store = InMemoryDefinitionStore::new();
        let def = GraphDefinition::new("g")
            .with_node(Node::new("a", "A", "logging"))
            .with_root("a");

        store.save(&def).await.unwrap();
        let loaded = store.get(&def.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "g");
        assert!(loaded.node_by_id("a").is_some());
        assert_eq!(store.list().await.unwrap().len(), 1);

        assert!(store.delete(&def.id).await.unwrap());
        assert!(!store.delete(&def.id).await.unwrap());
        assert!(store.get(&def.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_replaces_existing() {
        let store = InMemoryDefinitionStore::new();
        let mut def = GraphDefinition::new("first");
        store.save(&def).await.unwrap();
        def.name = "second".to_string();
        store.save(&def).await.unwrap();
        assert_eq!(store.list().await.unwrap()[0].name, "second");
    }

    #[tokio::test]
    async fn test_update_skips_missing_definition() {
        let store = InMemoryDefinitionStore::new();
        let mut def = GraphDefinition::new("first");
        assert!(!store.update(&def).await.unwrap());
        assert!(store.list().await.unwrap().is_empty());

        store.save(&def).await.unwrap();
        def.name = "second".to_string();
        assert!(store.update(&def).await.unwrap());
        assert_eq!(store.get(&def.id).await.unwrap().unwrap().name, "second");
    }
}
