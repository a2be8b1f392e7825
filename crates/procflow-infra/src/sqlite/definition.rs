//! SQLite graph definition store.
//!
//! Definitions are stored as JSON documents. `name` and `description` are
//! mirrored into columns for listing; `created_at` survives every upsert.

use chrono::Utc;
use procflow_core::repository::definition::DefinitionStore;
use procflow_types::error::RepositoryError;
use procflow_types::graph::{GraphDefinition, GraphId};
use sqlx::Row;

use super::pool::DatabasePool;

pub struct SqliteDefinitionStore {
    pool: DatabasePool,
}

impl SqliteDefinitionStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

struct GraphRow {
    id: String,
    definition: String,
}

impl GraphRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            definition: row.try_get("definition")?,
        })
    }

    fn into_definition(self) -> Result<GraphDefinition, RepositoryError> {
        let mut def: GraphDefinition = serde_json::from_str(&self.definition).map_err(|e| {
            RepositoryError::Serialization(format!("invalid definition JSON for {}: {e}", self.id))
        })?;
        def.build_node_index();
        Ok(def)
    }
}

fn query_error(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

// ---------------------------------------------------------------------------
// DefinitionStore impl
// ---------------------------------------------------------------------------

impl DefinitionStore for SqliteDefinitionStore {
    async fn save(&self, def: &GraphDefinition) -> Result<(), RepositoryError> {
        let json = serde_json::to_string(def)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"INSERT INTO graphs (id, name, description, definition, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 description = excluded.description,
                 definition = excluded.definition,
                 updated_at = excluded.updated_at"#,
        )
        .bind(def.id.to_string())
        .bind(&def.name)
        .bind(&def.description)
        .bind(&json)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        tracing::debug!(graph_id = %def.id, "graph saved");
        Ok(())
    }

    async fn update(&self, def: &GraphDefinition) -> Result<bool, RepositoryError> {
        let json = serde_json::to_string(def)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

        let result = sqlx::query(
            "UPDATE graphs SET name = ?, description = ?, definition = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&def.name)
        .bind(&def.description)
        .bind(&json)
        .bind(Utc::now().to_rfc3339())
        .bind(def.id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn get(&self, id: &GraphId) -> Result<Option<GraphDefinition>, RepositoryError> {
        let row = sqlx::query("SELECT id, definition FROM graphs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        match row {
            Some(row) => {
                let r = GraphRow::from_row(&row).map_err(query_error)?;
                Ok(Some(r.into_definition()?))
            }
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<GraphDefinition>, RepositoryError> {
        let rows = sqlx::query("SELECT id, definition FROM graphs ORDER BY id ASC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;

        let mut defs = Vec::with_capacity(rows.len());
        for row in &rows {
            let r = GraphRow::from_row(row).map_err(query_error)?;
            defs.push(r.into_definition()?);
        }
        Ok(defs)
    }

    async fn delete(&self, id: &GraphId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM graphs WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use procflow_types::graph::{Node, NodeStatus};
    use serde_json::json;
    use sqlx::Row;

    async fn test_store() -> (SqliteDefinitionStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let pool = DatabasePool::open(dir.path(), "test.db").await.unwrap();
        (SqliteDefinitionStore::new(pool), dir)
    }

    async fn created_at(store: &SqliteDefinitionStore, id: &GraphId) -> Option<DateTime<Utc>> {
        let row = sqlx::query("SELECT created_at FROM graphs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&store.pool.reader)
            .await
            .unwrap()?;
        let raw: String = row.get("created_at");
        Some(DateTime::parse_from_rfc3339(&raw).unwrap().with_timezone(&Utc))
    }

    fn sample() -> GraphDefinition {
        GraphDefinition::new("sum")
            .with_description("adds two numbers")
            .with_node(
                Node::new("add1", "Add", "math.addition")
                    .with_property("leftOperand", "2")
                    .with_property("rightOperand", "3"),
            )
            .with_root("add1")
    }

    #[tokio::test]
    async fn test_save_and_get_round_trip() {
        let (store, _dir) = test_store().await;
        let def = sample();
        store.save(&def).await.unwrap();

        let loaded = store.get(&def.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, def.id);
        assert_eq!(loaded.description.as_deref(), Some("adds two numbers"));
        assert_eq!(loaded.nodes, def.nodes);
        assert!(loaded.node_by_id("add1").is_some());
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let (store, _dir) = test_store().await;
        assert!(store.get(&GraphId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_keeps_created_at_and_stores_run_state() {
        let (store, _dir) = test_store().await;
        let mut def = sample();
        store.save(&def).await.unwrap();
        let created = created_at(&store, &def.id).await.unwrap();

        def.node_by_id_mut("add1").unwrap().complete(json!(5.0));
        store.save(&def).await.unwrap();

        assert_eq!(created_at(&store, &def.id).await, Some(created));
        let loaded = store.get(&def.id).await.unwrap().unwrap();
        let node = loaded.node_by_id("add1").unwrap();
        assert_eq!(node.status, NodeStatus::Completed);
        assert_eq!(node.result, Some(json!(5.0)));
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_only_touches_existing_rows() {
        let (store, _dir) = test_store().await;
        let mut def = sample();
        assert!(!store.update(&def).await.unwrap());
        assert!(store.get(&def.id).await.unwrap().is_none());

        store.save(&def).await.unwrap();
        let created = created_at(&store, &def.id).await.unwrap();
        def.name = "renamed".to_string();
        assert!(store.update(&def).await.unwrap());
        assert_eq!(store.get(&def.id).await.unwrap().unwrap().name, "renamed");
        assert_eq!(created_at(&store, &def.id).await, Some(created));

        store.delete(&def.id).await.unwrap();
        assert!(!store.update(&def).await.unwrap());
        assert!(store.get(&def.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_orders_by_id() {
        let (store, _dir) = test_store().await;
        let mut first = sample();
        first.id = GraphId::from_uuid(uuid::Uuid::from_u128(1));
        let mut second = sample();
        second.id = GraphId::from_uuid(uuid::Uuid::from_u128(2));
        store.save(&second).await.unwrap();
        store.save(&first).await.unwrap();

        let ids: Vec<GraphId> = store.list().await.unwrap().iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[tokio::test]
    async fn test_delete() {
        let (store, _dir) = test_store().await;
        let def = sample();
        store.save(&def).await.unwrap();
        assert!(store.delete(&def.id).await.unwrap());
        assert!(!store.delete(&def.id).await.unwrap());
        assert!(store.get(&def.id).await.unwrap().is_none());
    }
}
