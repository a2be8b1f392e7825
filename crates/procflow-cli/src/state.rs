//! Application state wiring the engine together.
//!
//! Services are generic over the definition store; `AppState` pins them to
//! the SQLite implementation and shares one store between them.

use std::path::PathBuf;
use std::sync::Arc;

use procflow_core::execution::coordinator::ExecutionService;
use procflow_core::execution::executor::GraphExecutor;
use procflow_core::id::UuidIdAllocator;
use procflow_core::node::expression::JexlEvaluator;
use procflow_core::node::registry::OperationRegistry;
use procflow_core::service::definition::DefinitionService;
use procflow_infra::config::load_engine_config;
use procflow_infra::filesystem::resolve_data_dir;
use procflow_infra::http::ReqwestHttpClient;
use procflow_infra::sqlite::definition::SqliteDefinitionStore;
use procflow_infra::sqlite::pool::DatabasePool;
use procflow_types::config::EngineConfig;

pub type ConcreteDefinitionService = DefinitionService<SqliteDefinitionStore>;
pub type ConcreteExecutionService = ExecutionService<SqliteDefinitionStore>;

#[derive(Clone)]
pub struct AppState {
    pub definitions: Arc<ConcreteDefinitionService>,
    pub runs: Arc<ConcreteExecutionService>,
    pub config: EngineConfig,
}

impl AppState {
    /// Load config, open the database and register the built-in node types.
    pub async fn init(data_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let data_dir = data_dir.unwrap_or_else(resolve_data_dir);
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_engine_config(&data_dir).await;
        let pool = DatabasePool::open(&data_dir, &config.database_file).await?;
        let store = Arc::new(SqliteDefinitionStore::new(pool));

        let http_client = ReqwestHttpClient::from_config(&config)?;
        let registry =
            OperationRegistry::with_builtins(Arc::new(http_client), Arc::new(JexlEvaluator::new()));
        let executor = GraphExecutor::new(Arc::new(registry))
            .with_max_concurrent_nodes(config.max_concurrent_nodes);

        let definitions = DefinitionService::new(Arc::clone(&store), Arc::new(UuidIdAllocator));
        let runs = ExecutionService::new(store, Arc::new(executor));

        tracing::debug!(data_dir = %data_dir.display(), "application state ready");
        Ok(Self {
            definitions: Arc::new(definitions),
            runs: Arc::new(runs),
            config,
        })
    }
}
