//! Database pool with split reader/writer connections in WAL mode.
//!
//! SQLite serializes writers, so the writer pool holds a single connection
//! while readers share a small pool.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

const MAX_READERS: u32 = 8;

#[derive(Clone)]
pub struct DatabasePool {
    pub reader: SqlitePool,
    pub writer: SqlitePool,
}

impl DatabasePool {
    /// Open (creating if missing) the database at `database_url` and apply
    /// pending migrations on the writer before the reader pool connects.
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let base_opts = SqliteConnectOptions::from_str(database_url)?
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(base_opts.clone())
            .await?;

        sqlx::migrate!("../../migrations").run(&writer).await?;

        let reader = SqlitePoolOptions::new()
            .max_connections(MAX_READERS)
            .connect_with(base_opts.read_only(true))
            .await?;

        tracing::debug!(url = database_url, "database pool ready");
        Ok(Self { reader, writer })
    }

    /// Open the database file `file` inside `data_dir`.
    pub async fn open(data_dir: &Path, file: &str) -> Result<Self, sqlx::Error> {
        Self::new(&database_url(data_dir, file)).await
    }
}

pub fn database_url(data_dir: &Path, file: &str) -> String {
    format!("sqlite://{}?mode=rwc", data_dir.join(file).display())
}
