//! Relational storage for answered prompts.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

#[derive(Debug, thiserror::Error)]
#[error("Storage error: {0}")]
pub struct StoreError(#[from] sqlx::Error);

pub type Result<T> = std::result::Result<T, StoreError>;

/// One answered prompt.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct PromptResult {
    pub id: i64,
    pub prompt: String,
    pub results: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// A page of results, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct ResultsPage {
    pub results: Vec<PromptResult>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: i64,
}

#[derive(Clone)]
pub struct ResultStore {
    pool: SqlitePool,
}

impl ResultStore {
    /// Connect and create the schema if needed.
    ///
    /// `sqlite::memory:` gives each connection its own database, so the
    /// pool is kept to a single connection in that case.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS prompt_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                prompt TEXT NOT NULL,
                results TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_prompt_results_created_at ON prompt_results(created_at);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn insert(&self, prompt: &str, results: &str) -> Result<PromptResult> {
        let record = sqlx::query_as::<_, PromptResult>(
            r#"
            INSERT INTO prompt_results (prompt, results, created_at)
            VALUES (?, ?, ?)
            RETURNING id, prompt, results, created_at
            "#,
        )
        .bind(prompt)
        .bind(results)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(id = record.id, "Stored prompt result");
        Ok(record)
    }

    /// `page` is 1-based.
    pub async fn list_page(&self, page: u32, page_size: u32) -> Result<ResultsPage> {
        let page = page.max(1);
        let page_size = page_size.max(1);
        let offset = i64::from(page - 1) * i64::from(page_size);

        let results = sqlx::query_as::<_, PromptResult>(
            r#"
            SELECT id, prompt, results, created_at
            FROM prompt_results
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(i64::from(page_size))
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM prompt_results")
            .fetch_one(&self.pool)
            .await?;

        Ok(ResultsPage {
            results,
            total,
            page,
            page_size,
            total_pages: total_pages(total, page_size),
        })
    }
}

fn total_pages(total: i64, page_size: u32) -> i64 {
    let page_size = i64::from(page_size);
    (total + page_size - 1) / page_size
}
