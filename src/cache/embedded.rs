use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::debug;

use super::{CacheError, ContentCache, MatchColumn, SchemaVariant, TABLE};

/// Single-file SQLite content cache, the fallback when PostgreSQL is down.
#[derive(Clone, Debug)]
pub struct EmbeddedCache {
    pool: SqlitePool,
    schema: SchemaVariant,
    find_sql: String,
}

impl EmbeddedCache {
    /// Open (or create) the database file at `path`.
    pub async fn connect(
        path: &Path,
        schema: SchemaVariant,
        column: MatchColumn,
    ) -> Result<Self, CacheError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        debug!(path = %path.display(), "opened SQLite content cache");
        Ok(Self::from_pool(pool, schema, column))
    }

    /// Private in-memory database on a single connection.
    #[cfg(test)]
    pub async fn in_memory(schema: SchemaVariant, column: MatchColumn) -> Self {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        Self::from_pool(pool, schema, column)
    }

    fn from_pool(pool: SqlitePool, schema: SchemaVariant, column: MatchColumn) -> Self {
        Self {
            pool,
            schema,
            find_sql: find_sql(schema, column),
        }
    }
}

// Candidate rows, newest first. Matching happens in Rust because SQLite's
// lower() only folds ASCII.
fn find_sql(schema: SchemaVariant, column: MatchColumn) -> String {
    // SQLite sorts NULL first on DESC, push undated rows to the end.
    let order = match schema {
        SchemaVariant::Surrogate => " ORDER BY timestamp IS NULL, timestamp DESC",
        SchemaVariant::Natural => "",
    };
    format!(
        "SELECT content, {col} FROM {TABLE}{order}",
        col = column.column()
    )
}

#[async_trait]
impl ContentCache for EmbeddedCache {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn ensure_schema(&self) -> Result<(), CacheError> {
        let sql = match self.schema {
            SchemaVariant::Natural => {
                "CREATE TABLE IF NOT EXISTS data_cache (url TEXT PRIMARY KEY, content TEXT)"
            }
            SchemaVariant::Surrogate => {
                "CREATE TABLE IF NOT EXISTS data_cache (\
                 id INTEGER PRIMARY KEY, url TEXT, content TEXT, timestamp DATETIME)"
            }
        };
        sqlx::query(sql).execute(&self.pool).await?;
        Ok(())
    }

    async fn upsert(
        &self,
        url: &str,
        content: &str,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<(), CacheError> {
        match self.schema {
            SchemaVariant::Natural => {
                sqlx::query(
                    "INSERT INTO data_cache (url, content) VALUES (?1, ?2) \
                     ON CONFLICT(url) DO UPDATE SET content = excluded.content",
                )
                .bind(url)
                .bind(content)
                .execute(&self.pool)
                .await?;
            }
            SchemaVariant::Surrogate => {
                let ts = timestamp.unwrap_or_else(Utc::now);
                let updated = sqlx::query(
                    "UPDATE data_cache SET content = ?2, timestamp = ?3 WHERE url = ?1",
                )
                .bind(url)
                .bind(content)
                .bind(ts)
                .execute(&self.pool)
                .await?;
                if updated.rows_affected() == 0 {
                    sqlx::query(
                        "INSERT INTO data_cache (url, content, timestamp) VALUES (?1, ?2, ?3)",
                    )
                    .bind(url)
                    .bind(content)
                    .bind(ts)
                    .execute(&self.pool)
                    .await?;
                }
            }
        }
        Ok(())
    }

    async fn find_by_substring(&self, fragment: &str) -> Result<Option<String>, CacheError> {
        let needle = fragment.to_lowercase();
        let rows: Vec<(Option<String>, Option<String>)> = sqlx::query_as(&self.find_sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .find(|(_, haystack)| {
                haystack
                    .as_deref()
                    .is_some_and(|h| h.to_lowercase().contains(&needle))
            })
            .and_then(|(content, _)| content))
    }
}
