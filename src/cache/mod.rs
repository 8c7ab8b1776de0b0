//! Content cache: fetched page bodies keyed by source URL.
//!
//! Three stores implement [`ContentCache`]: PostgreSQL ([`RelationalCache`]),
//! a SQLite file ([`EmbeddedCache`]) and a process-local map
//! ([`MemoryCache`]). [`connect_with_fallback`] picks one at startup and the
//! choice is kept for the life of the process.

mod embedded;
mod memory;
mod relational;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{CacheBackend, DatabaseConfig};

pub use embedded::EmbeddedCache;
pub use memory::MemoryCache;
pub use relational::RelationalCache;

pub const TABLE: &str = "data_cache";

// Cache entry with timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub url: String,
    pub content: String,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Table layout. Both exist in deployed databases.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVariant {
    /// `url` is the primary key, no timestamp column
    Natural,
    /// Surrogate `id` key plus a `timestamp` column
    Surrogate,
}

/// Column a lookup fragment is matched against.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchColumn {
    Content,
    Url,
}

impl MatchColumn {
    pub fn column(self) -> &'static str {
        match self {
            MatchColumn::Content => "content",
            MatchColumn::Url => "url",
        }
    }
}

#[async_trait]
pub trait ContentCache: Send + Sync {
    /// Short store name for logs.
    fn backend(&self) -> &'static str;

    /// `CREATE TABLE IF NOT EXISTS` for the configured layout.
    async fn ensure_schema(&self) -> Result<(), CacheError>;

    /// Insert or overwrite the row for `url`. Latest write wins.
    async fn upsert(
        &self,
        url: &str,
        content: &str,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<(), CacheError>;

    /// Content of the newest row whose match column contains `fragment`,
    /// compared case-insensitively.
    async fn find_by_substring(&self, fragment: &str) -> Result<Option<String>, CacheError>;
}

/// Open the configured store and ensure its schema.
///
/// `Auto` tries PostgreSQL first and falls back to the SQLite file when the
/// server cannot be reached or the table cannot be created.
pub async fn connect_with_fallback(
    config: &DatabaseConfig,
) -> Result<Arc<dyn ContentCache>, CacheError> {
    let cache: Arc<dyn ContentCache> = match config.backend {
        CacheBackend::Postgres => Arc::new(open_relational(config).await?),
        CacheBackend::Sqlite => Arc::new(open_embedded(config).await?),
        CacheBackend::Memory => Arc::new(MemoryCache::new(config.match_column)),
        CacheBackend::Auto => match open_relational(config).await {
            Ok(cache) => Arc::new(cache),
            Err(e) => {
                warn!(
                    error = %e,
                    host = %config.host,
                    port = config.port,
                    "PostgreSQL unavailable, falling back to SQLite"
                );
                Arc::new(open_embedded(config).await?)
            }
        },
    };
    info!(backend = cache.backend(), "content cache ready");
    Ok(cache)
}

async fn open_relational(config: &DatabaseConfig) -> Result<RelationalCache, CacheError> {
    let cache = RelationalCache::connect(config).await?;
    cache.ensure_schema().await?;
    Ok(cache)
}

async fn open_embedded(config: &DatabaseConfig) -> Result<EmbeddedCache, CacheError> {
    let cache =
        EmbeddedCache::connect(&config.sqlite_path, config.schema, config.match_column).await?;
    cache.ensure_schema().await?;
    Ok(cache)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn db_config(backend: CacheBackend, sqlite_path: PathBuf) -> DatabaseConfig {
        DatabaseConfig {
            backend,
            // Port 1 refuses connections, so Auto has to fall back.
            host: "127.0.0.1".into(),
            port: 1,
            name: "cyberpunk_monk".into(),
            user: "postgres".into(),
            password: None,
            sqlite_path,
            schema: SchemaVariant::Surrogate,
            match_column: MatchColumn::Content,
        }
    }

    #[tokio::test]
    async fn auto_falls_back_to_sqlite_when_postgres_is_down() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data_cache.db");
        let cache = connect_with_fallback(&db_config(CacheBackend::Auto, path.clone()))
            .await
            .unwrap();

        assert_eq!(cache.backend(), "sqlite");
        assert!(path.exists());

        cache
            .upsert("https://example.com/a", "hello world", None)
            .await
            .unwrap();
        assert_eq!(
            cache.find_by_substring("world").await.unwrap().as_deref(),
            Some("hello world")
        );
    }

    #[tokio::test]
    async fn explicit_postgres_does_not_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        let config = db_config(CacheBackend::Postgres, dir.path().join("unused.db"));
        assert!(connect_with_fallback(&config).await.is_err());
    }

    #[tokio::test]
    async fn memory_backend_needs_no_database() {
        let config = db_config(CacheBackend::Memory, PathBuf::from("unused.db"));
        let cache = connect_with_fallback(&config).await.unwrap();
        assert_eq!(cache.backend(), "memory");
    }
}
