use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use tracing::debug;

use super::{CacheError, ContentCache, MatchColumn, SchemaVariant, TABLE};
use crate::config::DatabaseConfig;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// PostgreSQL-backed content cache.
#[derive(Clone, Debug)]
pub struct RelationalCache {
    pool: PgPool,
    schema: SchemaVariant,
    find_sql: String,
}

impl RelationalCache {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, CacheError> {
        let mut options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.name)
            .username(&config.user);
        if let Some(password) = &config.password {
            options = options.password(password);
        }

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(CONNECT_TIMEOUT)
            .connect_with(options)
            .await?;
        debug!(
            host = %config.host,
            port = config.port,
            database = %config.name,
            "connected to PostgreSQL"
        );

        Ok(Self::from_pool(pool, config.schema, config.match_column))
    }

    fn from_pool(pool: PgPool, schema: SchemaVariant, column: MatchColumn) -> Self {
        Self {
            pool,
            schema,
            find_sql: find_sql(schema, column),
        }
    }
}

fn find_sql(schema: SchemaVariant, column: MatchColumn) -> String {
    let order = match schema {
        SchemaVariant::Surrogate => "ORDER BY timestamp DESC NULLS LAST ",
        SchemaVariant::Natural => "",
    };
    format!(
        "SELECT content FROM {TABLE} WHERE strpos(lower({col}), $1) > 0 {order}LIMIT 1",
        col = column.column()
    )
}

#[async_trait]
impl ContentCache for RelationalCache {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ensure_schema(&self) -> Result<(), CacheError> {
        let sql = match self.schema {
            SchemaVariant::Natural => {
                "CREATE TABLE IF NOT EXISTS data_cache (url TEXT PRIMARY KEY, content TEXT)"
            }
            SchemaVariant::Surrogate => {
                "CREATE TABLE IF NOT EXISTS data_cache (\
                 id SERIAL PRIMARY KEY, url TEXT, content TEXT, timestamp TIMESTAMP)"
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
                    "INSERT INTO data_cache (url, content) VALUES ($1, $2) \
                     ON CONFLICT (url) DO UPDATE SET content = EXCLUDED.content",
                )
                .bind(url)
                .bind(content)
                .execute(&self.pool)
                .await?;
            }
            SchemaVariant::Surrogate => {
                // No unique constraint on url here, so update first and insert on a miss.
                let ts = timestamp.unwrap_or_else(Utc::now).naive_utc();
                let updated = sqlx::query(
                    "UPDATE data_cache SET content = $2, timestamp = $3 WHERE url = $1",
                )
                .bind(url)
                .bind(content)
                .bind(ts)
                .execute(&self.pool)
                .await?;
                if updated.rows_affected() == 0 {
                    sqlx::query(
                        "INSERT INTO data_cache (url, content, timestamp) VALUES ($1, $2, $3)",
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
        let row: Option<Option<String>> = sqlx::query_scalar(&self.find_sql)
            .bind(fragment.to_lowercase())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.flatten())
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::TimeZone;

    use super::*;

    // Cache bound to a throwaway schema on $DATABASE_URL, or None when unset.
    async fn scratch(schema: SchemaVariant) -> Option<(RelationalCache, PgPool, String)> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let admin = PgPool::connect(&url).await.unwrap();
        let namespace = format!(
            "monk_cache_test_{}_{}",
            format!("{schema:?}").to_lowercase(),
            std::process::id()
        );
        sqlx::query(&format!("DROP SCHEMA IF EXISTS {namespace} CASCADE"))
            .execute(&admin)
            .await
            .unwrap();
        sqlx::query(&format!("CREATE SCHEMA {namespace}"))
            .execute(&admin)
            .await
            .unwrap();

        let options = PgConnectOptions::from_str(&url)
            .unwrap()
            .options([("search_path", namespace.as_str())]);
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        let cache = RelationalCache::from_pool(pool, schema, MatchColumn::Content);
        cache.ensure_schema().await.unwrap();
        cache.ensure_schema().await.unwrap();
        Some((cache, admin, namespace))
    }

    async fn drop_scratch(cache: RelationalCache, admin: PgPool, namespace: &str) {
        cache.pool.close().await;
        sqlx::query(&format!("DROP SCHEMA {namespace} CASCADE"))
            .execute(&admin)
            .await
            .unwrap();
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL pointing at PostgreSQL"]
    async fn upsert_is_idempotent_per_url_on_postgres() {
        for schema in [SchemaVariant::Natural, SchemaVariant::Surrogate] {
            let Some((cache, admin, namespace)) = scratch(schema).await else {
                return;
            };

            cache.upsert("https://example.com/a", "first page", None).await.unwrap();
            cache.upsert("https://example.com/a", "Second Page", None).await.unwrap();

            let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM data_cache")
                .fetch_one(&cache.pool)
                .await
                .unwrap();
            assert_eq!(rows, 1, "{schema:?}");
            assert_eq!(
                cache.find_by_substring("SECOND").await.unwrap().as_deref(),
                Some("Second Page"),
                "{schema:?}"
            );
            assert!(cache.find_by_substring("first").await.unwrap().is_none());

            drop_scratch(cache, admin, &namespace).await;
        }
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL pointing at PostgreSQL"]
    async fn surrogate_lookup_returns_newest_row_on_postgres() {
        let Some((cache, admin, namespace)) = scratch(SchemaVariant::Surrogate).await else {
            return;
        };
        let old = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let new = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        cache.upsert("https://a.example", "monk archive old", Some(old)).await.unwrap();
        cache.upsert("https://b.example", "monk archive new", Some(new)).await.unwrap();

        assert_eq!(
            cache.find_by_substring("Monk").await.unwrap().as_deref(),
            Some("monk archive new")
        );

        drop_scratch(cache, admin, &namespace).await;
    }

    #[test]
    fn surrogate_lookup_prefers_newest_row() {
        let sql = find_sql(SchemaVariant::Surrogate, MatchColumn::Content);
        assert_eq!(
            sql,
            "SELECT content FROM data_cache WHERE strpos(lower(content), $1) > 0 \
             ORDER BY timestamp DESC NULLS LAST LIMIT 1"
        );
    }

    #[test]
    fn natural_lookup_has_no_ordering_column() {
        let sql = find_sql(SchemaVariant::Natural, MatchColumn::Url);
        assert_eq!(
            sql,
            "SELECT content FROM data_cache WHERE strpos(lower(url), $1) > 0 LIMIT 1"
        );
    }
}
