use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::{CacheEntry, CacheError, ContentCache, MatchColumn};

// Process-local cache: url -> entry
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
    column: MatchColumn,
}

impl MemoryCache {
    pub fn new(column: MatchColumn) -> Self {
        Self {
            entries: DashMap::new(),
            column,
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[async_trait]
impl ContentCache for MemoryCache {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ensure_schema(&self) -> Result<(), CacheError> {
        Ok(())
    }

    async fn upsert(
        &self,
        url: &str,
        content: &str,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<(), CacheError> {
        self.entries.insert(
            url.to_string(),
            CacheEntry {
                url: url.to_string(),
                content: content.to_string(),
                timestamp: Some(timestamp.unwrap_or_else(Utc::now)),
            },
        );
        Ok(())
    }

    async fn find_by_substring(&self, fragment: &str) -> Result<Option<String>, CacheError> {
        let needle = fragment.to_lowercase();
        let best = self
            .entries
            .iter()
            .filter(|entry| {
                let haystack = match self.column {
                    MatchColumn::Content => &entry.content,
                    MatchColumn::Url => &entry.url,
                };
                haystack.to_lowercase().contains(&needle)
            })
            .max_by_key(|entry| entry.timestamp)
            .map(|entry| entry.content.clone());
        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[tokio::test]
    async fn newest_match_wins() {
        let cache = MemoryCache::new(MatchColumn::Content);
        let now = Utc::now();
        cache.upsert("https://a", "Neon temple", Some(now - Duration::hours(1))).await.unwrap();
        cache.upsert("https://b", "neon market", Some(now)).await.unwrap();

        assert_eq!(
            cache.find_by_substring("NEON").await.unwrap().as_deref(),
            Some("neon market")
        );
    }

    #[tokio::test]
    async fn upsert_is_keyed_by_url() {
        let cache = MemoryCache::new(MatchColumn::Url);
        cache.upsert("https://a", "one", None).await.unwrap();
        cache.upsert("https://a", "two", None).await.unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.find_by_substring("a").await.unwrap().as_deref(), Some("two"));
    }
}
