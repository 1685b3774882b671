use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

use super::{ExternalMetadata, MetadataSource};
use crate::CatalogError;

/// Default time-to-live for cached lookups (1 hour).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

/// Caching decorator for any metadata source.
///
/// Negative answers (`None`) are cached too; errors are not.
pub struct CachedMetadataSource {
    inner: Arc<dyn MetadataSource>,
    cache: Cache<String, Option<ExternalMetadata>>,
}

impl CachedMetadataSource {
    pub fn new(inner: Arc<dyn MetadataSource>, ttl_secs: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(1_000)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();
        Self { inner, cache }
    }

    pub fn with_defaults(inner: Arc<dyn MetadataSource>) -> Self {
        Self::new(inner, DEFAULT_CACHE_TTL_SECS)
    }

    fn title_key(title: &str, year: Option<i32>) -> String {
        match year {
            Some(year) => format!("t:{}:{}", title.trim().to_lowercase(), year),
            None => format!("t:{}", title.trim().to_lowercase()),
        }
    }
}

#[async_trait]
impl MetadataSource for CachedMetadataSource {
    async fn lookup(
        &self,
        title: &str,
        year: Option<i32>,
    ) -> Result<Option<ExternalMetadata>, CatalogError> {
        let key = Self::title_key(title, year);
        if let Some(hit) = self.cache.get(&key).await {
            tracing::debug!("metadata cache hit for {}", key);
            return Ok(hit);
        }
        let fetched = self.inner.lookup(title, year).await?;
        self.cache.insert(key, fetched.clone()).await;
        Ok(fetched)
    }

    async fn lookup_by_id(&self, imdb_id: &str) -> Result<Option<ExternalMetadata>, CatalogError> {
        let key = format!("i:{}", imdb_id.trim().to_lowercase());
        if let Some(hit) = self.cache.get(&key).await {
            return Ok(hit);
        }
        let fetched = self.inner.lookup_by_id(imdb_id).await?;
        self.cache.insert(key, fetched.clone()).await;
        Ok(fetched)
    }

    fn is_available(&self) -> bool {
        self.inner.is_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MetadataSource for CountingSource {
        async fn lookup(
            &self,
            title: &str,
            year: Option<i32>,
        ) -> Result<Option<ExternalMetadata>, CatalogError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if title == "missing" {
                return Ok(None);
            }
            Ok(Some(ExternalMetadata {
                title: title.to_string(),
                year,
                kind: MediaKind::Movie,
                rating: None,
                genres: vec![],
                plot: None,
                imdb_id: None,
                director: None,
                runtime: None,
            }))
        }

        async fn lookup_by_id(
            &self,
            _imdb_id: &str,
        ) -> Result<Option<ExternalMetadata>, CatalogError> {
            Err(CatalogError::Metadata("offline".into()))
        }
    }

    #[tokio::test]
    async fn test_repeated_lookups_hit_cache() {
        let inner = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let cached = CachedMetadataSource::with_defaults(inner.clone());

        cached.lookup("Dune", Some(2021)).await.unwrap();
        cached.lookup("  dune ", Some(2021)).await.unwrap();
        cached.lookup("missing", None).await.unwrap();
        cached.lookup("missing", None).await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);

        cached.lookup("Dune", None).await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let inner = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let cached = CachedMetadataSource::with_defaults(inner);
        assert!(cached.lookup_by_id("tt1").await.is_err());
        assert!(cached.lookup_by_id("tt1").await.is_err());
    }
}
