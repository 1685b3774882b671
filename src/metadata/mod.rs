//! External title metadata (year, kind, public rating, genres, plot).
//!
//! The network client is [`OmdbClient`]; [`CachedMetadataSource`] sits in
//! front of it so repeated lookups within a session stay local.
//! [`NoopMetadataSource`] is used when no API key is configured.

mod cache;
mod omdb;

pub use cache::{CachedMetadataSource, DEFAULT_CACHE_TTL_SECS};
pub use omdb::{OmdbClient, OMDB_BASE_URL};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::MediaKind;
use crate::CatalogError;

/// Normalized metadata for one title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalMetadata {
    pub title: String,
    pub year: Option<i32>,
    pub kind: MediaKind,
    /// Public rating on a 0-10 scale
    pub rating: Option<f64>,
    pub genres: Vec<String>,
    pub plot: Option<String>,
    pub imdb_id: Option<String>,
    pub director: Option<String>,
    pub runtime: Option<String>,
}

/// Metadata lookup service.
///
/// `Ok(None)` means the service answered and knows no such title; that is a
/// normal result, not an error.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn lookup(
        &self,
        title: &str,
        year: Option<i32>,
    ) -> Result<Option<ExternalMetadata>, CatalogError>;

    async fn lookup_by_id(&self, imdb_id: &str) -> Result<Option<ExternalMetadata>, CatalogError>;

    /// Whether lookups can succeed at all (false for the no-op source).
    fn is_available(&self) -> bool {
        true
    }
}

/// Metadata source used when no API key is configured. Every lookup fails
/// with a descriptive error so the planner can tell the user.
#[derive(Debug, Default)]
pub struct NoopMetadataSource;

impl NoopMetadataSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MetadataSource for NoopMetadataSource {
    async fn lookup(
        &self,
        _title: &str,
        _year: Option<i32>,
    ) -> Result<Option<ExternalMetadata>, CatalogError> {
        Err(CatalogError::Metadata(
            "metadata lookups are disabled: no OMDb API key configured".into(),
        ))
    }

    async fn lookup_by_id(
        &self,
        _imdb_id: &str,
    ) -> Result<Option<ExternalMetadata>, CatalogError> {
        Err(CatalogError::Metadata(
            "metadata lookups are disabled: no OMDb API key configured".into(),
        ))
    }

    fn is_available(&self) -> bool {
        false
    }
}
