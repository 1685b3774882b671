use async_trait::async_trait;
use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::sync::Arc;

use crate::db::connection::CatalogDb;
use crate::models::entry::{self, validate_rating, validate_year};
use crate::models::watchlist;
use crate::models::{
    Entry, EntryCreate, EntryUpdate, MediaKind, WatchlistCreate, WatchlistItem,
};
use crate::CatalogError;

/// Maximum number of entries a single search may return.
pub const MAX_LIMIT: usize = 500;

/// Default number of entries returned when no limit is given.
pub const DEFAULT_LIMIT: usize = 50;

/// Entry search filter in domain terms. All set fields must match (AND).
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct EntryFilter {
    /// Case-insensitive title substring
    pub title: Option<String>,
    pub kind: Option<MediaKind>,
    /// Inclusive lower bound on release year
    pub year_from: Option<i32>,
    /// Inclusive upper bound on release year
    pub year_to: Option<i32>,
    pub watched: Option<bool>,
    /// Genre name, case-insensitive
    pub genre: Option<String>,
    /// Minimum personal rating
    pub min_rating: Option<f64>,
    /// Maximum number of results, newest first (default 50, max 500)
    pub limit: Option<usize>,
}

/// Bound parameters for [`EntryFilter::to_surql`]. Field names match the `$vars` in the query.
#[derive(Debug, Serialize)]
struct FilterParams {
    title: Option<String>,
    kind: Option<MediaKind>,
    year_from: Option<i32>,
    year_to: Option<i32>,
    watched: Option<bool>,
    genre: Option<String>,
    min_rating: Option<f64>,
    limit: usize,
}

impl EntryFilter {
    pub fn by_title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        if let Some(year) = self.year_from {
            validate_year(year)?;
        }
        if let Some(year) = self.year_to {
            validate_year(year)?;
        }
        if let (Some(from), Some(to)) = (self.year_from, self.year_to) {
            if from > to {
                return Err(CatalogError::Validation(format!(
                    "year_from {} is after year_to {}",
                    from, to
                )));
            }
        }
        if let Some(rating) = self.min_rating {
            validate_rating(rating)?;
        }
        if let Some(limit) = self.limit {
            if limit == 0 || limit > MAX_LIMIT {
                return Err(CatalogError::Validation(format!(
                    "limit {} out of range (1..={})",
                    limit, MAX_LIMIT
                )));
            }
        }
        Ok(())
    }

    /// Translate into a SurrealQL statement. Values are never interpolated;
    /// they travel as bound parameters (see [`EntryFilter::params`]).
    pub fn to_surql(&self) -> String {
        let mut clauses = Vec::new();
        if self.title.is_some() {
            clauses.push("string::lowercase(title) CONTAINS $title");
        }
        if self.kind.is_some() {
            clauses.push("kind = $kind");
        }
        if self.year_from.is_some() {
            clauses.push("year >= $year_from");
        }
        if self.year_to.is_some() {
            clauses.push("year <= $year_to");
        }
        if self.watched.is_some() {
            clauses.push("watched = $watched");
        }
        if self.genre.is_some() {
            clauses.push("genres CONTAINS $genre");
        }
        if self.min_rating.is_some() {
            clauses.push("rating >= $min_rating");
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        format!("SELECT * FROM entry{where_clause} ORDER BY created_at DESC LIMIT $limit")
    }

    fn params(&self) -> FilterParams {
        FilterParams {
            title: self.title.as_ref().map(|t| t.trim().to_lowercase()),
            kind: self.kind,
            year_from: self.year_from,
            year_to: self.year_to,
            watched: self.watched,
            genre: self.genre.as_ref().map(|g| g.trim().to_lowercase()),
            min_rating: self.min_rating,
            limit: self.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT),
        }
    }
}

/// Outcome of a successful watchlist promotion.
#[derive(Debug, Clone)]
pub struct Promotion {
    pub entry: Entry,
    pub removed: WatchlistItem,
}

/// Catalog store operations over the `entry` and `watchlist` collections.
///
/// Lookups take bare record keys. Updates are read-modify-write with
/// last-write-wins semantics.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    // Entry operations
    async fn find_entries(&self, filter: &EntryFilter) -> Result<Vec<Entry>, CatalogError>;
    /// Every entry of `kind`, without a limit. Duplicate checks need the whole catalog.
    async fn entries_of_kind(&self, kind: MediaKind) -> Result<Vec<Entry>, CatalogError>;
    async fn get_entry(&self, key: &str) -> Result<Option<Entry>, CatalogError>;
    async fn insert_entry(&self, data: EntryCreate) -> Result<Entry, CatalogError>;
    async fn update_entry(&self, key: &str, data: EntryUpdate) -> Result<Entry, CatalogError>;
    async fn delete_entry(&self, key: &str) -> Result<Entry, CatalogError>;

    // Watchlist operations
    async fn list_watchlist(&self) -> Result<Vec<WatchlistItem>, CatalogError>;
    async fn get_watchlist_item(&self, key: &str) -> Result<Option<WatchlistItem>, CatalogError>;
    async fn insert_watchlist_item(
        &self,
        data: WatchlistCreate,
    ) -> Result<WatchlistItem, CatalogError>;
    async fn delete_watchlist_item(&self, key: &str) -> Result<WatchlistItem, CatalogError>;

    /// Move a watchlist item into the catalog as a watched entry.
    ///
    /// Creates the entry first, then removes the item. If removing the item
    /// fails the new entry is deleted again, so callers observe either both
    /// effects or neither. When that compensation also fails the error is
    /// [`CatalogError::PartialFailure`]. Nothing is retried.
    async fn promote_watchlist_item(
        &self,
        key: &str,
        fields: EntryUpdate,
    ) -> Result<Promotion, CatalogError> {
        let item = self
            .get_watchlist_item(key)
            .await?
            .ok_or_else(|| CatalogError::not_found("watchlist item", key))?;

        let mut base = EntryCreate::new(item.title.clone(), item.kind);
        base.watched_on = Some(Utc::now().date_naive());
        let data = fields.apply_to(base).normalized();
        data.validate()?;

        let entry = self.insert_entry(data).await?;

        match self.delete_watchlist_item(key).await {
            Ok(removed) => Ok(Promotion { entry, removed }),
            Err(remove_err) => {
                let entry_key = entry.key();
                tracing::warn!(
                    "Promotion of watchlist item '{}' failed after creating entry '{}': {}",
                    key,
                    entry_key,
                    remove_err
                );
                match self.delete_entry(&entry_key).await {
                    Ok(_) => Err(CatalogError::Database(format!(
                        "could not remove watchlist item '{}' ({}); the new entry was rolled back",
                        key, remove_err
                    ))),
                    Err(rollback_err) => Err(CatalogError::PartialFailure(format!(
                        "entry '{}' was created but watchlist item '{}' could not be removed ({}) \
                         and the entry could not be rolled back ({})",
                        entry_key, key, remove_err, rollback_err
                    ))),
                }
            }
        }
    }
}

/// SurrealDB implementation of CatalogStore.
///
/// Wraps the database connection and delegates to model functions.
pub struct SurrealCatalogStore {
    db: Arc<CatalogDb>,
}

impl SurrealCatalogStore {
    /// Create a new store with the given database connection.
    pub fn new(db: Arc<CatalogDb>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CatalogStore for SurrealCatalogStore {
    async fn find_entries(&self, filter: &EntryFilter) -> Result<Vec<Entry>, CatalogError> {
        filter.validate()?;
        let mut result = self
            .db
            .query(filter.to_surql())
            .bind(filter.params())
            .await?;
        let entries: Vec<Entry> = result.take(0)?;
        Ok(entries)
    }

    async fn entries_of_kind(&self, kind: MediaKind) -> Result<Vec<Entry>, CatalogError> {
        entry::entries_of_kind(&self.db, kind).await
    }

    async fn get_entry(&self, key: &str) -> Result<Option<Entry>, CatalogError> {
        entry::get_entry(&self.db, key).await
    }

    async fn insert_entry(&self, data: EntryCreate) -> Result<Entry, CatalogError> {
        let data = data.normalized();
        data.validate()?;
        entry::create_entry(&self.db, data).await
    }

    async fn update_entry(&self, key: &str, data: EntryUpdate) -> Result<Entry, CatalogError> {
        if data.is_empty() {
            return Err(CatalogError::Validation("update sets no fields".into()));
        }
        data.validate()?;
        // Read first: UPDATE on a missing record must surface as not-found.
        let current = entry::get_entry(&self.db, key)
            .await?
            .ok_or_else(|| CatalogError::not_found("entry", key))?;
        let data = data.normalized().lift_hashtags(&current.tags);
        entry::update_entry(&self.db, key, data)
            .await?
            .ok_or_else(|| CatalogError::not_found("entry", key))
    }

    async fn delete_entry(&self, key: &str) -> Result<Entry, CatalogError> {
        entry::delete_entry(&self.db, key)
            .await?
            .ok_or_else(|| CatalogError::not_found("entry", key))
    }

    async fn list_watchlist(&self) -> Result<Vec<WatchlistItem>, CatalogError> {
        watchlist::list_watchlist(&self.db).await
    }

    async fn get_watchlist_item(&self, key: &str) -> Result<Option<WatchlistItem>, CatalogError> {
        watchlist::get_watchlist_item(&self.db, key).await
    }

    async fn insert_watchlist_item(
        &self,
        data: WatchlistCreate,
    ) -> Result<WatchlistItem, CatalogError> {
        data.validate()?;
        watchlist::create_watchlist_item(&self.db, data).await
    }

    async fn delete_watchlist_item(&self, key: &str) -> Result<WatchlistItem, CatalogError> {
        watchlist::delete_watchlist_item(&self.db, key)
            .await?
            .ok_or_else(|| CatalogError::not_found("watchlist item", key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_selects_everything() {
        let filter = EntryFilter::default();
        assert_eq!(
            filter.to_surql(),
            "SELECT * FROM entry ORDER BY created_at DESC LIMIT $limit"
        );
        assert_eq!(filter.params().limit, DEFAULT_LIMIT);
    }

    #[test]
    fn test_filter_translation_uses_bound_params() {
        let filter = EntryFilter {
            title: Some("  DUNE ".into()),
            kind: Some(MediaKind::Movie),
            year_from: Some(2000),
            watched: Some(true),
            genre: Some("Sci-Fi".into()),
            ..Default::default()
        };
        let sql = filter.to_surql();
        assert!(sql.contains("string::lowercase(title) CONTAINS $title"));
        assert!(sql.contains("kind = $kind"));
        assert!(sql.contains("year >= $year_from"));
        assert!(sql.contains("watched = $watched"));
        assert!(sql.contains("genres CONTAINS $genre"));
        assert!(!sql.contains("year_to"));
        assert!(!sql.to_lowercase().contains("dune"));

        let params = filter.params();
        assert_eq!(params.title.as_deref(), Some("dune"));
        assert_eq!(params.genre.as_deref(), Some("sci-fi"));
    }

    #[test]
    fn test_filter_validation() {
        let inverted = EntryFilter {
            year_from: Some(2020),
            year_to: Some(1990),
            ..Default::default()
        };
        assert!(inverted.validate().is_err());

        let too_many = EntryFilter {
            limit: Some(MAX_LIMIT + 1),
            ..Default::default()
        };
        assert!(too_many.validate().is_err());

        assert!(EntryFilter::by_title("Alien").validate().is_ok());
    }
}
