//! Store wrapper that injects failures into selected operations.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cinelog::models::{Entry, EntryCreate, EntryUpdate, MediaKind, WatchlistCreate, WatchlistItem};
use cinelog::repository::{CatalogStore, EntryFilter, SurrealCatalogStore};
use cinelog::CatalogError;

/// Delegates to the real store, failing selected operations on demand.
pub struct FaultyStore {
    inner: Arc<SurrealCatalogStore>,
    pub fail_watchlist_delete: AtomicBool,
    pub fail_entry_delete: AtomicBool,
    pub fail_watchlist_list: AtomicBool,
}

impl FaultyStore {
    pub fn new(inner: Arc<SurrealCatalogStore>) -> Self {
        Self {
            inner,
            fail_watchlist_delete: AtomicBool::new(false),
            fail_entry_delete: AtomicBool::new(false),
            fail_watchlist_list: AtomicBool::new(false),
        }
    }
}

fn injected(flag: &AtomicBool, what: &str) -> Result<(), CatalogError> {
    if flag.load(Ordering::SeqCst) {
        return Err(CatalogError::Database(format!("injected {} failure", what)));
    }
    Ok(())
}

#[async_trait]
impl CatalogStore for FaultyStore {
    async fn find_entries(&self, filter: &EntryFilter) -> Result<Vec<Entry>, CatalogError> {
        self.inner.find_entries(filter).await
    }

    async fn entries_of_kind(&self, kind: MediaKind) -> Result<Vec<Entry>, CatalogError> {
        self.inner.entries_of_kind(kind).await
    }

    async fn get_entry(&self, key: &str) -> Result<Option<Entry>, CatalogError> {
        self.inner.get_entry(key).await
    }

    async fn insert_entry(&self, data: EntryCreate) -> Result<Entry, CatalogError> {
        self.inner.insert_entry(data).await
    }

    async fn update_entry(&self, key: &str, data: EntryUpdate) -> Result<Entry, CatalogError> {
        self.inner.update_entry(key, data).await
    }

    async fn delete_entry(&self, key: &str) -> Result<Entry, CatalogError> {
        injected(&self.fail_entry_delete, "entry delete")?;
        self.inner.delete_entry(key).await
    }

    async fn list_watchlist(&self) -> Result<Vec<WatchlistItem>, CatalogError> {
        injected(&self.fail_watchlist_list, "watchlist list")?;
        self.inner.list_watchlist().await
    }

    async fn get_watchlist_item(&self, key: &str) -> Result<Option<WatchlistItem>, CatalogError> {
        self.inner.get_watchlist_item(key).await
    }

    async fn insert_watchlist_item(
        &self,
        data: WatchlistCreate,
    ) -> Result<WatchlistItem, CatalogError> {
        self.inner.insert_watchlist_item(data).await
    }

    async fn delete_watchlist_item(&self, key: &str) -> Result<WatchlistItem, CatalogError> {
        injected(&self.fail_watchlist_delete, "watchlist delete")?;
        self.inner.delete_watchlist_item(key).await
    }
}
