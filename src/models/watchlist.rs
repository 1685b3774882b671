//! Titles the user intends to watch.

use serde::{Deserialize, Serialize};
use surrealdb::{Datetime, RecordId};

use crate::db::connection::CatalogDb;
use crate::models::entry::{validate_title, MediaKind};
use crate::CatalogError;

/// Table name for watchlist items.
pub const WATCHLIST_TABLE: &str = "watchlist";

/// Something on the watchlist. Lower priority values come first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistItem {
    pub id: RecordId,
    pub title: String,
    pub kind: MediaKind,
    #[serde(default)]
    pub priority: i64,
    pub added_at: Datetime,
}

impl WatchlistItem {
    pub fn key(&self) -> String {
        self.id.key().to_string()
    }

    /// Case-insensitive title + kind match.
    pub fn matches(&self, title: &str, kind: MediaKind) -> bool {
        self.kind == kind && self.title.trim().eq_ignore_ascii_case(title.trim())
    }
}

/// Data for creating a watchlist item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistCreate {
    pub title: String,
    pub kind: MediaKind,
    pub priority: i64,
}

impl WatchlistCreate {
    pub fn validate(&self) -> Result<(), CatalogError> {
        validate_title(&self.title)
    }
}

/// Create a watchlist item.
pub async fn create_watchlist_item(
    db: &CatalogDb,
    data: WatchlistCreate,
) -> Result<WatchlistItem, CatalogError> {
    let result: Option<WatchlistItem> = db.create(WATCHLIST_TABLE).content(data).await?;
    result.ok_or_else(|| CatalogError::Database("Failed to create watchlist item".into()))
}

/// Get a watchlist item by its bare key.
pub async fn get_watchlist_item(
    db: &CatalogDb,
    key: &str,
) -> Result<Option<WatchlistItem>, CatalogError> {
    let result: Option<WatchlistItem> = db.select((WATCHLIST_TABLE, key)).await?;
    Ok(result)
}

/// List the watchlist ordered by priority, then insertion time.
pub async fn list_watchlist(db: &CatalogDb) -> Result<Vec<WatchlistItem>, CatalogError> {
    let mut result = db
        .query("SELECT * FROM watchlist ORDER BY priority ASC, added_at ASC")
        .await?;
    let items: Vec<WatchlistItem> = result.take(0)?;
    Ok(items)
}

/// Delete a watchlist item by its bare key.
///
/// # Returns
///
/// The deleted item if found, None otherwise.
pub async fn delete_watchlist_item(
    db: &CatalogDb,
    key: &str,
) -> Result<Option<WatchlistItem>, CatalogError> {
    let result: Option<WatchlistItem> = db.delete((WATCHLIST_TABLE, key)).await?;
    Ok(result)
}
