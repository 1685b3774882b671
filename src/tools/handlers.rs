//! One async function per tool. Arguments arrive parsed and validated;
//! results are JSON payloads shaped for the planner.

use chrono::NaiveDate;
use rapidfuzz::distance::levenshtein;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeSet;

use super::args::{
    AddEntryArgs, AddToWatchlistArgs, FetchMetadataArgs, PromoteWatchlistItemArgs,
    RemoveEntryArgs, SearchEntriesArgs, UpdateEntryArgs,
};
use super::error::ToolError;
use crate::metadata::MetadataSource;
use crate::models::entry::ENTRY_TABLE;
use crate::models::watchlist::WATCHLIST_TABLE;
use crate::models::{Entry, EntryCreate, MediaKind, WatchlistCreate, WatchlistItem};
use crate::repository::CatalogStore;
use crate::utils::sanitize::record_key;
use crate::CatalogError;

/// Minimum normalized Levenshtein similarity for two titles to count as the same work.
pub const DUPLICATE_SIMILARITY: f64 = 0.65;

/// Entry as shown to the planner: bare string id, no internal timestamps.
#[derive(Debug, Serialize)]
pub struct EntryView {
    pub id: String,
    pub title: String,
    pub kind: MediaKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    pub genres: BTreeSet<String>,
    pub watched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watched_on: Option<NaiveDate>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub notes: String,
    pub tags: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imdb_id: Option<String>,
}

impl From<&Entry> for EntryView {
    fn from(entry: &Entry) -> Self {
        Self {
            id: entry.key(),
            title: entry.title.clone(),
            kind: entry.kind,
            year: entry.year,
            rating: entry.rating,
            genres: entry.genres.clone(),
            watched: entry.watched,
            watched_on: entry.watched_on,
            notes: entry.notes.clone(),
            tags: entry.tags.clone(),
            imdb_id: entry.imdb_id.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WatchlistView {
    pub id: String,
    pub title: String,
    pub kind: MediaKind,
    pub priority: i64,
}

impl From<&WatchlistItem> for WatchlistView {
    fn from(item: &WatchlistItem) -> Self {
        Self {
            id: item.key(),
            title: item.title.clone(),
            kind: item.kind,
            priority: item.priority,
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|e| ToolError::from(CatalogError::from(e)))
}

fn key_for<'a>(table: &str, id: &'a str) -> Result<&'a str, ToolError> {
    record_key(table, id).map_err(|e| ToolError::from(e).with_field("id"))
}

/// Title similarity in `[0, 1]`, case-insensitive.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    levenshtein::normalized_similarity(a.chars(), b.chars())
}

/// Existing entry that the new one most likely duplicates, if any.
///
/// Exact case-insensitive title with the same kind and year wins; otherwise
/// the most similar title of the same kind at or above
/// [`DUPLICATE_SIMILARITY`].
pub fn find_duplicate<'a>(candidate: &EntryCreate, existing: &'a [Entry]) -> Option<&'a Entry> {
    let same_kind = existing.iter().filter(|e| e.kind == candidate.kind);

    let exact = same_kind.clone().find(|e| {
        e.title.trim().to_lowercase() == candidate.title.trim().to_lowercase()
            && e.year == candidate.year
    });
    if exact.is_some() {
        return exact;
    }

    same_kind
        .map(|e| (e, title_similarity(&e.title, &candidate.title)))
        .filter(|(_, score)| *score >= DUPLICATE_SIMILARITY)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(e, _)| e)
}

pub async fn search_entries(
    store: &dyn CatalogStore,
    args: SearchEntriesArgs,
) -> Result<Value, ToolError> {
    let entries = store.find_entries(&args.filter).await?;
    let views: Vec<EntryView> = entries.iter().map(EntryView::from).collect();
    Ok(json!({ "count": views.len(), "entries": to_json(&views)? }))
}

pub async fn add_entry(store: &dyn CatalogStore, args: AddEntryArgs) -> Result<Value, ToolError> {
    let allow_duplicate = args.allow_duplicate;
    let data = args.into_create()?;

    if !allow_duplicate {
        let existing = store.entries_of_kind(data.kind).await?;
        if let Some(dup) = find_duplicate(&data, &existing) {
            let view = EntryView::from(dup);
            return Err(ToolError::from(CatalogError::Conflict(format!(
                "'{}' looks like existing entry '{}' ({})",
                data.title,
                dup.title,
                dup.key()
            )))
            .with_example(json!({ "existing": to_json(&view)?, "allow_duplicate": true })));
        }
    }

    let entry = store.insert_entry(data).await?;

    // The entry exists from here on; the watchlist hint must not turn it into a failure.
    let watchlist_match = match store.list_watchlist().await {
        Ok(items) => items
            .into_iter()
            .find(|item| item.matches(&entry.title, entry.kind)),
        Err(e) => {
            tracing::warn!(
                "entry '{}' created, watchlist check skipped: {}",
                entry.key(),
                e
            );
            None
        }
    };

    let mut payload = json!({ "entry": to_json(&EntryView::from(&entry))? });
    if let Some(item) = watchlist_match {
        payload["watchlist_match"] = to_json(&WatchlistView::from(&item))?;
    }
    Ok(payload)
}

pub async fn update_entry(
    store: &dyn CatalogStore,
    args: UpdateEntryArgs,
) -> Result<Value, ToolError> {
    let key = key_for(ENTRY_TABLE, &args.id)?;
    let patch = args.fields.into_update()?;
    let entry = store.update_entry(key, patch).await?;
    Ok(json!({ "entry": to_json(&EntryView::from(&entry))? }))
}

pub async fn remove_entry(
    store: &dyn CatalogStore,
    args: RemoveEntryArgs,
) -> Result<Value, ToolError> {
    let key = key_for(ENTRY_TABLE, &args.id)?;
    let removed = store.delete_entry(key).await?;
    Ok(json!({ "removed": to_json(&EntryView::from(&removed))? }))
}

pub async fn list_watchlist(store: &dyn CatalogStore) -> Result<Value, ToolError> {
    let items = store.list_watchlist().await?;
    let views: Vec<WatchlistView> = items.iter().map(WatchlistView::from).collect();
    Ok(json!({ "count": views.len(), "items": to_json(&views)? }))
}

pub async fn add_to_watchlist(
    store: &dyn CatalogStore,
    args: AddToWatchlistArgs,
) -> Result<Value, ToolError> {
    let title = args.title.trim().to_string();
    let existing = store.list_watchlist().await?;
    if let Some(item) = existing.iter().find(|i| i.matches(&title, args.kind)) {
        return Err(ToolError::from(CatalogError::Conflict(format!(
            "'{}' is already on the watchlist as '{}'",
            title,
            item.key()
        ))));
    }

    let priority = args.priority.unwrap_or_else(|| {
        existing
            .iter()
            .map(|i| i.priority)
            .max()
            .map_or(0, |p| p + 1)
    });
    let item = store
        .insert_watchlist_item(WatchlistCreate {
            title,
            kind: args.kind,
            priority,
        })
        .await?;
    Ok(json!({ "item": to_json(&WatchlistView::from(&item))? }))
}

pub async fn promote_watchlist_item(
    store: &dyn CatalogStore,
    args: PromoteWatchlistItemArgs,
) -> Result<Value, ToolError> {
    let key = key_for(WATCHLIST_TABLE, &args.id)?;
    let fields = args.entry_fields.into_update()?;
    let promotion = store.promote_watchlist_item(key, fields).await?;
    Ok(json!({
        "entry": to_json(&EntryView::from(&promotion.entry))?,
        "removed_from_watchlist": to_json(&WatchlistView::from(&promotion.removed))?,
    }))
}

pub async fn fetch_external_metadata(
    metadata: &dyn MetadataSource,
    args: FetchMetadataArgs,
) -> Result<Value, ToolError> {
    let imdb_id = args.imdb_id.as_deref().map(str::trim).filter(|i| !i.is_empty());
    let found = match imdb_id {
        Some(id) => metadata.lookup_by_id(id).await?,
        None => {
            let title = args.title.as_deref().unwrap_or_default();
            metadata.lookup(title, args.year).await?
        }
    };
    match found {
        Some(meta) => {
            let mut payload = to_json(&meta)?;
            payload["found"] = Value::Bool(true);
            Ok(payload)
        }
        None => Ok(json!({ "found": false })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use surrealdb::{Datetime, RecordId};

    fn entry(key: &str, title: &str, kind: MediaKind, year: Option<i32>) -> Entry {
        Entry {
            id: RecordId::from((ENTRY_TABLE, key)),
            title: title.into(),
            kind,
            year,
            rating: None,
            genres: BTreeSet::new(),
            watched: true,
            watched_on: None,
            notes: String::new(),
            tags: BTreeSet::new(),
            attachment: None,
            imdb_id: None,
            created_at: Datetime::default(),
            updated_at: Datetime::default(),
        }
    }

    fn candidate(title: &str, kind: MediaKind, year: Option<i32>) -> EntryCreate {
        EntryCreate {
            year,
            ..EntryCreate::new(title, kind)
        }
    }

    #[test]
    fn test_exact_duplicate_requires_same_year() {
        let existing = vec![entry("a", "Dune", MediaKind::Movie, Some(2021))];
        let dup = find_duplicate(&candidate("dune", MediaKind::Movie, Some(2021)), &existing);
        assert_eq!(dup.map(|e| e.key()), Some("a".to_string()));
    }

    #[test]
    fn test_fuzzy_duplicate() {
        let existing = vec![entry("b", "Amélie", MediaKind::Movie, Some(2001))];
        let dup = find_duplicate(&candidate("Amelie", MediaKind::Movie, None), &existing);
        assert!(dup.is_some());
    }

    #[test]
    fn test_different_kind_or_title_is_not_duplicate() {
        let existing = vec![
            entry("a", "Dune", MediaKind::Series, Some(2021)),
            entry("b", "Arrival", MediaKind::Movie, Some(2016)),
        ];
        assert!(find_duplicate(&candidate("Dune", MediaKind::Movie, Some(2021)), &existing).is_none());
        assert!(
            find_duplicate(&candidate("Dune: Part Two", MediaKind::Series, Some(2024)), &existing)
                .is_none()
        );
    }

    #[test]
    fn test_similarity_is_case_insensitive() {
        assert_eq!(title_similarity("ALIEN", " alien "), 1.0);
        assert!(title_similarity("Alien", "Heat") < DUPLICATE_SIMILARITY);
    }
}
