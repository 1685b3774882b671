//! Watched movies and series.
//!
//! An entry is something the user has seen, usually with a personal rating.
//! The store assigns the id; title, kind and year identify the work in
//! practice but nothing in the schema enforces uniqueness.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use surrealdb::{Datetime, RecordId};

use crate::db::connection::CatalogDb;
use crate::CatalogError;

/// Table name for entries.
pub const ENTRY_TABLE: &str = "entry";

/// Lowest and highest release year accepted anywhere in the catalog.
pub const MIN_YEAR: i32 = 1870;
pub const MAX_YEAR: i32 = 2100;

/// Movie or series.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Movie,
    Series,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Series => "series",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "movie" | "film" => Ok(MediaKind::Movie),
            "series" | "show" | "tv" => Ok(MediaKind::Series),
            other => Err(CatalogError::Validation(format!(
                "Unknown kind '{}': expected movie or series",
                other
            ))),
        }
    }
}

/// A watched movie or series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub id: RecordId,
    pub title: String,
    pub kind: MediaKind,
    pub year: Option<i32>,
    pub rating: Option<f64>,
    #[serde(default)]
    pub genres: BTreeSet<String>,
    #[serde(default)]
    pub watched: bool,
    pub watched_on: Option<NaiveDate>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Reference to an attached image, owned by the attachment storage.
    pub attachment: Option<String>,
    pub imdb_id: Option<String>,
    pub created_at: Datetime,
    pub updated_at: Datetime,
}

impl Entry {
    /// Bare record key, as exposed to transports and the planner.
    pub fn key(&self) -> String {
        self.id.key().to_string()
    }
}

/// Data for creating a new entry.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryCreate {
    pub title: String,
    pub kind: MediaKind,
    pub year: Option<i32>,
    pub rating: Option<f64>,
    #[serde(default)]
    pub genres: BTreeSet<String>,
    pub watched: bool,
    pub watched_on: Option<NaiveDate>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub attachment: Option<String>,
    pub imdb_id: Option<String>,
}

impl EntryCreate {
    pub fn new(title: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            title: title.into(),
            kind,
            watched: true,
            ..Default::default()
        }
    }

    /// Check domain invariants before the record reaches the store.
    pub fn validate(&self) -> Result<(), CatalogError> {
        validate_title(&self.title)?;
        if let Some(year) = self.year {
            validate_year(year)?;
        }
        if let Some(rating) = self.rating {
            validate_rating(rating)?;
        }
        Ok(())
    }

    /// Trim the title, lowercase genres and lift `#hashtags` out of the notes into tags.
    pub fn normalized(mut self) -> Self {
        self.title = self.title.trim().to_string();
        self.genres = normalize_genres(self.genres);
        let (notes, hashtags) = split_hashtags(&self.notes);
        self.notes = notes;
        self.tags.extend(hashtags);
        self
    }
}

/// Partial update for an entry. `None` fields are left untouched.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EntryUpdate {
    pub title: Option<String>,
    pub kind: Option<MediaKind>,
    pub year: Option<i32>,
    pub rating: Option<f64>,
    pub genres: Option<BTreeSet<String>>,
    pub watched: Option<bool>,
    pub watched_on: Option<NaiveDate>,
    pub notes: Option<String>,
    pub tags: Option<BTreeSet<String>>,
    pub attachment: Option<String>,
    pub imdb_id: Option<String>,
}

impl EntryUpdate {
    pub fn is_empty(&self) -> bool {
        *self == EntryUpdate::default()
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(year) = self.year {
            validate_year(year)?;
        }
        if let Some(rating) = self.rating {
            validate_rating(rating)?;
        }
        Ok(())
    }

    pub fn normalized(mut self) -> Self {
        self.title = self.title.map(|t| t.trim().to_string());
        self.genres = self.genres.map(normalize_genres);
        self
    }

    /// Move `#hashtags` from new notes into tags. Without explicit tags in the
    /// patch, the lifted ones are added to `current_tags`.
    pub fn lift_hashtags(mut self, current_tags: &BTreeSet<String>) -> Self {
        let Some(notes) = self.notes.take() else {
            return self;
        };
        let (notes, hashtags) = split_hashtags(&notes);
        self.notes = Some(notes);
        if !hashtags.is_empty() {
            let mut tags = self.tags.take().unwrap_or_else(|| current_tags.clone());
            tags.extend(hashtags);
            self.tags = Some(tags);
        }
        self
    }

    /// Build a full create payload on top of `base`, used when promoting a watchlist item.
    pub fn apply_to(self, mut base: EntryCreate) -> EntryCreate {
        if let Some(title) = self.title {
            base.title = title;
        }
        if let Some(kind) = self.kind {
            base.kind = kind;
        }
        if self.year.is_some() {
            base.year = self.year;
        }
        if self.rating.is_some() {
            base.rating = self.rating;
        }
        if let Some(genres) = self.genres {
            base.genres = genres;
        }
        if let Some(watched) = self.watched {
            base.watched = watched;
        }
        if self.watched_on.is_some() {
            base.watched_on = self.watched_on;
        }
        if let Some(notes) = self.notes {
            base.notes = notes;
        }
        if let Some(tags) = self.tags {
            base.tags = tags;
        }
        if self.attachment.is_some() {
            base.attachment = self.attachment;
        }
        if self.imdb_id.is_some() {
            base.imdb_id = self.imdb_id;
        }
        base
    }
}

pub fn validate_title(title: &str) -> Result<(), CatalogError> {
    if title.trim().is_empty() {
        return Err(CatalogError::Validation("title must not be empty".into()));
    }
    Ok(())
}

pub fn validate_year(year: i32) -> Result<(), CatalogError> {
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(CatalogError::Validation(format!(
            "year {} out of range ({}..={})",
            year, MIN_YEAR, MAX_YEAR
        )));
    }
    Ok(())
}

/// Ratings are on a `(0, 10]` scale.
pub fn validate_rating(rating: f64) -> Result<(), CatalogError> {
    if !rating.is_finite() || rating <= 0.0 || rating > 10.0 {
        return Err(CatalogError::Validation(format!(
            "rating {} out of range (0 < rating <= 10)",
            rating
        )));
    }
    Ok(())
}

fn normalize_genres(genres: BTreeSet<String>) -> BTreeSet<String> {
    genres
        .into_iter()
        .map(|g| g.trim().to_lowercase())
        .filter(|g| !g.is_empty())
        .collect()
}

/// Split `#hashtags` out of free text. Returns the remaining text and the tags.
pub fn split_hashtags(text: &str) -> (String, BTreeSet<String>) {
    let mut tags = BTreeSet::new();
    let mut words = Vec::new();
    for word in text.split_whitespace() {
        match word.strip_prefix('#') {
            Some(tag) if !tag.is_empty() => {
                tags.insert(tag.trim_end_matches([',', '.', ';']).to_lowercase());
            }
            _ => words.push(word),
        }
    }
    (words.join(" "), tags)
}

// ============================================================================
// Entry CRUD Operations
// ============================================================================

/// Create a new entry.
///
/// # Returns
///
/// The created entry with generated ID and timestamps.
pub async fn create_entry(db: &CatalogDb, data: EntryCreate) -> Result<Entry, CatalogError> {
    let result: Option<Entry> = db.create(ENTRY_TABLE).content(data).await?;
    result.ok_or_else(|| CatalogError::Database("Failed to create entry".into()))
}

/// Get an entry by its bare key.
pub async fn get_entry(db: &CatalogDb, key: &str) -> Result<Option<Entry>, CatalogError> {
    let result: Option<Entry> = db.select((ENTRY_TABLE, key)).await?;
    Ok(result)
}

/// Merge `data` into an existing entry.
///
/// # Returns
///
/// The updated entry if found, None otherwise.
pub async fn update_entry(
    db: &CatalogDb,
    key: &str,
    data: EntryUpdate,
) -> Result<Option<Entry>, CatalogError> {
    let result: Option<Entry> = db.update((ENTRY_TABLE, key)).merge(data).await?;
    Ok(result)
}

/// Delete an entry by its bare key.
///
/// # Returns
///
/// The deleted entry if found, None otherwise.
pub async fn delete_entry(db: &CatalogDb, key: &str) -> Result<Option<Entry>, CatalogError> {
    let result: Option<Entry> = db.delete((ENTRY_TABLE, key)).await?;
    Ok(result)
}

/// All entries of one kind, oldest first.
pub async fn entries_of_kind(db: &CatalogDb, kind: MediaKind) -> Result<Vec<Entry>, CatalogError> {
    let mut result = db
        .query("SELECT * FROM entry WHERE kind = $kind ORDER BY created_at ASC")
        .bind(("kind", kind))
        .await?;
    let entries: Vec<Entry> = result.take(0)?;
    Ok(entries)
}

/// All distinct watched titles, used to steer recommendations away from them.
pub async fn watched_titles(db: &CatalogDb) -> Result<BTreeSet<String>, CatalogError> {
    let mut result = db
        .query("SELECT VALUE title FROM entry WHERE watched = true")
        .await?;
    let titles: Vec<String> = result.take(0)?;
    Ok(titles.into_iter().collect())
}
