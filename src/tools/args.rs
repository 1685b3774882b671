//! Argument shapes for the catalog tools.
//!
//! Each struct doubles as the JSON schema shown to the planner (via
//! `schemars`) and as the validator for the arguments it sends back: serde
//! catches missing fields, wrong types and unknown fields, and
//! [`ToolArgs::validate`] checks value ranges.

use chrono::{NaiveDate, Utc};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeSet;

use super::error::ToolError;
use crate::models::entry::{validate_rating, validate_title, validate_year};
use crate::models::{EntryCreate, EntryUpdate, MediaKind};
use crate::repository::EntryFilter;

/// Common behaviour of every argument struct.
pub trait ToolArgs: DeserializeOwned + JsonSchema {
    fn validate(&self) -> Result<(), ToolError> {
        Ok(())
    }
}

/// Parse and validate raw planner arguments.
///
/// `null` is accepted as an empty object so argument-less tools can be
/// called either way.
pub fn parse_args<T: ToolArgs>(raw: &serde_json::Value) -> Result<T, ToolError> {
    let value = match raw {
        serde_json::Value::Null => serde_json::Value::Object(Default::default()),
        serde_json::Value::Object(_) => raw.clone(),
        other => {
            return Err(ToolError::invalid_arguments(format!(
                "arguments must be a JSON object, got {}",
                json_type_name(other)
            )))
        }
    };
    let args: T = serde_json::from_value(value)
        .map_err(|e| ToolError::invalid_arguments(format!("invalid arguments: {}", e)))?;
    args.validate()?;
    Ok(args)
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

fn field_error(field: &str, err: crate::CatalogError) -> ToolError {
    ToolError::from(err).with_field(field)
}

/// Accepts `YYYY-MM-DD`, `DD.MM.YYYY`, or `today`/`now`.
pub fn parse_watched_on(raw: &str) -> Result<NaiveDate, ToolError> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("today") || raw.eq_ignore_ascii_case("now") {
        return Ok(Utc::now().date_naive());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d.%m.%Y"))
        .map_err(|_| {
            ToolError::invalid_arguments(format!(
                "watched_on '{}' is not a date (use YYYY-MM-DD or 'today')",
                raw
            ))
            .with_field("watched_on")
        })
}

// ============================================================================
// search_entries
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SearchEntriesArgs {
    /// Filter in catalog terms; omit to list the most recently added entries, newest first
    #[serde(default)]
    pub filter: EntryFilter,
}

impl ToolArgs for SearchEntriesArgs {
    fn validate(&self) -> Result<(), ToolError> {
        self.filter.validate().map_err(ToolError::from)
    }
}

// ============================================================================
// add_entry / update_entry
// ============================================================================

/// Fields of a catalog entry. All optional; used for updates and promotions.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct EntryFields {
    pub title: Option<String>,
    pub kind: Option<MediaKind>,
    /// Release year
    pub year: Option<i32>,
    /// Personal rating, 0 < rating <= 10
    pub rating: Option<f64>,
    pub genres: Option<Vec<String>>,
    pub watched: Option<bool>,
    /// Date watched: YYYY-MM-DD or "today"
    pub watched_on: Option<String>,
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
    /// IMDb identifier such as tt1160419
    pub imdb_id: Option<String>,
}

impl EntryFields {
    fn check(&self) -> Result<(), ToolError> {
        if let Some(title) = &self.title {
            validate_title(title).map_err(|e| field_error("title", e))?;
        }
        if let Some(year) = self.year {
            validate_year(year).map_err(|e| field_error("year", e))?;
        }
        if let Some(rating) = self.rating {
            validate_rating(rating).map_err(|e| field_error("rating", e))?;
        }
        if let Some(date) = &self.watched_on {
            parse_watched_on(date)?;
        }
        Ok(())
    }

    /// Convert into a store patch. Call after validation.
    pub fn into_update(self) -> Result<EntryUpdate, ToolError> {
        let watched_on = self
            .watched_on
            .as_deref()
            .map(parse_watched_on)
            .transpose()?;
        Ok(EntryUpdate {
            title: self.title,
            kind: self.kind,
            year: self.year,
            rating: self.rating,
            genres: self.genres.map(|g| g.into_iter().collect()),
            watched: self.watched,
            watched_on,
            notes: self.notes,
            tags: self.tags.map(|t| t.into_iter().collect()),
            attachment: None,
            imdb_id: self.imdb_id,
        }
        .normalized())
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AddEntryArgs {
    pub title: String,
    /// "movie" or "series" (default movie)
    #[serde(default)]
    pub kind: MediaKind,
    /// Release year
    pub year: Option<i32>,
    /// Personal rating, 0 < rating <= 10
    pub rating: Option<f64>,
    #[serde(default)]
    pub genres: Vec<String>,
    /// Whether the user has watched it (default true)
    pub watched: Option<bool>,
    /// Date watched: YYYY-MM-DD or "today"
    pub watched_on: Option<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// IMDb identifier such as tt1160419
    pub imdb_id: Option<String>,
    /// Create even if a similar entry already exists
    #[serde(default)]
    pub allow_duplicate: bool,
}

impl ToolArgs for AddEntryArgs {
    fn validate(&self) -> Result<(), ToolError> {
        validate_title(&self.title).map_err(|e| field_error("title", e))?;
        if let Some(year) = self.year {
            validate_year(year).map_err(|e| field_error("year", e))?;
        }
        if let Some(rating) = self.rating {
            validate_rating(rating).map_err(|e| field_error("rating", e))?;
        }
        if let Some(date) = &self.watched_on {
            parse_watched_on(date)?;
        }
        Ok(())
    }
}

impl AddEntryArgs {
    pub fn into_create(self) -> Result<EntryCreate, ToolError> {
        let watched_on = self
            .watched_on
            .as_deref()
            .map(parse_watched_on)
            .transpose()?;
        Ok(EntryCreate {
            title: self.title,
            kind: self.kind,
            year: self.year,
            rating: self.rating,
            genres: self.genres.into_iter().collect::<BTreeSet<_>>(),
            watched: self.watched.unwrap_or(true),
            watched_on,
            notes: self.notes,
            tags: self.tags.into_iter().collect(),
            attachment: None,
            imdb_id: self.imdb_id,
        }
        .normalized())
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateEntryArgs {
    /// Entry id as returned by search_entries
    pub id: String,
    /// Fields to change; omitted fields stay as they are
    pub fields: EntryFields,
}

impl ToolArgs for UpdateEntryArgs {
    fn validate(&self) -> Result<(), ToolError> {
        if self.id.trim().is_empty() {
            return Err(ToolError::invalid_arguments("id must not be empty").with_field("id"));
        }
        self.fields.check()?;
        let f = &self.fields;
        let nothing_set = f.title.is_none()
            && f.kind.is_none()
            && f.year.is_none()
            && f.rating.is_none()
            && f.genres.is_none()
            && f.watched.is_none()
            && f.watched_on.is_none()
            && f.notes.is_none()
            && f.tags.is_none()
            && f.imdb_id.is_none();
        if nothing_set {
            return Err(
                ToolError::invalid_arguments("fields must set at least one value")
                    .with_field("fields"),
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RemoveEntryArgs {
    /// Entry id as returned by search_entries
    pub id: String,
}

impl ToolArgs for RemoveEntryArgs {}

// ============================================================================
// watchlist
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ListWatchlistArgs {}

impl ToolArgs for ListWatchlistArgs {}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AddToWatchlistArgs {
    pub title: String,
    /// "movie" or "series" (default movie)
    #[serde(default)]
    pub kind: MediaKind,
    /// Position in the list; lower comes first. Omit to append at the end.
    pub priority: Option<i64>,
}

impl ToolArgs for AddToWatchlistArgs {
    fn validate(&self) -> Result<(), ToolError> {
        validate_title(&self.title).map_err(|e| field_error("title", e))
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PromoteWatchlistItemArgs {
    /// Watchlist item id as returned by list_watchlist
    pub id: String,
    /// Entry fields such as rating; title and kind default to the watchlist item's
    #[serde(default)]
    pub entry_fields: EntryFields,
}

impl ToolArgs for PromoteWatchlistItemArgs {
    fn validate(&self) -> Result<(), ToolError> {
        if self.id.trim().is_empty() {
            return Err(ToolError::invalid_arguments("id must not be empty").with_field("id"));
        }
        self.entry_fields.check()
    }
}

// ============================================================================
// fetch_external_metadata
// ============================================================================

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct FetchMetadataArgs {
    pub title: Option<String>,
    /// Release year, narrows the title match
    pub year: Option<i32>,
    /// IMDb identifier; takes precedence over title
    pub imdb_id: Option<String>,
}

impl ToolArgs for FetchMetadataArgs {
    fn validate(&self) -> Result<(), ToolError> {
        let has_title = self.title.as_deref().is_some_and(|t| !t.trim().is_empty());
        let has_id = self.imdb_id.as_deref().is_some_and(|i| !i.trim().is_empty());
        if !has_title && !has_id {
            return Err(ToolError::invalid_arguments("either title or imdb_id is required")
                .with_field("title"));
        }
        if let Some(year) = self.year {
            validate_year(year).map_err(|e| field_error("year", e))?;
        }
        Ok(())
    }
}
