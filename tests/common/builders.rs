//! Test data builders for catalog records.
//!
//! Provides fluent API for creating test entries with sensible defaults.

use cinelog::models::{EntryCreate, MediaKind, WatchlistCreate};

/// Builder for creating test entries.
pub struct EntryBuilder {
    data: EntryCreate,
}

impl EntryBuilder {
    /// Watched movie with the given title.
    pub fn movie(title: impl Into<String>) -> Self {
        Self {
            data: EntryCreate::new(title, MediaKind::Movie),
        }
    }

    /// Watched series with the given title.
    pub fn series(title: impl Into<String>) -> Self {
        Self {
            data: EntryCreate::new(title, MediaKind::Series),
        }
    }

    pub fn year(mut self, year: i32) -> Self {
        self.data.year = Some(year);
        self
    }

    pub fn rating(mut self, rating: f64) -> Self {
        self.data.rating = Some(rating);
        self
    }

    pub fn genre(mut self, genre: impl Into<String>) -> Self {
        self.data.genres.insert(genre.into());
        self
    }

    pub fn unwatched(mut self) -> Self {
        self.data.watched = false;
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.data.notes = notes.into();
        self
    }

    /// Build the normalized EntryCreate struct.
    pub fn build(self) -> EntryCreate {
        self.data.normalized()
    }
}

/// Watchlist item payload.
pub fn watchlist_item(title: &str, kind: MediaKind, priority: i64) -> WatchlistCreate {
    WatchlistCreate {
        title: title.to_string(),
        kind,
        priority,
    }
}
