//! Short facts remembered about the user (tastes, favourite genres).
//!
//! They are injected into every chat session's system context.

use serde::{Deserialize, Serialize};
use surrealdb::{Datetime, RecordId};

use crate::db::connection::CatalogDb;
use crate::CatalogError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryNote {
    pub id: RecordId,
    pub text: String,
    pub created_at: Datetime,
}

impl MemoryNote {
    pub fn key(&self) -> String {
        self.id.key().to_string()
    }
}

#[derive(Debug, Clone, Serialize)]
struct MemoryCreate {
    text: String,
}

pub async fn add_memory(db: &CatalogDb, text: &str) -> Result<MemoryNote, CatalogError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(CatalogError::Validation("memory text must not be empty".into()));
    }
    let result: Option<MemoryNote> = db
        .create("memory")
        .content(MemoryCreate {
            text: text.to_string(),
        })
        .await?;
    result.ok_or_else(|| CatalogError::Database("Failed to store memory".into()))
}

/// All memories, oldest first.
pub async fn list_memories(db: &CatalogDb) -> Result<Vec<MemoryNote>, CatalogError> {
    let mut result = db
        .query("SELECT * FROM memory ORDER BY created_at ASC")
        .await?;
    let notes: Vec<MemoryNote> = result.take(0)?;
    Ok(notes)
}

/// Forget the first memory whose key starts with `key_prefix`.
///
/// # Returns
///
/// The forgotten memory, or None when nothing matched.
pub async fn forget_memory(
    db: &CatalogDb,
    key_prefix: &str,
) -> Result<Option<MemoryNote>, CatalogError> {
    let key_prefix = key_prefix.trim().trim_start_matches("memory:");
    if key_prefix.is_empty() {
        return Err(CatalogError::Validation("memory id must not be empty".into()));
    }
    let target = list_memories(db)
        .await?
        .into_iter()
        .find(|m| m.key().starts_with(key_prefix));
    match target {
        Some(note) => {
            let key = note.key();
            let deleted: Option<MemoryNote> = db.delete(("memory", key.as_str())).await?;
            Ok(deleted)
        }
        None => Ok(None),
    }
}
