//! Record key validation for store lookups.
//!
//! Callers (the planner in particular) may refer to a record either by its
//! bare key (`"x8k2m9"`) or by the full `table:key` form (`"entry:x8k2m9"`).
//! Keys are restricted to the characters SurrealDB generates so they are safe
//! to use in record lookups.

use crate::CatalogError;

/// Allowed characters in the key portion of a record ID.
fn is_valid_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Normalize an identifier for `table` into its bare key.
///
/// Accepts `key`, `table:key` and the angle-bracket escaped form SurrealDB
/// prints for some keys (`table:⟨key⟩`). A prefix naming a different table
/// is rejected.
///
/// ```ignore
/// assert_eq!(record_key("entry", "entry:abc")?, "abc");
/// assert_eq!(record_key("entry", "abc")?, "abc");
/// ```
pub fn record_key<'a>(table: &str, id: &'a str) -> Result<&'a str, CatalogError> {
    let id = id.trim();
    let key = match id.split_once(':') {
        Some((prefix, key)) if prefix == table => key,
        Some((prefix, _)) => {
            return Err(CatalogError::Validation(format!(
                "Invalid id '{}': expected a {} id, got a {} id",
                id, table, prefix
            )))
        }
        None => id,
    };
    let key = key
        .strip_prefix('⟨')
        .and_then(|k| k.strip_suffix('⟩'))
        .unwrap_or(key);
    validate_key(key)
}

/// Validate that a bare key (without table prefix) is safe to look up.
pub fn validate_key(key: &str) -> Result<&str, CatalogError> {
    if key.is_empty() || !key.chars().all(is_valid_key_char) {
        return Err(CatalogError::Validation(format!(
            "Invalid key '{}': must be alphanumeric with underscores or hyphens",
            key
        )));
    }
    Ok(key)
}
