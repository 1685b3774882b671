use crate::db::connection::CatalogDb;
use crate::CatalogError;

/// Catalog tables: entry, watchlist, memory
const SCHEMA_001: &str = include_str!("migrations/001_catalog.surql");

/// Apply the database schema to an initialized database connection.
///
/// Every statement uses `IF NOT EXISTS`, so calling this on each startup is safe.
///
/// # Example
///
/// ```no_run
/// # use cinelog::db::{connection::{init_db, DbConfig}, schema::apply_schema};
/// # use std::path::Path;
/// # async fn example() -> Result<(), cinelog::CatalogError> {
/// let config = DbConfig::Embedded { path: Some("./data/cinelog.db".into()) };
/// let db = init_db(&config, Path::new("./data")).await?;
/// apply_schema(&db).await?;
/// # Ok(())
/// # }
/// ```
pub async fn apply_schema(db: &CatalogDb) -> Result<(), CatalogError> {
    db.query(SCHEMA_001).await?.check()?;
    Ok(())
}
