pub mod catalog;

pub use catalog::{
    CatalogStore, EntryFilter, Promotion, SurrealCatalogStore, DEFAULT_LIMIT, MAX_LIMIT,
};
