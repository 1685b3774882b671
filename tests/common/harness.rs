//! Test harness for database lifecycle management.
//!
//! Provides isolated database instances per test using tempfile.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

use cinelog::chat::{
    ChatService, HistoryLimits, Orchestrator, OrchestratorConfig, Planner,
};
use cinelog::db::connection::{init_db, CatalogDb, DbConfig};
use cinelog::db::schema::apply_schema;
use cinelog::metadata::{ExternalMetadata, MetadataSource};
use cinelog::models::MediaKind;
use cinelog::repository::{CatalogStore, SurrealCatalogStore};
use cinelog::tools::ToolRegistry;
use cinelog::CatalogError;

/// Test harness that manages database lifecycle.
///
/// Each TestHarness creates an isolated database in a temporary directory.
/// The database is automatically cleaned up when the harness is dropped.
pub struct TestHarness {
    /// Database connection wrapped in Arc for store sharing
    pub db: Arc<CatalogDb>,
    /// Store over `db`
    pub store: Arc<SurrealCatalogStore>,
    /// Temporary directory (kept alive while harness exists)
    pub temp_dir: TempDir,
}

impl TestHarness {
    /// Create a new test harness with isolated database.
    ///
    /// Panics if database initialization fails (appropriate for tests).
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory for test database");

        let db_path = temp_dir.path().join("test.db");
        let config = DbConfig::Embedded {
            path: Some(db_path.to_string_lossy().into_owned()),
        };
        let db = init_db(&config, temp_dir.path())
            .await
            .expect("Failed to initialize test database");

        apply_schema(&db)
            .await
            .expect("Failed to apply schema to test database");

        let db = Arc::new(db);
        Self {
            store: Arc::new(SurrealCatalogStore::new(db.clone())),
            db,
            temp_dir,
        }
    }

    /// Get the path to the temporary directory.
    pub fn temp_path(&self) -> &std::path::Path {
        self.temp_dir.path()
    }

    /// Registry over the harness store with the given metadata source.
    pub fn registry_with(&self, metadata: Arc<dyn MetadataSource>) -> ToolRegistry {
        ToolRegistry::new(self.store.clone(), metadata)
    }

    /// Registry over the harness store with a small fixed metadata catalog.
    pub fn registry(&self) -> ToolRegistry {
        self.registry_with(Arc::new(StaticMetadataSource::with_defaults()))
    }

    /// Orchestrator with default limits driving `planner` against the harness store.
    pub fn orchestrator(&self, planner: Arc<dyn Planner>) -> Orchestrator {
        Orchestrator::new(planner, self.registry(), OrchestratorConfig::default())
    }

    /// Chat service archiving into `{temp}/sessions`.
    pub fn chat_service(&self, planner: Arc<dyn Planner>) -> ChatService {
        ChatService::new(self.orchestrator(planner), HistoryLimits::default())
            .with_archive_dir(self.temp_path().join("sessions"))
    }
}

/// Store handle as the trait object the registry expects.
pub fn dyn_store(harness: &TestHarness) -> Arc<dyn CatalogStore> {
    harness.store.clone()
}

/// In-memory metadata source keyed by lowercase title.
pub struct StaticMetadataSource {
    titles: HashMap<String, ExternalMetadata>,
}

impl StaticMetadataSource {
    pub fn new(items: Vec<ExternalMetadata>) -> Self {
        Self {
            titles: items
                .into_iter()
                .map(|m| (m.title.to_lowercase(), m))
                .collect(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(vec![ExternalMetadata {
            title: "Dune".into(),
            year: Some(2021),
            kind: MediaKind::Movie,
            rating: Some(8.0),
            genres: vec!["Action".into(), "Adventure".into(), "Sci-Fi".into()],
            plot: Some("A noble family becomes embroiled in a war for Arrakis.".into()),
            imdb_id: Some("tt1160419".into()),
            director: Some("Denis Villeneuve".into()),
            runtime: Some("155 min".into()),
        }])
    }
}

#[async_trait]
impl MetadataSource for StaticMetadataSource {
    async fn lookup(
        &self,
        title: &str,
        year: Option<i32>,
    ) -> Result<Option<ExternalMetadata>, CatalogError> {
        Ok(self
            .titles
            .get(&title.trim().to_lowercase())
            .filter(|m| year.is_none() || m.year == year)
            .cloned())
    }

    async fn lookup_by_id(&self, imdb_id: &str) -> Result<Option<ExternalMetadata>, CatalogError> {
        Ok(self
            .titles
            .values()
            .find(|m| m.imdb_id.as_deref() == Some(imdb_id))
            .cloned())
    }
}
