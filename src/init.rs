//! Shared initialization for the CLI commands.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::chat::{
    build_system_prompt, ChatService, OpenAiPlanner, Orchestrator, OrchestratorConfig, Planner,
};
use crate::config::AppConfig;
use crate::db::connection::{init_db, load_db_config, CatalogDb};
use crate::db::schema::apply_schema;
use crate::metadata::{CachedMetadataSource, MetadataSource, NoopMetadataSource, OmdbClient};
use crate::models::{entry, memory};
use crate::repository::{CatalogStore, SurrealCatalogStore};
use crate::tools::ToolRegistry;

/// Directory under the data path holding archived chat transcripts.
pub const SESSIONS_DIR: &str = "sessions";

/// Application context holding the database, store, metadata source and tool registry.
pub struct AppContext {
    pub db: Arc<CatalogDb>,
    pub data_path: PathBuf,
    pub config: AppConfig,
    pub store: Arc<dyn CatalogStore>,
    pub metadata: Arc<dyn MetadataSource>,
    pub registry: ToolRegistry,
}

/// Resolve the data directory.
///
/// Priority: explicit path > CINELOG_DATA_PATH env > ./.cinelog (if exists) > ~/.cinelog
pub fn resolve_data_path(explicit_path: Option<PathBuf>) -> PathBuf {
    explicit_path
        .or_else(|| std::env::var("CINELOG_DATA_PATH").ok().map(PathBuf::from))
        .or_else(|| {
            let local_path = Path::new(".cinelog");
            if local_path.is_dir() {
                Some(local_path.to_path_buf())
            } else {
                None
            }
        })
        .unwrap_or_else(|| {
            dirs::home_dir()
                .map(|h| h.join(".cinelog"))
                .unwrap_or_else(|| PathBuf::from(".cinelog"))
        })
}

impl AppContext {
    /// Initialize application context.
    pub async fn new(explicit_path: Option<PathBuf>) -> Result<Self> {
        let data_path = resolve_data_path(explicit_path);
        tracing::info!("Using data path: {}", data_path.display());
        std::fs::create_dir_all(&data_path)
            .with_context(|| format!("cannot create {}", data_path.display()))?;

        let config = AppConfig::load(&data_path)?;

        let db_config = load_db_config(&data_path);
        let db = init_db(&db_config, &data_path).await?;
        tracing::info!("Database connected");

        apply_schema(&db).await?;
        tracing::info!("Schema applied");

        let db = Arc::new(db);
        Ok(Self::from_parts(db, data_path, config))
    }

    /// Assemble the context around an already connected database.
    pub fn from_parts(db: Arc<CatalogDb>, data_path: PathBuf, config: AppConfig) -> Self {
        let store: Arc<dyn CatalogStore> = Arc::new(SurrealCatalogStore::new(db.clone()));

        let metadata: Arc<dyn MetadataSource> = match config.metadata.omdb_api_key.as_deref() {
            Some(key) => match OmdbClient::new(key) {
                Ok(client) => Arc::new(CachedMetadataSource::new(
                    Arc::new(client),
                    config.metadata.cache_ttl_secs,
                )),
                Err(e) => {
                    tracing::warn!("Metadata lookups disabled: {}", e);
                    Arc::new(NoopMetadataSource::new())
                }
            },
            None => {
                tracing::debug!("No OMDb API key configured; metadata lookups disabled");
                Arc::new(NoopMetadataSource::new())
            }
        };

        let registry = ToolRegistry::new(store.clone(), metadata.clone());

        Self {
            db,
            data_path,
            config,
            store,
            metadata,
            registry,
        }
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.data_path.join(SESSIONS_DIR)
    }

    /// System prompt with the current memories and watched titles.
    pub async fn system_prompt(&self) -> Result<String> {
        let memories: Vec<String> = memory::list_memories(&self.db)
            .await?
            .into_iter()
            .map(|m| m.text)
            .collect();
        let watched = entry::watched_titles(&self.db).await?;
        Ok(build_system_prompt(&memories, &watched))
    }

    /// Chat service backed by the configured planner.
    pub fn chat_service(&self) -> Result<ChatService> {
        let planner: Arc<dyn Planner> = Arc::new(OpenAiPlanner::new(&self.config.planner)?);
        Ok(self.chat_service_with(planner))
    }

    pub fn chat_service_with(&self, planner: Arc<dyn Planner>) -> ChatService {
        let orchestrator = Orchestrator::new(
            planner,
            self.registry.clone(),
            OrchestratorConfig {
                max_iterations: self.config.chat.max_iterations,
            },
        );
        ChatService::new(orchestrator, self.config.chat.history_limits())
            .with_archive_dir(self.sessions_dir())
    }
}
