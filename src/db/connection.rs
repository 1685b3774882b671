//! Catalog database connection.
//!
//! The catalog normally lives in an embedded RocksDB under the data path.
//! A remote SurrealDB server can be configured instead so several frontends
//! (CLI, chat bot) share one catalog.

use std::path::Path;

use serde::{Deserialize, Serialize};
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::Root;
use surrealdb::Surreal;

use crate::CatalogError;

/// Handle to the catalog database, embedded or remote.
pub type CatalogDb = Surreal<Any>;

pub const DB_CONFIG_FILE: &str = "database.toml";
const NAMESPACE: &str = "cinelog";
const DATABASE: &str = "catalog";

fn default_namespace() -> String {
    NAMESPACE.to_string()
}

fn default_database() -> String {
    DATABASE.to_string()
}

/// Where the catalog is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DbConfig {
    /// RocksDB inside the data directory. Single-process access.
    Embedded {
        /// Custom RocksDB directory; `{data_path}/db` otherwise
        #[serde(default)]
        path: Option<String>,
    },
    /// SurrealDB server reached over WebSocket.
    Remote {
        /// e.g. `ws://127.0.0.1:8000`
        endpoint: String,
        /// Falls back to `CINELOG_DB_USER`, then `root`
        #[serde(default)]
        username: Option<String>,
        /// Falls back to `CINELOG_DB_PASS`, then `root`
        #[serde(default)]
        password: Option<String>,
        #[serde(default = "default_namespace")]
        namespace: String,
        #[serde(default = "default_database")]
        database: String,
    },
}

impl Default for DbConfig {
    fn default() -> Self {
        Self::Embedded { path: None }
    }
}

fn read_config_file(path: &Path) -> Result<Option<DbConfig>, CatalogError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path)?;
    toml::from_str(&raw)
        .map(Some)
        .map_err(|e| CatalogError::Config(format!("{}: {}", path.display(), e)))
}

fn env_config(lookup: impl Fn(&str) -> Option<String>) -> Option<DbConfig> {
    let endpoint = lookup("CINELOG_DB_URL").filter(|u| !u.trim().is_empty())?;
    Some(DbConfig::Remote {
        endpoint,
        username: lookup("CINELOG_DB_USER"),
        password: lookup("CINELOG_DB_PASS"),
        namespace: default_namespace(),
        database: default_database(),
    })
}

/// Pick the database config: `{data_path}/database.toml`, then
/// `CINELOG_DB_URL`, then the embedded default.
///
/// A broken config file is logged and skipped rather than aborting startup.
pub fn load_db_config(data_path: &Path) -> DbConfig {
    let file = data_path.join(DB_CONFIG_FILE);
    match read_config_file(&file) {
        Ok(Some(config)) => {
            tracing::info!("database config from {}", file.display());
            return config;
        }
        Ok(None) => {}
        Err(e) => tracing::warn!("ignoring database config: {}", e),
    }

    if let Some(config) = env_config(|key| std::env::var(key).ok()) {
        tracing::info!("database config from CINELOG_DB_URL");
        return config;
    }
    DbConfig::default()
}

/// Connect and select the catalog namespace and database.
pub async fn init_db(config: &DbConfig, data_path: &Path) -> Result<CatalogDb, CatalogError> {
    match config {
        DbConfig::Embedded { path } => {
            let dir = match path {
                Some(p) => p.clone(),
                None => data_path.join("db").to_string_lossy().into_owned(),
            };
            let db = surrealdb::engine::any::connect(format!("rocksdb:{dir}")).await?;
            db.use_ns(NAMESPACE).use_db(DATABASE).await?;
            Ok(db)
        }
        DbConfig::Remote {
            endpoint,
            username,
            password,
            namespace,
            database,
        } => {
            let credential = |given: &Option<String>, var: &str| {
                given
                    .clone()
                    .or_else(|| std::env::var(var).ok())
                    .unwrap_or_else(|| "root".to_string())
            };
            let user = credential(username, "CINELOG_DB_USER");
            let pass = credential(password, "CINELOG_DB_PASS");

            let db = surrealdb::engine::any::connect(endpoint.as_str()).await?;
            db.signin(Root {
                username: &user,
                password: &pass,
            })
            .await?;
            db.use_ns(namespace.as_str())
                .use_db(database.as_str())
                .await?;
            Ok(db)
        }
    }
}
