//! Application settings from `{data_path}/config.toml` plus environment overrides.
//!
//! ```toml
//! [planner]
//! api_base = "https://api.openai.com/v1"
//! model = "gpt-4o-mini"
//! api_key = "sk-..."
//! max_retries = 1
//!
//! [metadata]
//! omdb_api_key = "..."
//! cache_ttl_secs = 3600
//!
//! [chat]
//! max_iterations = 6
//! max_history_messages = 40
//! max_history_tokens = 12000
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::chat::session::{HistoryLimits, DEFAULT_MAX_MESSAGES, DEFAULT_MAX_TOKENS};
use crate::chat::DEFAULT_MAX_ITERATIONS;
use crate::metadata::DEFAULT_CACHE_TTL_SECS;
use crate::CatalogError;

pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub planner: PlannerConfig,
    pub metadata: MetadataConfig,
    pub chat: ChatConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub api_base: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Extra attempts after a transient failure (network, 429, 5xx).
    pub max_retries: usize,
    pub timeout_secs: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            api_key: None,
            max_retries: 1,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub omdb_api_key: Option<String>,
    pub cache_ttl_secs: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            omdb_api_key: None,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub max_iterations: usize,
    pub max_history_messages: usize,
    pub max_history_tokens: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_history_messages: DEFAULT_MAX_MESSAGES,
            max_history_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl ChatConfig {
    pub fn history_limits(&self) -> HistoryLimits {
        HistoryLimits {
            max_messages: self.max_history_messages,
            max_tokens: self.max_history_tokens,
        }
    }
}

impl AppConfig {
    /// Load `{data_path}/config.toml` if present, then apply environment overrides.
    pub fn load(data_path: &Path) -> Result<Self, CatalogError> {
        let path = data_path.join(CONFIG_FILE);
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            Self::from_toml(&raw)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, CatalogError> {
        toml::from_str(raw).map_err(|e| CatalogError::Config(format!("invalid {}: {}", CONFIG_FILE, e)))
    }

    /// Environment wins over the file. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(key) = get("CINELOG_OPENAI_API_KEY") {
            self.planner.api_key = Some(key);
        }
        if let Some(model) = get("CINELOG_OPENAI_MODEL") {
            self.planner.model = model;
        }
        if let Some(base) = get("CINELOG_OPENAI_API_BASE") {
            self.planner.api_base = base;
        }
        if let Some(key) = get("CINELOG_OMDB_API_KEY") {
            self.metadata.omdb_api_key = Some(key);
        }
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.chat.max_iterations == 0 {
            return Err(CatalogError::Config("chat.max_iterations must be at least 1".into()));
        }
        if self.chat.max_history_messages < 2 {
            return Err(CatalogError::Config(
                "chat.max_history_messages must be at least 2".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_when_sections_missing() {
        let config = AppConfig::from_toml("[chat]\nmax_iterations = 3\n").unwrap();
        assert_eq!(config.chat.max_iterations, 3);
        assert_eq!(config.chat.max_history_messages, DEFAULT_MAX_MESSAGES);
        assert_eq!(config.planner.model, "gpt-4o-mini");
        assert!(config.metadata.omdb_api_key.is_none());
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config =
            AppConfig::from_toml("[planner]\nmodel = \"from-file\"\napi_key = \"file-key\"\n")
                .unwrap();
        let env: HashMap<&str, &str> = [
            ("CINELOG_OPENAI_MODEL", "from-env"),
            ("CINELOG_OPENAI_API_KEY", ""),
            ("CINELOG_OMDB_API_KEY", "omdb"),
        ]
        .into();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.planner.model, "from-env");
        assert_eq!(config.planner.api_key.as_deref(), Some("file-key"));
        assert_eq!(config.metadata.omdb_api_key.as_deref(), Some("omdb"));
    }

    #[test]
    fn test_rejects_zero_iterations() {
        let config = AppConfig::from_toml("[chat]\nmax_iterations = 0\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(dir.path()).unwrap();
        assert_eq!(config.chat.max_iterations, DEFAULT_MAX_ITERATIONS);
    }
}
