//! Application configuration module
//!
//! Configuration is loaded from `config.json` in the working directory.
//! A default file is written on first run; `DATABASE_URL` and
//! `ELASTICSEARCH_URL` override the file when set.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub search: SearchConfig,
    pub recipes: RecipesConfig,
    pub uploads: UploadConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Session lifetime in days
    pub session_ttl_days: i64,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Data directory path
    pub data_dir: String,
    /// Main database file (relative to data_dir)
    pub db_file: String,
    /// Full connection URL, takes precedence over data_dir/db_file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Which search index backend to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchBackend {
    /// Standalone SQLite search database
    Sqlite,
    /// Remote Elasticsearch server
    Elasticsearch,
    /// In-process index, lost on restart
    Memory,
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub backend: SearchBackend,
    /// Base URL of the Elasticsearch server, e.g. `http://localhost:9200`
    pub elasticsearch_url: Option<String>,
    /// Prepended to the entity type to form the Elasticsearch index name
    pub index_prefix: String,
    /// Timeout for a single index request
    pub request_timeout_secs: u64,
    /// Search database directory (relative to data_dir, empty means data_dir)
    pub db_dir: String,
    /// Search database file name
    pub db_file: String,
    /// Rebuild the recipe index from the database at startup
    pub reindex_on_startup: bool,
}

/// Recipe listing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipesConfig {
    pub per_page: u32,
}

/// Image upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Upload directory (relative to data_dir)
    pub dir: String,
    /// Maximum request body size for uploads, in bytes
    pub max_content_length: usize,
    /// Accepted file extensions, including the leading dot
    pub extensions: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            session_ttl_days: 7,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            db_file: "recipebook.db".to_string(),
            url: None,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            backend: SearchBackend::Sqlite,
            elasticsearch_url: None,
            index_prefix: String::new(),
            request_timeout_secs: 10,
            db_dir: "search".to_string(),
            db_file: "search.db".to_string(),
            reindex_on_startup: false,
        }
    }
}

impl Default for RecipesConfig {
    fn default() -> Self {
        Self { per_page: 5 }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: "images".to_string(),
            max_content_length: 1024 * 1024,
            extensions: [".jpg", ".png", ".gif", ".webp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl AppConfig {
    /// Get the full database URL
    pub fn get_database_url(&self) -> String {
        if let Some(url) = &self.database.url {
            return url.clone();
        }
        let db_path = Path::new(&self.database.data_dir).join(&self.database.db_file);
        format!("sqlite:{}?mode=rwc", db_path.to_string_lossy())
    }

    /// Get the data directory path
    pub fn get_data_dir(&self) -> PathBuf {
        PathBuf::from(&self.database.data_dir)
    }

    /// Get the search database directory
    pub fn get_search_db_dir(&self) -> PathBuf {
        let data_dir = self.get_data_dir();
        if self.search.db_dir.is_empty() {
            data_dir
        } else {
            data_dir.join(&self.search.db_dir)
        }
    }

    /// Get the full search database path
    pub fn get_search_db_path(&self) -> PathBuf {
        self.get_search_db_dir().join(&self.search.db_file)
    }

    /// Get the image upload directory
    pub fn get_upload_dir(&self) -> PathBuf {
        self.get_data_dir().join(&self.uploads.dir)
    }

    /// Get the server bind address
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Apply environment overrides on top of the file configuration.
    ///
    /// `ELASTICSEARCH_URL` switches the backend to Elasticsearch; empty
    /// values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL").filter(|u| !u.trim().is_empty()) {
            self.database.url = Some(url);
        }
        if let Some(url) = lookup("ELASTICSEARCH_URL").filter(|u| !u.trim().is_empty()) {
            self.search.elasticsearch_url = Some(url);
            self.search.backend = SearchBackend::Elasticsearch;
        }
    }
}

/// `config.json` in the working directory
pub fn default_config_path() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("config.json")
}

/// Read `path`, writing the defaults there first if it does not exist.
/// Environment overrides are applied to the returned value only.
pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {:?}", path))?;
        let config: AppConfig = serde_json::from_str(&content)
            .with_context(|| format!("parsing {:?}", path))?;
        tracing::info!("Loaded configuration from {:?}", path);
        config
    } else {
        let config = AppConfig::default();
        save_config(path, &config)?;
        tracing::info!("Wrote default configuration to {:?}", path);
        config
    };

    config.apply_env_overrides(|key| std::env::var(key).ok());
    Ok(config)
}

pub fn save_config(path: &Path, config: &AppConfig) -> anyhow::Result<()> {
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content).with_context(|| format!("writing {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.recipes.per_page, 5);
        assert_eq!(config.uploads.max_content_length, 1024 * 1024);
        assert_eq!(config.search.backend, SearchBackend::Sqlite);
        assert!(config.uploads.extensions.contains(&".webp".to_string()));
        assert_eq!(config.get_bind_address(), "0.0.0.0:5000");
    }

    #[test]
    fn test_paths() {
        let config = AppConfig::default();
        assert_eq!(config.get_search_db_path(), PathBuf::from("data/search/search.db"));
        assert_eq!(config.get_upload_dir(), PathBuf::from("data/images"));
        assert_eq!(config.get_database_url(), "sqlite:data/recipebook.db?mode=rwc");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"search": {"backend": "memory"}, "recipes": {"per_page": 10}}"#)
                .unwrap();
        assert_eq!(config.search.backend, SearchBackend::Memory);
        assert_eq!(config.search.request_timeout_secs, 10);
        assert_eq!(config.recipes.per_page, 10);
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn test_elasticsearch_env_override() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(|key| match key {
            "ELASTICSEARCH_URL" => Some("http://localhost:9200".to_string()),
            _ => None,
        });
        assert_eq!(config.search.backend, SearchBackend::Elasticsearch);
        assert_eq!(config.search.elasticsearch_url.as_deref(), Some("http://localhost:9200"));

        let mut config = AppConfig::default();
        config.apply_env_overrides(|_| Some("   ".to_string()));
        assert_eq!(config.search.backend, SearchBackend::Sqlite);
        assert!(config.database.url.is_none());
    }

    #[test]
    fn test_database_url_override() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(|key| match key {
            "DATABASE_URL" => Some("sqlite::memory:".to_string()),
            _ => None,
        });
        assert_eq!(config.get_database_url(), "sqlite::memory:");
    }

    #[test]
    fn test_load_writes_defaults_then_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let first = load_config(&path).unwrap();
        assert!(path.exists());
        assert_eq!(first.recipes.per_page, 5);

        let mut edited = first.clone();
        edited.recipes.per_page = 12;
        save_config(&path, &edited).unwrap();
        assert_eq!(load_config(&path).unwrap().recipes.per_page, 12);
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load_config(&path).is_err());
    }
}
