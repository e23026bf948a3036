//! Search module - index primitives only, no flow control
//!
//! Architecture principles:
//! - Backends only expose primitive operations: upsert, delete, query
//! - The sync coordinator decides what to index and when
//! - Call direction: coordinator → search (unidirectional)
//!
//! Backends:
//! - SQLite index: standalone database, LIKE queries + index acceleration (default)
//! - Elasticsearch: remote full-text server over HTTP
//! - Memory index: in-process inverted index, used by tests and throwaway setups

pub mod db_index;
pub mod elasticsearch;
pub mod engine;
pub mod tokenizer;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{AppConfig, SearchBackend};
use crate::error::SearchError;

pub use db_index::SqliteIndex;
pub use elasticsearch::ElasticsearchIndex;
pub use engine::MemoryIndex;

/// Searchable projection of a record: field name -> text
pub type SearchFields = BTreeMap<String, String>;

/// One index entry, keyed by (entity_type, id)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchDocument {
    pub entity_type: String,
    pub id: i64,
    pub fields: SearchFields,
}

/// One page of ranked ids plus the total match count across all pages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchPage {
    pub ids: Vec<i64>,
    pub total: u64,
}

impl SearchPage {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Search index adapter
///
/// Implementations must make `upsert` last-write-wins per (entity_type, id)
/// and `delete` a no-op for ids that are not indexed.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Backend name, for logs and the health endpoint
    fn name(&self) -> &'static str;

    async fn upsert(&self, entity_type: &str, id: i64, fields: &SearchFields) -> Result<(), SearchError>;

    async fn delete(&self, entity_type: &str, id: i64) -> Result<(), SearchError>;

    /// Ranked ids matching `phrase`, relevance descending. `page` is 1-indexed.
    async fn query(
        &self,
        entity_type: &str,
        phrase: &str,
        page: u32,
        per_page: u32,
    ) -> Result<SearchPage, SearchError>;
}

/// Reject page or page size of zero
pub fn check_page(page: u32, per_page: u32) -> Result<(), SearchError> {
    if page == 0 || per_page == 0 {
        return Err(SearchError::InvalidPage { page, per_page });
    }
    Ok(())
}

/// Row offset of the first result on `page`
pub fn page_offset(page: u32, per_page: u32) -> u64 {
    (page.saturating_sub(1) as u64) * per_page as u64
}

/// Open the backend selected by the configuration
pub async fn open_index(config: &AppConfig) -> anyhow::Result<Arc<dyn SearchIndex>> {
    let index: Arc<dyn SearchIndex> = match config.search.backend {
        SearchBackend::Sqlite => {
            let idx = SqliteIndex::open(&config.get_search_db_path()).await?;
            idx.init().await?;
            Arc::new(idx)
        }
        SearchBackend::Elasticsearch => {
            let url = config
                .search
                .elasticsearch_url
                .clone()
                .ok_or_else(|| anyhow::anyhow!("search.backend is elasticsearch but no elasticsearch_url is set"))?;
            Arc::new(ElasticsearchIndex::new(
                &url,
                &config.search.index_prefix,
                std::time::Duration::from_secs(config.search.request_timeout_secs),
            )?)
        }
        SearchBackend::Memory => Arc::new(MemoryIndex::new()),
    };

    tracing::info!("Search index backend: {}", index.name());
    Ok(index)
}
