//! SQLite search index
//!
//! Storage:
//! - standalone database file, separate from the main database, WAL mode
//! - search_documents: one row per (entity_type, entity_id, field)
//! - content_lower is the normalized text used for LIKE matching
//!
//! Scoring per field: exact 100, prefix 80, word prefix 60, contains 30.
//! A document takes its best field score; ties go to shorter content,
//! then lower id.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};

use super::tokenizer::normalize_for_search;
use super::{check_page, page_offset, SearchFields, SearchIndex, SearchPage};
use crate::error::SearchError;
use crate::utils::escape_like;

const MAX_RETRIES: u32 = 3;

pub struct SqliteIndex {
    db: Pool<Sqlite>,
}

impl SqliteIndex {
    /// Open (or create) the search database at `db_path`
    pub async fn open(db_path: &Path) -> Result<Self, SearchError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.to_string_lossy());

        let db = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&db_url)
            .await?;

        sqlx::query("PRAGMA journal_mode=WAL").execute(&db).await?;
        sqlx::query("PRAGMA busy_timeout=5000").execute(&db).await?;
        sqlx::query("PRAGMA synchronous=NORMAL").execute(&db).await?;

        tracing::info!("Search database opened: {:?} (WAL mode)", db_path);

        Ok(Self { db })
    }

    /// Use an existing connection pool
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    /// Create tables if missing. Existing data is kept.
    pub async fn init(&self) -> Result<(), SearchError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS search_documents (
                entity_type TEXT NOT NULL,
                entity_id INTEGER NOT NULL,
                field TEXT NOT NULL,
                content TEXT NOT NULL,
                content_lower TEXT NOT NULL,
                PRIMARY KEY(entity_type, entity_id, field)
            ) WITHOUT ROWID
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_search_content ON search_documents(entity_type, content_lower)",
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS search_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Close the connection pool
    pub async fn close(&self) {
        self.db.close().await;
    }

    async fn set_last_updated(&self) -> Result<(), SearchError> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query("INSERT OR REPLACE INTO search_meta (key, value) VALUES ('last_updated', ?)")
            .bind(now.to_string())
            .execute(&self.db)
            .await?;
        Ok(())
    }

    /// Unix time of the last write, if any
    pub async fn get_last_updated(&self) -> Option<i64> {
        let result: Option<(String,)> =
            sqlx::query_as("SELECT value FROM search_meta WHERE key = 'last_updated'")
                .fetch_optional(&self.db)
                .await
                .ok()
                .flatten();

        result.and_then(|(v,)| v.parse::<i64>().ok())
    }

    pub async fn document_count(&self, entity_type: &str) -> Result<u64, SearchError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT entity_id) FROM search_documents WHERE entity_type = ?",
        )
        .bind(entity_type)
        .fetch_one(&self.db)
        .await?;
        Ok(count as u64)
    }

    async fn do_upsert(&self, entity_type: &str, id: i64, fields: &SearchFields) -> Result<(), sqlx::Error> {
        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM search_documents WHERE entity_type = ? AND entity_id = ?")
            .bind(entity_type)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        for (field, content) in fields {
            sqlx::query(
                "INSERT INTO search_documents (entity_type, entity_id, field, content, content_lower) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(entity_type)
            .bind(id)
            .bind(field)
            .bind(content)
            .bind(normalize_for_search(content))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }

    async fn do_delete(&self, entity_type: &str, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM search_documents WHERE entity_type = ? AND entity_id = ?")
            .bind(entity_type)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}

/// Busy or locked database, worth another attempt
fn is_locked(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db_err) => {
            let msg = db_err.message();
            msg.contains("database is locked") || msg.contains("SQLITE_BUSY") || msg.contains("busy")
        }
        sqlx::Error::PoolTimedOut => true,
        _ => false,
    }
}

/// Run a write, retrying while the database is locked
async fn with_retry<F, Fut>(mut op: F) -> Result<(), SearchError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<(), sqlx::Error>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(()) => return Ok(()),
            Err(e) if is_locked(&e) && attempt + 1 < MAX_RETRIES => {
                attempt += 1;
                let delay = 100 * attempt as u64;
                tracing::debug!(
                    "Search database locked, retrying in {}ms (attempt {}/{})",
                    delay,
                    attempt,
                    MAX_RETRIES
                );
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

#[async_trait]
impl SearchIndex for SqliteIndex {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn upsert(&self, entity_type: &str, id: i64, fields: &SearchFields) -> Result<(), SearchError> {
        with_retry(move || self.do_upsert(entity_type, id, fields)).await?;
        self.set_last_updated().await
    }

    async fn delete(&self, entity_type: &str, id: i64) -> Result<(), SearchError> {
        with_retry(move || self.do_delete(entity_type, id)).await?;
        self.set_last_updated().await
    }

    async fn query(
        &self,
        entity_type: &str,
        phrase: &str,
        page: u32,
        per_page: u32,
    ) -> Result<SearchPage, SearchError> {
        check_page(page, per_page)?;

        let query_lower = normalize_for_search(phrase);
        if query_lower.is_empty() {
            return Ok(SearchPage::empty());
        }

        let escaped = escape_like(&query_lower);
        let prefix_pattern = format!("{}%", escaped);
        let word_prefix_pattern = format!("% {}%", escaped);
        let like_pattern = format!("%{}%", escaped);

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(DISTINCT entity_id) FROM search_documents
            WHERE entity_type = ? AND content_lower LIKE ? ESCAPE '\'
            "#,
        )
        .bind(entity_type)
        .bind(&like_pattern)
        .fetch_one(&self.db)
        .await?;

        if total == 0 {
            return Ok(SearchPage::empty());
        }

        let rows = sqlx::query(
            r#"
            SELECT entity_id,
                MAX(CASE
                    WHEN content_lower = ? THEN 100
                    WHEN content_lower LIKE ? ESCAPE '\' THEN 80
                    WHEN content_lower LIKE ? ESCAPE '\' THEN 60
                    ELSE 30
                END) AS score,
                MIN(length(content)) AS len
            FROM search_documents
            WHERE entity_type = ? AND content_lower LIKE ? ESCAPE '\'
            GROUP BY entity_id
            ORDER BY score DESC, len ASC, entity_id ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(&query_lower)
        .bind(&prefix_pattern)
        .bind(&word_prefix_pattern)
        .bind(entity_type)
        .bind(&like_pattern)
        .bind(per_page as i64)
        .bind(page_offset(page, per_page) as i64)
        .fetch_all(&self.db)
        .await?;

        let ids = rows.iter().map(|row| row.get::<i64, _>("entity_id")).collect();

        Ok(SearchPage { ids, total: total as u64 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_index() -> SqliteIndex {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let index = SqliteIndex::new(pool);
        index.init().await.unwrap();
        index
    }

    fn title(text: &str) -> SearchFields {
        let mut fields = SearchFields::new();
        fields.insert("title".to_string(), text.to_string());
        fields
    }

    #[tokio::test]
    async fn test_scoring_order() {
        let index = memory_index().await;
        index.upsert("recipe", 1, &title("Apple pie")).await.unwrap();
        index.upsert("recipe", 2, &title("Pie")).await.unwrap();
        index.upsert("recipe", 3, &title("Cherry pie crust")).await.unwrap();
        index.upsert("recipe", 4, &title("Piece of cake")).await.unwrap();
        index.upsert("recipe", 5, &title("Soup")).await.unwrap();

        let page = index.query("recipe", "pie", 1, 10).await.unwrap();
        assert_eq!(page.total, 4);
        // exact, prefix, then word prefix by length
        assert_eq!(page.ids, vec![2, 4, 1, 3]);
    }

    #[tokio::test]
    async fn test_upsert_replaces_previous_fields() {
        let index = memory_index().await;
        index.upsert("recipe", 1, &title("Pancakes")).await.unwrap();
        index.upsert("recipe", 1, &title("Waffles")).await.unwrap();

        assert_eq!(index.query("recipe", "pancake", 1, 5).await.unwrap().total, 0);
        assert_eq!(index.query("recipe", "waffles", 1, 5).await.unwrap().ids, vec![1]);
        assert_eq!(index.document_count("recipe").await.unwrap(), 1);
        assert!(index.get_last_updated().await.is_some());
    }

    #[tokio::test]
    async fn test_delete_missing_is_noop() {
        let index = memory_index().await;
        index.delete("recipe", 42).await.unwrap();
        index.upsert("recipe", 1, &title("Bread")).await.unwrap();
        index.delete("recipe", 1).await.unwrap();
        index.delete("recipe", 1).await.unwrap();
        assert_eq!(index.query("recipe", "bread", 1, 5).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_like_wildcards_are_literal() {
        let index = memory_index().await;
        index.upsert("recipe", 1, &title("100% rye")).await.unwrap();
        index.upsert("recipe", 2, &title("Rye bread")).await.unwrap();

        let page = index.query("recipe", "%", 1, 5).await.unwrap();
        assert_eq!(page.ids, vec![1]);
        let page = index.query("recipe", "_", 1, 5).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_pagination() {
        let index = memory_index().await;
        for id in 1..=6 {
            index.upsert("recipe", id, &title("bread")).await.unwrap();
        }

        let page = index.query("recipe", "bread", 2, 4).await.unwrap();
        assert_eq!(page.total, 6);
        assert_eq!(page.ids, vec![5, 6]);
        assert!(matches!(
            index.query("recipe", "bread", 1, 0).await,
            Err(SearchError::InvalidPage { .. })
        ));
    }

    #[tokio::test]
    async fn test_open_persists_between_runs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("search").join("search.db");

        let index = SqliteIndex::open(&path).await.unwrap();
        index.init().await.unwrap();
        index.upsert("recipe", 7, &title("Lemon tart")).await.unwrap();
        index.close().await;

        let reopened = SqliteIndex::open(&path).await.unwrap();
        reopened.init().await.unwrap();
        assert_eq!(reopened.query("recipe", "lemon", 1, 5).await.unwrap().ids, vec![7]);
    }
}
