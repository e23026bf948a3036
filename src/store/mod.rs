//! Record store - relational persistence on SQLite
//!
//! Reads go straight to the pool; writes go through a `UnitOfWork`
//! obtained from `RecordStore::begin`, which carries the commit observers
//! the store was built with.

pub mod ingredients;
pub mod recipes;
mod record;
pub mod unit_of_work;
pub mod users;

use std::collections::HashMap;
use std::sync::Arc;

use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::error::StoreError;

pub use record::{Model, Record};
pub use unit_of_work::{
    ChangeKind, ChangeSet, CommitObserver, DocumentRef, Observers, PendingChanges, UnitOfWork,
};

#[derive(Clone)]
pub struct RecordStore {
    pool: SqlitePool,
    observers: Observers,
}

impl RecordStore {
    pub fn new(pool: SqlitePool, observers: Vec<Arc<dyn CommitObserver>>) -> Self {
        Self {
            pool,
            observers: observers.into(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start a unit of work
    pub async fn begin(&self) -> Result<UnitOfWork, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(UnitOfWork::new(tx, self.observers.clone()))
    }

    pub async fn select_all<T: Model>(&self) -> Result<Vec<T>, StoreError> {
        select_all(&self.pool).await
    }

    pub async fn select_by_id<T: Model>(&self, id: i64) -> Result<Option<T>, StoreError> {
        select_by_id(&self.pool, id).await
    }

    /// Like `select_by_id` but a missing row is an error
    pub async fn get<T: Model>(&self, id: i64) -> Result<T, StoreError> {
        self.select_by_id(id)
            .await?
            .ok_or(StoreError::NotFound { entity: T::ENTITY_TYPE, id })
    }

    pub async fn select_by_ids<T: Model>(&self, ids: &[i64]) -> Result<HashMap<i64, T>, StoreError> {
        select_by_ids(&self.pool, ids).await
    }
}

pub async fn select_all<T: Model>(pool: &SqlitePool) -> Result<Vec<T>, StoreError> {
    let sql = format!("SELECT * FROM {} ORDER BY id", T::TABLE);
    let rows = sqlx::query_as::<_, T>(&sql).fetch_all(pool).await?;
    Ok(rows)
}

pub async fn select_by_id<T: Model>(pool: &SqlitePool, id: i64) -> Result<Option<T>, StoreError> {
    let sql = format!("SELECT * FROM {} WHERE id = ?", T::TABLE);
    let row = sqlx::query_as::<_, T>(&sql).bind(id).fetch_optional(pool).await?;
    Ok(row)
}

/// Load rows by id, keyed by id. Missing ids are absent from the map.
pub async fn select_by_ids<T: Model>(
    pool: &SqlitePool,
    ids: &[i64],
) -> Result<HashMap<i64, T>, StoreError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT * FROM {} WHERE id IN (", T::TABLE));
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");

    let rows: Vec<T> = builder.build_query_as::<T>().fetch_all(pool).await?;
    Ok(rows.into_iter().map(|row| (row.id(), row)).collect())
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::models::{Recipe, User};

    #[tokio::test]
    async fn test_select_by_ids_skips_missing() {
        let pool = memory_pool().await;
        let user_id = seed_user(&pool, "susan").await;
        let store = RecordStore::new(pool.clone(), vec![]);

        let mut uow = store.begin().await.unwrap();
        let a = recipes::insert(&mut uow, user_id, "Pancakes").await.unwrap();
        let b = recipes::insert(&mut uow, user_id, "Soup").await.unwrap();
        uow.commit().await.unwrap();

        let found = store.select_by_ids::<Recipe>(&[b.id, 999, a.id]).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[&a.id].title, "Pancakes");
        assert!(store.select_by_ids::<Recipe>(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let pool = memory_pool().await;
        let store = RecordStore::new(pool, vec![]);
        let err = store.get::<User>(42).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "user", id: 42 }));
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let pool = memory_pool().await;
        let user_id = seed_user(&pool, "susan").await;
        let store = RecordStore::new(pool, vec![]);

        let mut uow = store.begin().await.unwrap();
        recipes::insert(&mut uow, user_id, "Pancakes").await.unwrap();
        uow.rollback().await.unwrap();

        assert!(store.select_all::<Recipe>().await.unwrap().is_empty());
    }
}
