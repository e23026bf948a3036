//! Search index synchronization
//!
//! `SearchCoordinator` is registered as a commit observer on the record
//! store. Before a commit it captures the searchable changes of the unit of
//! work; after the commit is durable it replays them into the index.
//! Rolled-back units never reach the index.
//!
//! It also serves search reads: ranked ids come from the index, records
//! come from the database, in index order.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::error::{SearchError, StoreError};
use crate::search::{check_page, SearchDocument, SearchIndex};
use crate::store::{self, ChangeKind, ChangeSet, CommitObserver, DocumentRef, Model, PendingChanges};

pub struct SearchCoordinator {
    index: Arc<dyn SearchIndex>,
    pool: SqlitePool,
}

impl SearchCoordinator {
    pub fn new(index: Arc<dyn SearchIndex>, pool: SqlitePool) -> Self {
        Self { index, pool }
    }

    pub fn index(&self) -> &Arc<dyn SearchIndex> {
        &self.index
    }

    /// Partition pending records into searchable added, updated and deleted
    /// sets. Non-searchable records are ignored; a searchable record whose
    /// fields cannot be produced is skipped.
    pub fn capture_change_set(&self, pending: &PendingChanges) -> ChangeSet {
        let mut change_set = ChangeSet::default();

        for (kind, record) in pending.iter() {
            if !record.is_searchable() {
                continue;
            }

            match kind {
                ChangeKind::Deleted => change_set.deleted.push(DocumentRef {
                    entity_type: record.entity_type().to_string(),
                    id: record.id(),
                }),
                ChangeKind::Added | ChangeKind::Updated => {
                    let Some(fields) = record.searchable_fields() else {
                        tracing::warn!(
                            "Skipping {} {}: searchable fields unavailable",
                            record.entity_type(),
                            record.id()
                        );
                        continue;
                    };
                    let doc = SearchDocument {
                        entity_type: record.entity_type().to_string(),
                        id: record.id(),
                        fields,
                    };
                    if kind == ChangeKind::Added {
                        change_set.added.push(doc);
                    } else {
                        change_set.updated.push(doc);
                    }
                }
            }
        }

        change_set
    }

    /// Apply a captured change set to the index. Every entry is attempted;
    /// the first failure is returned.
    pub async fn replay_change_set(&self, change_set: ChangeSet) -> Result<(), SearchError> {
        let mut first_error = None;

        for doc in change_set.added.iter().chain(change_set.updated.iter()) {
            if let Err(e) = self.index.upsert(&doc.entity_type, doc.id, &doc.fields).await {
                tracing::warn!("Index upsert failed for {} {}: {}", doc.entity_type, doc.id, e);
                first_error.get_or_insert(e);
            }
        }

        for doc in &change_set.deleted {
            if let Err(e) = self.index.delete(&doc.entity_type, doc.id).await {
                tracing::warn!("Index delete failed for {} {}: {}", doc.entity_type, doc.id, e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Upsert every persisted `T` into the index. Returns the number of
    /// documents written. Safe to run repeatedly.
    pub async fn reindex_all<T: Model>(&self) -> Result<usize, StoreError> {
        let records: Vec<T> = store::select_all(&self.pool).await?;
        let mut written = 0;

        for record in &records {
            let Some(fields) = record.searchable_fields() else {
                continue;
            };
            self.index.upsert(T::ENTITY_TYPE, record.id(), &fields).await?;
            written += 1;
        }

        tracing::info!(
            "Reindexed {} {} documents into {}",
            written,
            T::ENTITY_TYPE,
            self.index.name()
        );
        Ok(written)
    }

    /// Search `T` by phrase. Returns one page of records in the index's
    /// rank order together with the index's total match count.
    pub async fn search<T: Model>(
        &self,
        phrase: &str,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<T>, u64), StoreError> {
        check_page(page, per_page)?;

        let result = self.index.query(T::ENTITY_TYPE, phrase, page, per_page).await?;
        if result.total == 0 {
            return Ok((Vec::new(), 0));
        }

        let mut by_id = store::select_by_ids::<T>(&self.pool, &result.ids).await?;

        let records: Vec<T> = result
            .ids
            .iter()
            .filter_map(|id| {
                let record = by_id.remove(id);
                if record.is_none() {
                    tracing::debug!("Index returned stale {} {}", T::ENTITY_TYPE, id);
                }
                record
            })
            .collect();

        Ok((records, result.total))
    }
}

#[async_trait]
impl CommitObserver for SearchCoordinator {
    fn capture(&self, pending: &PendingChanges) -> ChangeSet {
        self.capture_change_set(pending)
    }

    async fn replay(&self, change_set: ChangeSet) -> Result<(), SearchError> {
        tracing::debug!("Replaying {} index changes", change_set.len());
        self.replay_change_set(change_set).await
    }
}
