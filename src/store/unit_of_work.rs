//! Transactional unit of work with commit observers
//!
//! Writes go through `UnitOfWork::conn()`; every row touched is then
//! tracked with `added`, `updated` or `deleted`. On commit each observer
//! first captures a change set from the pending records, the transaction
//! commits, and only then are the captured change sets replayed.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Sqlite, SqliteConnection, Transaction};

use crate::error::{SearchError, StoreError};
use crate::search::SearchDocument;

use super::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Updated,
    Deleted,
}

/// Records touched by a unit of work, one entry per (entity type, id)
#[derive(Debug, Default)]
pub struct PendingChanges {
    entries: BTreeMap<(&'static str, i64), (ChangeKind, Box<dyn Record>)>,
}

impl PendingChanges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a record, folding it into any earlier entry for the same key.
    ///
    /// added + updated stays added with the newer snapshot; added + deleted
    /// drops the entry since the row never existed outside this unit;
    /// updated + deleted becomes deleted.
    pub fn track(&mut self, kind: ChangeKind, record: Box<dyn Record>) {
        let key = (record.entity_type(), record.id());

        let merged = match (self.entries.get(&key).map(|(k, _)| *k), kind) {
            (None, kind) => Some(kind),
            (Some(ChangeKind::Added), ChangeKind::Deleted) => None,
            (Some(ChangeKind::Added), _) => Some(ChangeKind::Added),
            (Some(ChangeKind::Updated), kind) => Some(kind),
            (Some(ChangeKind::Deleted), ChangeKind::Deleted) => Some(ChangeKind::Deleted),
            // Row reappeared after a delete in the same unit
            (Some(ChangeKind::Deleted), _) => Some(ChangeKind::Updated),
        };

        match merged {
            Some(kind) => {
                self.entries.insert(key, (kind, record));
            }
            None => {
                self.entries.remove(&key);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChangeKind, &dyn Record)> {
        self.entries.values().map(|(kind, record)| (*kind, record.as_ref()))
    }

    pub fn kind_of(&self, entity_type: &str, id: i64) -> Option<ChangeKind> {
        self.entries
            .iter()
            .find(|((t, i), _)| *t == entity_type && *i == id)
            .map(|(_, (kind, _))| *kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Index reference of a deleted record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    pub entity_type: String,
    pub id: i64,
}

/// Searchable changes of one commit, captured before the commit and
/// replayed after it. Owned by value; nothing is shared between commits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub added: Vec<SearchDocument>,
    pub updated: Vec<SearchDocument>,
    pub deleted: Vec<DocumentRef>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.updated.len() + self.deleted.len()
    }
}

/// Hook pair run around every commit
#[async_trait]
pub trait CommitObserver: Send + Sync {
    /// Runs before the transaction commits. Must not fail.
    fn capture(&self, pending: &PendingChanges) -> ChangeSet;

    /// Runs after the transaction is durable
    async fn replay(&self, change_set: ChangeSet) -> Result<(), SearchError>;
}

pub type Observers = Arc<[Arc<dyn CommitObserver>]>;

pub struct UnitOfWork {
    tx: Transaction<'static, Sqlite>,
    pending: PendingChanges,
    observers: Observers,
}

impl UnitOfWork {
    pub(crate) fn new(tx: Transaction<'static, Sqlite>, observers: Observers) -> Self {
        Self {
            tx,
            pending: PendingChanges::new(),
            observers,
        }
    }

    /// Connection bound to this unit's transaction
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    pub fn added<R: Record + 'static>(&mut self, record: R) {
        self.pending.track(ChangeKind::Added, Box::new(record));
    }

    pub fn updated<R: Record + 'static>(&mut self, record: R) {
        self.pending.track(ChangeKind::Updated, Box::new(record));
    }

    pub fn deleted<R: Record + 'static>(&mut self, record: R) {
        self.pending.track(ChangeKind::Deleted, Box::new(record));
    }

    pub fn pending(&self) -> &PendingChanges {
        &self.pending
    }

    /// Commit and replay captured changes to every observer.
    ///
    /// A replay failure is reported as `StoreError::IndexSync`; the data is
    /// already committed at that point. All observers are replayed even if
    /// an earlier one fails.
    pub async fn commit(self) -> Result<(), StoreError> {
        let UnitOfWork {
            tx,
            pending,
            observers,
        } = self;

        let change_sets: Vec<ChangeSet> = observers.iter().map(|o| o.capture(&pending)).collect();
        drop(pending);

        tx.commit().await?;

        let mut first_error = None;
        for (observer, change_set) in observers.iter().zip(change_sets) {
            if change_set.is_empty() {
                continue;
            }
            if let Err(e) = observer.replay(change_set).await {
                tracing::error!("Post-commit replay failed: {}", e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(StoreError::IndexSync(e)),
            None => Ok(()),
        }
    }

    /// Discard all writes. Observers are never invoked.
    pub async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
