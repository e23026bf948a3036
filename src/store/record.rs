use std::fmt;

use sqlx::sqlite::SqliteRow;
use sqlx::FromRow;

use crate::search::SearchFields;

/// A persisted row the unit of work can track
///
/// Searchability is opt-in: a record advertises it through `is_searchable`
/// and hands over its indexed fields through `searchable_fields`.
pub trait Record: Send + Sync + fmt::Debug {
    /// Stable type name, also used as the search index namespace
    fn entity_type(&self) -> &'static str;

    fn id(&self) -> i64;

    fn is_searchable(&self) -> bool {
        false
    }

    /// Searchable projection. `None` means the fields could not be produced
    /// and the record is left out of index sync.
    fn searchable_fields(&self) -> Option<SearchFields> {
        None
    }
}

/// A record backed by its own table, loadable by id
pub trait Model: Record + for<'r> FromRow<'r, SqliteRow> + Send + Unpin + Clone + 'static {
    const TABLE: &'static str;
    const ENTITY_TYPE: &'static str;
}
