use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Errors raised by a search index backend
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("search index unreachable: {0}")]
    Unreachable(String),

    #[error("malformed search index response: {0}")]
    MalformedResponse(String),

    #[error("search index rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid pagination: page={page}, per_page={per_page}")]
    InvalidPage { page: u32, per_page: u32 },

    #[error("search storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

/// Errors raised by the record store and the unit of work
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// A unique constraint rejected the write
    #[error("{0}")]
    Conflict(String),

    /// The transaction committed, but replaying it into the index failed
    #[error("changes saved, but the search index was not updated: {0}")]
    IndexSync(#[source] SearchError),

    #[error(transparent)]
    Search(#[from] SearchError),
}

/// Errors returned by HTTP handlers
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("not signed in")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    TooManyRequests(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Store(StoreError::Database(e))
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Store(StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
            AppError::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
            AppError::Store(StoreError::Search(SearchError::InvalidPage { .. }))
            | AppError::Search(SearchError::InvalidPage { .. }) => StatusCode::BAD_REQUEST,
            AppError::Store(StoreError::IndexSync(_)) | AppError::Store(StoreError::Search(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Search(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Store(StoreError::Database(_)) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        let message = match &self {
            // Don't leak SQL details to clients
            AppError::Store(StoreError::Database(_)) | AppError::Internal(_) => {
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::from(StoreError::NotFound { entity: "recipe", id: 3 }).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(StoreError::IndexSync(SearchError::Unreachable("down".into()))).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::from(SearchError::InvalidPage { page: 0, per_page: 5 }).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(StoreError::from(SearchError::InvalidPage { page: 1, per_page: 0 })).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(StoreError::Conflict("taken".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(sqlx::Error::RowNotFound).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_index_sync_message_mentions_saved_data() {
        let err = StoreError::IndexSync(SearchError::Unreachable("connection refused".into()));
        assert!(err.to_string().starts_with("changes saved"));
    }
}
