use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use tower_cookies::Cookies;

use recipebook::error::AppError;
use recipebook::models::{Session, User};
use recipebook::store::users;
use recipebook::utils::generate_token;

use crate::state::AppState;

pub const SESSION_COOKIE_NAME: &str = "recipebook_session";
const SESSION_TOKEN_LENGTH: usize = 64;

/// Create a session for `user_id` valid for `ttl_days`
pub async fn create_session(pool: &SqlitePool, user_id: i64, ttl_days: i64) -> Result<Session, AppError> {
    let now = Utc::now();
    let session = Session {
        id: generate_token(SESSION_TOKEN_LENGTH),
        user_id,
        expires_at: (now + Duration::days(ttl_days)).to_rfc3339(),
        created_at: now.to_rfc3339(),
    };

    sqlx::query("INSERT INTO sessions (id, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)")
        .bind(&session.id)
        .bind(session.user_id)
        .bind(&session.expires_at)
        .bind(&session.created_at)
        .execute(pool)
        .await?;

    // Drop this user's expired sessions while we're here
    sqlx::query("DELETE FROM sessions WHERE user_id = ? AND expires_at <= ?")
        .bind(user_id)
        .bind(now.to_rfc3339())
        .execute(pool)
        .await?;

    Ok(session)
}

pub async fn delete_session(pool: &SqlitePool, token: &str) -> Result<(), AppError> {
    sqlx::query("DELETE FROM sessions WHERE id = ?")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}

/// User owning a live session
pub async fn session_user(pool: &SqlitePool, token: &str) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(
        "SELECT u.* FROM users u
         JOIN sessions s ON u.id = s.user_id
         WHERE s.id = ? AND s.expires_at > ?",
    )
    .bind(token)
    .bind(Utc::now().to_rfc3339())
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

/// Resolve the signed-in user from the session cookie and record the visit
pub async fn require_user(state: &AppState, cookies: &Cookies) -> Result<User, AppError> {
    let token = cookies
        .get(SESSION_COOKIE_NAME)
        .map(|c| c.value().to_string())
        .ok_or(AppError::Unauthorized)?;

    let user = session_user(&state.db, &token)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let mut uow = state.store.begin().await?;
    let user = users::touch_last_seen(&mut uow, user.id).await?;
    uow.commit().await?;

    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn pool_with_user() -> (SqlitePool, i64) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        recipebook::db::run_migrations(&pool).await.unwrap();
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO users (username, email, password_hash, created_at) VALUES ('susan', 'susan@example.com', 'x', '2024-01-01T00:00:00Z') RETURNING id",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        (pool, id)
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let (pool, user_id) = pool_with_user().await;

        let session = create_session(&pool, user_id, 7).await.unwrap();
        assert_eq!(session.id.len(), SESSION_TOKEN_LENGTH);

        let user = session_user(&pool, &session.id).await.unwrap().unwrap();
        assert_eq!(user.username, "susan");

        delete_session(&pool, &session.id).await.unwrap();
        assert!(session_user(&pool, &session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_rejected() {
        let (pool, user_id) = pool_with_user().await;
        let session = create_session(&pool, user_id, -1).await.unwrap();
        assert!(session_user(&pool, &session.id).await.unwrap().is_none());
        assert!(session_user(&pool, "unknown").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_require_user_touches_last_seen() {
        let dir = tempfile::tempdir().unwrap();
        let state = crate::state::testing::test_state(dir.path()).await;
        let (user, cookies) = crate::state::testing::sign_in(&state, "susan").await;
        assert!(user.last_seen.is_none());

        let seen = require_user(&state, &cookies).await.unwrap();
        assert_eq!(seen.id, user.id);
        assert!(seen.last_seen.is_some());

        let stored = users::find_by_username(&state.db, "susan").await.unwrap().unwrap();
        assert_eq!(stored.last_seen, seen.last_seen);
    }

    #[tokio::test]
    async fn test_require_user_rejects_missing_or_unknown_session() {
        let dir = tempfile::tempdir().unwrap();
        let state = crate::state::testing::test_state(dir.path()).await;

        let cookies = Cookies::default();
        assert!(matches!(require_user(&state, &cookies).await, Err(AppError::Unauthorized)));

        cookies.add(tower_cookies::Cookie::new(SESSION_COOKIE_NAME, "not-a-session"));
        assert!(matches!(require_user(&state, &cookies).await, Err(AppError::Unauthorized)));
    }
}
