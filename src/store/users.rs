use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::StoreError;
use crate::models::User;

use super::UnitOfWork;

/// Turn a UNIQUE violation on `users` into a conflict naming the column
fn unique_conflict(e: sqlx::Error) -> StoreError {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() => {
            if db.message().contains("users.email") {
                StoreError::Conflict("Please use a different email address".to_string())
            } else {
                StoreError::Conflict("Please use a different username".to_string())
            }
        }
        _ => StoreError::Database(e),
    }
}

pub async fn insert(
    uow: &mut UnitOfWork,
    username: &str,
    email: &str,
    password_hash: &str,
) -> Result<User, StoreError> {
    let now = Utc::now().to_rfc3339();
    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (username, email, password_hash, created_at) VALUES (?, ?, ?, ?) RETURNING *",
    )
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(&now)
    .fetch_one(uow.conn())
    .await
    .map_err(unique_conflict)?;

    uow.added(user.clone());
    Ok(user)
}

pub async fn update_profile(
    uow: &mut UnitOfWork,
    user_id: i64,
    username: &str,
    about_me: Option<&str>,
) -> Result<User, StoreError> {
    let user = sqlx::query_as::<_, User>(
        "UPDATE users SET username = ?, about_me = ? WHERE id = ? RETURNING *",
    )
    .bind(username)
    .bind(about_me)
    .bind(user_id)
    .fetch_optional(uow.conn())
    .await
    .map_err(unique_conflict)?
    .ok_or(StoreError::NotFound { entity: "user", id: user_id })?;

    uow.updated(user.clone());
    Ok(user)
}

pub async fn touch_last_seen(uow: &mut UnitOfWork, user_id: i64) -> Result<User, StoreError> {
    let now = Utc::now().to_rfc3339();
    let user = sqlx::query_as::<_, User>("UPDATE users SET last_seen = ? WHERE id = ? RETURNING *")
        .bind(&now)
        .bind(user_id)
        .fetch_optional(uow.conn())
        .await?
        .ok_or(StoreError::NotFound { entity: "user", id: user_id })?;

    uow.updated(user.clone());
    Ok(user)
}

pub async fn find_by_username(pool: &SqlitePool, username: &str) -> Result<Option<User>, StoreError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>, StoreError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::*;
    use crate::store::RecordStore;

    #[tokio::test]
    async fn test_register_and_lookup() {
        let pool = memory_pool().await;
        let store = RecordStore::new(pool.clone(), vec![]);

        let mut uow = store.begin().await.unwrap();
        let user = insert(&mut uow, "susan", "susan@example.com", "hash").await.unwrap();
        uow.commit().await.unwrap();

        let by_name = find_by_username(&pool, "susan").await.unwrap().unwrap();
        assert_eq!(by_name.id, user.id);
        assert!(find_by_email(&pool, "susan@example.com").await.unwrap().is_some());
        assert!(find_by_username(&pool, "nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicates_become_conflicts() {
        let pool = memory_pool().await;
        let store = RecordStore::new(pool.clone(), vec![]);

        let mut uow = store.begin().await.unwrap();
        let susan = insert(&mut uow, "susan", "a@example.com", "hash").await.unwrap();
        let john = insert(&mut uow, "john", "j@example.com", "hash").await.unwrap();

        match insert(&mut uow, "susan", "b@example.com", "hash").await {
            Err(StoreError::Conflict(msg)) => assert!(msg.contains("username")),
            other => panic!("expected conflict, got {:?}", other),
        }
        match insert(&mut uow, "sue", "a@example.com", "hash").await {
            Err(StoreError::Conflict(msg)) => assert!(msg.contains("email")),
            other => panic!("expected conflict, got {:?}", other),
        }
        match update_profile(&mut uow, john.id, &susan.username, None).await {
            Err(StoreError::Conflict(msg)) => assert!(msg.contains("username")),
            other => panic!("expected conflict, got {:?}", other),
        }
        uow.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_profile_and_last_seen() {
        let pool = memory_pool().await;
        let store = RecordStore::new(pool.clone(), vec![]);

        let mut uow = store.begin().await.unwrap();
        let user = insert(&mut uow, "susan", "susan@example.com", "hash").await.unwrap();
        uow.commit().await.unwrap();
        assert!(user.last_seen.is_none());

        let mut uow = store.begin().await.unwrap();
        let renamed = update_profile(&mut uow, user.id, "sue", Some("I bake")).await.unwrap();
        let seen = touch_last_seen(&mut uow, user.id).await.unwrap();
        uow.commit().await.unwrap();

        assert_eq!(renamed.username, "sue");
        assert!(seen.last_seen.is_some());
        assert_eq!(seen.about_me.as_deref(), Some("I bake"));
    }
}
