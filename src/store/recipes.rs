use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::StoreError;
use crate::models::Recipe;

use super::UnitOfWork;

pub async fn insert(uow: &mut UnitOfWork, user_id: i64, title: &str) -> Result<Recipe, StoreError> {
    let now = Utc::now().to_rfc3339();
    let recipe = sqlx::query_as::<_, Recipe>(
        "INSERT INTO recipes (title, timestamp, user_id) VALUES (?, ?, ?) RETURNING *",
    )
    .bind(title)
    .bind(&now)
    .bind(user_id)
    .fetch_one(uow.conn())
    .await?;

    uow.added(recipe.clone());
    Ok(recipe)
}

fn tracked(uow: &mut UnitOfWork, id: i64, row: Option<Recipe>) -> Result<Recipe, StoreError> {
    let recipe = row.ok_or(StoreError::NotFound { entity: "recipe", id })?;
    uow.updated(recipe.clone());
    Ok(recipe)
}

// Each setter writes a single column so concurrent edits to the others survive.

pub async fn set_title(uow: &mut UnitOfWork, id: i64, title: &str) -> Result<Recipe, StoreError> {
    let row = sqlx::query_as::<_, Recipe>("UPDATE recipes SET title = ? WHERE id = ? RETURNING *")
        .bind(title)
        .bind(id)
        .fetch_optional(uow.conn())
        .await?;
    tracked(uow, id, row)
}

pub async fn set_method(uow: &mut UnitOfWork, id: i64, method: Option<&str>) -> Result<Recipe, StoreError> {
    let row = sqlx::query_as::<_, Recipe>("UPDATE recipes SET method = ? WHERE id = ? RETURNING *")
        .bind(method)
        .bind(id)
        .fetch_optional(uow.conn())
        .await?;
    tracked(uow, id, row)
}

/// Point the recipe at a new image file. Returns the updated recipe and
/// the file name it referenced before, read in the same transaction.
pub async fn set_image(
    uow: &mut UnitOfWork,
    id: i64,
    image: &str,
) -> Result<(Recipe, Option<String>), StoreError> {
    let previous: Option<Option<String>> = sqlx::query_scalar("SELECT image FROM recipes WHERE id = ?")
        .bind(id)
        .fetch_optional(uow.conn())
        .await?;
    let previous = previous.ok_or(StoreError::NotFound { entity: "recipe", id })?;

    let row = sqlx::query_as::<_, Recipe>("UPDATE recipes SET image = ? WHERE id = ? RETURNING *")
        .bind(image)
        .bind(id)
        .fetch_optional(uow.conn())
        .await?;
    Ok((tracked(uow, id, row)?, previous))
}

/// A user's recipes, newest first, with the total count
pub async fn list_by_user(
    pool: &SqlitePool,
    user_id: i64,
    page: u32,
    per_page: u32,
) -> Result<(Vec<Recipe>, u64), StoreError> {
    let offset = (page.max(1) - 1) as i64 * per_page as i64;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM recipes WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    let recipes = sqlx::query_as::<_, Recipe>(
        "SELECT * FROM recipes WHERE user_id = ? ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?",
    )
    .bind(user_id)
    .bind(per_page as i64)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok((recipes, total as u64))
}
