use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::StoreError;
use crate::models::Ingredient;

use super::UnitOfWork;

pub async fn insert(
    uow: &mut UnitOfWork,
    recipe_id: i64,
    description: &str,
    quantity: Option<f64>,
    unit: Option<&str>,
) -> Result<Ingredient, StoreError> {
    let now = Utc::now().to_rfc3339();
    let ingredient = sqlx::query_as::<_, Ingredient>(
        "INSERT INTO ingredients (description, quantity, unit, timestamp, recipe_id) VALUES (?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(description)
    .bind(quantity)
    .bind(unit)
    .bind(&now)
    .bind(recipe_id)
    .fetch_one(uow.conn())
    .await?;

    uow.added(ingredient.clone());
    Ok(ingredient)
}

pub async fn delete(uow: &mut UnitOfWork, ingredient: Ingredient) -> Result<(), StoreError> {
    let result = sqlx::query("DELETE FROM ingredients WHERE id = ?")
        .bind(ingredient.id)
        .execute(uow.conn())
        .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound { entity: "ingredient", id: ingredient.id });
    }

    uow.deleted(ingredient);
    Ok(())
}

/// Ingredients of a recipe in insertion order
pub async fn list_for_recipe(pool: &SqlitePool, recipe_id: i64) -> Result<Vec<Ingredient>, StoreError> {
    let rows = sqlx::query_as::<_, Ingredient>(
        "SELECT * FROM ingredients WHERE recipe_id = ? ORDER BY id",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::*;
    use crate::store::{recipes, ChangeKind, RecordStore};

    #[tokio::test]
    async fn test_insert_and_delete() {
        let pool = memory_pool().await;
        let susan = seed_user(&pool, "susan").await;
        let store = RecordStore::new(pool.clone(), vec![]);

        let mut uow = store.begin().await.unwrap();
        let recipe = recipes::insert(&mut uow, susan, "Pancakes").await.unwrap();
        let flour = insert(&mut uow, recipe.id, "flour", Some(200.0), Some("g")).await.unwrap();
        insert(&mut uow, recipe.id, "eggs", Some(2.0), None).await.unwrap();
        uow.commit().await.unwrap();

        let listed = list_for_recipe(&pool, recipe.id).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].unit.as_deref(), Some("g"));

        let mut uow = store.begin().await.unwrap();
        delete(&mut uow, flour.clone()).await.unwrap();
        assert_eq!(uow.pending().kind_of("ingredient", flour.id), Some(ChangeKind::Deleted));
        uow.commit().await.unwrap();

        let listed = list_for_recipe(&pool, recipe.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].description, "eggs");
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let pool = memory_pool().await;
        let store = RecordStore::new(pool, vec![]);
        let ghost = Ingredient {
            id: 99,
            description: "ghost".to_string(),
            quantity: None,
            unit: None,
            timestamp: Utc::now().to_rfc3339(),
            recipe_id: 1,
        };

        let mut uow = store.begin().await.unwrap();
        let err = delete(&mut uow, ghost).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "ingredient", id: 99 }));
        uow.rollback().await.unwrap();
    }
}
