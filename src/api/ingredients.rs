use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_cookies::Cookies;

use recipebook::error::AppError;
use recipebook::models::Ingredient;
use recipebook::store::ingredients;

use super::recipes::load_owned_recipe;
use crate::auth::require_user;
use crate::state::AppState;

/// POST /api/ingredients/:id/delete
pub async fn delete_ingredient(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let user = require_user(&state, &cookies).await?;
    let ingredient: Ingredient = state.store.get(id).await?;
    load_owned_recipe(&state, ingredient.recipe_id, &user).await?;

    let mut uow = state.store.begin().await?;
    ingredients::delete(&mut uow, ingredient).await?;
    uow.commit().await?;

    Ok(Json(json!({ "message": "Ingredient deleted", "id": id })))
}
