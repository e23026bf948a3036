use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_cookies::Cookies;

use recipebook::error::AppError;
use recipebook::models::Paginated;
use recipebook::store::{recipes, users};

use super::auth::types::UserInfo;
use super::PageQuery;
use crate::auth::require_user;
use crate::state::AppState;

/// GET /api/users/:username - profile plus that user's recipes
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Path(username): Path<String>,
    Query(params): Query<PageQuery>,
) -> Result<Json<Value>, AppError> {
    require_user(&state, &cookies).await?;

    let user = users::find_by_username(&state.db, &username)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", username)))?;

    let page = params.page.max(1);
    let per_page = state.config.recipes.per_page;
    let (items, total) = recipes::list_by_user(&state.db, user.id, page, per_page).await?;

    Ok(Json(json!({
        "user": UserInfo::from(user),
        "recipes": Paginated::new(items, total, page, per_page),
    })))
}
