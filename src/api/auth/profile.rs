use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_cookies::Cookies;

use recipebook::error::AppError;
use recipebook::store::users;
use recipebook::validation;

use super::types::*;
use crate::auth::require_user;
use crate::state::AppState;

/// GET /api/auth/me
pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
) -> Result<Json<Value>, AppError> {
    let user = require_user(&state, &cookies).await?;
    Ok(Json(json!({ "user": UserInfo::from(user) })))
}

/// POST /api/auth/profile
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<Value>, AppError> {
    let user = require_user(&state, &cookies).await?;

    let username = validation::username(&req.username)?;
    let about_me = validation::about_me(req.about_me.as_deref())?;

    if username != user.username && users::find_by_username(&state.db, &username).await?.is_some() {
        return Err(AppError::Conflict("Please use a different username".to_string()));
    }

    let mut uow = state.store.begin().await?;
    let user = users::update_profile(&mut uow, user.id, &username, about_me.as_deref()).await?;
    uow.commit().await?;

    Ok(Json(json!({ "user": UserInfo::from(user) })))
}
