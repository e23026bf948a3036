use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use recipebook::error::AppError;
use recipebook::store::users;
use recipebook::validation;

use super::types::*;
use crate::state::AppState;

/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<Value>, AppError> {
    let username = validation::username(&req.username)?;
    let email = validation::email(&req.email)?;
    validation::password(&req.password)?;

    if users::find_by_username(&state.db, &username).await?.is_some() {
        return Err(AppError::Conflict("Please use a different username".to_string()));
    }
    if users::find_by_email(&state.db, &email).await?.is_some() {
        return Err(AppError::Conflict("Please use a different email address".to_string()));
    }

    let password_hash = bcrypt::hash(&req.password, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("password hashing failed: {}", e)))?;

    let mut uow = state.store.begin().await?;
    let user = users::insert(&mut uow, &username, &email, &password_hash).await?;
    uow.commit().await?;

    tracing::info!("Registered user {}", user.username);

    Ok(Json(json!({ "user": UserInfo::from(user) })))
}
