use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_cookies::Cookies;

use recipebook::error::AppError;
use recipebook::models::{Paginated, Recipe};
use recipebook::validation;

use crate::auth::require_user;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    q: Option<String>,
    #[serde(default = "default_page")]
    page: u32,
}

fn default_page() -> u32 { 1 }

/// GET /api/search?q=&page=
pub async fn search_recipes(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Query(params): Query<SearchQuery>,
) -> Result<Json<Paginated<Recipe>>, AppError> {
    require_user(&state, &cookies).await?;

    let phrase = validation::search_phrase(params.q.as_deref())?;
    let per_page = state.config.recipes.per_page;

    let (items, total) = state
        .coordinator
        .search::<Recipe>(&phrase, params.page, per_page)
        .await?;

    Ok(Json(Paginated::new(items, total, params.page, per_page)))
}

/// POST /api/search/reindex
pub async fn reindex(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
) -> Result<Json<Value>, AppError> {
    let user = require_user(&state, &cookies).await?;

    let indexed = state.coordinator.reindex_all::<Recipe>().await?;
    tracing::info!("User {} rebuilt the recipe index ({} documents)", user.username, indexed);

    Ok(Json(json!({ "indexed": indexed, "backend": state.coordinator.index().name() })))
}
