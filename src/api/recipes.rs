use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_cookies::Cookies;

use recipebook::error::{AppError, StoreError};
use recipebook::models::{
    CreateIngredientRequest, CreateRecipeRequest, Paginated, Recipe, RecipeDetail, UpdateRecipeRequest, User,
};
use recipebook::store::{ingredients, recipes};
use recipebook::utils::{get_ext, image_matches_extension};
use recipebook::validation;

use super::PageQuery;
use crate::auth::require_user;
use crate::state::AppState;

/// Recipe `id` if `user` owns it
pub(crate) async fn load_owned_recipe(state: &AppState, id: i64, user: &User) -> Result<Recipe, AppError> {
    let recipe: Recipe = state.store.get(id).await?;
    if recipe.user_id != user.id {
        return Err(AppError::Forbidden("You can only change your own recipes".to_string()));
    }
    Ok(recipe)
}

/// GET /api/recipes - the signed-in user's recipes, newest first
pub async fn list_my_recipes(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Query(params): Query<PageQuery>,
) -> Result<Json<Paginated<Recipe>>, AppError> {
    let user = require_user(&state, &cookies).await?;
    let page = params.page.max(1);
    let per_page = state.config.recipes.per_page;

    let (items, total) = recipes::list_by_user(&state.db, user.id, page, per_page).await?;
    Ok(Json(Paginated::new(items, total, page, per_page)))
}

/// POST /api/recipes
pub async fn create_recipe(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Json(req): Json<CreateRecipeRequest>,
) -> Result<(StatusCode, Json<Recipe>), AppError> {
    let user = require_user(&state, &cookies).await?;
    let title = validation::title(&req.title)?;

    let mut uow = state.store.begin().await?;
    let recipe = recipes::insert(&mut uow, user.id, &title).await?;
    uow.commit().await?;

    tracing::info!("User {} created recipe {}", user.username, recipe.id);
    Ok((StatusCode::CREATED, Json(recipe)))
}

/// GET /api/recipes/:id
pub async fn get_recipe(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Path(id): Path<i64>,
) -> Result<Json<RecipeDetail>, AppError> {
    require_user(&state, &cookies).await?;

    let recipe: Recipe = state.store.get(id).await?;
    let author: User = state.store.get(recipe.user_id).await?;
    let ingredients = ingredients::list_for_recipe(&state.db, recipe.id).await?;

    Ok(Json(RecipeDetail {
        recipe,
        author: author.username,
        ingredients,
    }))
}

/// POST /api/recipes/:id - owner edits title and/or method
pub async fn update_recipe(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Path(id): Path<i64>,
    Json(req): Json<UpdateRecipeRequest>,
) -> Result<Json<Recipe>, AppError> {
    let user = require_user(&state, &cookies).await?;
    let mut recipe = load_owned_recipe(&state, id, &user).await?;

    let title = req.title.as_deref().map(validation::title).transpose()?;
    let method = match &req.method {
        Some(method) => Some(validation::method(Some(method.as_str()))?),
        None => None,
    };

    let mut uow = state.store.begin().await?;
    if let Some(title) = &title {
        recipe = recipes::set_title(&mut uow, id, title).await?;
    }
    if let Some(method) = &method {
        recipe = recipes::set_method(&mut uow, id, method.as_deref()).await?;
    }
    uow.commit().await?;

    Ok(Json(recipe))
}

/// POST /api/recipes/:id/ingredients
pub async fn add_ingredient(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Path(id): Path<i64>,
    Json(req): Json<CreateIngredientRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let user = require_user(&state, &cookies).await?;
    let recipe = load_owned_recipe(&state, id, &user).await?;

    let description = validation::description(&req.description)?;
    let quantity = validation::quantity(req.quantity.as_deref())?;
    let unit = validation::unit(req.unit.as_deref())?;

    let mut uow = state.store.begin().await?;
    let ingredient = ingredients::insert(&mut uow, recipe.id, &description, quantity, unit.as_deref()).await?;
    uow.commit().await?;

    Ok((StatusCode::CREATED, Json(json!({ "ingredient": ingredient }))))
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Image is too large".to_string())
    } else {
        AppError::BadRequest(format!("Invalid upload: {}", e.body_text()))
    }
}

/// POST /api/recipes/:id/image - multipart upload, first file field wins
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> Result<Json<Recipe>, AppError> {
    let user = require_user(&state, &cookies).await?;
    let recipe = load_owned_recipe(&state, id, &user).await?;

    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let data = field.bytes().await.map_err(multipart_error)?;
        upload = Some((filename, data.to_vec()));
        break;
    }

    let (filename, data) = upload.ok_or_else(|| AppError::BadRequest("No image file provided".to_string()))?;
    let recipe = store_image(&state, recipe.id, &filename, &data).await?;
    Ok(Json(recipe))
}

/// Check and save an uploaded image as `{recipe_id}{ext}`, then point the
/// recipe at it. The file the recipe used before is removed once the
/// change is committed; on a failed commit the new file is removed instead.
pub(crate) async fn store_image(
    state: &AppState,
    recipe_id: i64,
    filename: &str,
    data: &[u8],
) -> Result<Recipe, AppError> {
    let ext = get_ext(filename);
    if !state.config.uploads.extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(&ext)) {
        return Err(AppError::BadRequest(format!("File type '{}' is not allowed", ext)));
    }
    if !image_matches_extension(&ext, data) {
        return Err(AppError::BadRequest("File content is not a valid image".to_string()));
    }

    let upload_dir = state.config.get_upload_dir();
    tokio::fs::create_dir_all(&upload_dir)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

    let stored_name = format!("{}{}", recipe_id, ext);
    let path = upload_dir.join(&stored_name);
    let existed = tokio::fs::try_exists(&path).await.unwrap_or(true);

    // Dropping the unit of work before commit rolls it back
    let mut uow = state.store.begin().await?;
    let (recipe, previous) = recipes::set_image(&mut uow, recipe_id, &stored_name).await?;
    tokio::fs::write(&path, data)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

    match uow.commit().await {
        Ok(()) => {}
        Err(StoreError::IndexSync(e)) => {
            remove_replaced_image(&upload_dir, previous.as_deref(), &stored_name).await;
            return Err(StoreError::IndexSync(e).into());
        }
        Err(e) => {
            if !existed {
                if let Err(err) = tokio::fs::remove_file(&path).await {
                    tracing::warn!("Failed to remove uncommitted image {:?}: {}", path, err);
                }
            }
            return Err(e.into());
        }
    }

    remove_replaced_image(&upload_dir, previous.as_deref(), &stored_name).await;
    tracing::info!("Stored image for recipe {} ({} bytes)", recipe.id, data.len());
    Ok(recipe)
}

async fn remove_replaced_image(upload_dir: &std::path::Path, previous: Option<&str>, current: &str) {
    let Some(previous) = previous.filter(|p| *p != current) else {
        return;
    };
    // Only plain file names live in the upload directory
    if std::path::Path::new(previous).file_name().and_then(|n| n.to_str()) != Some(previous) {
        return;
    }
    let path = upload_dir.join(previous);
    match tokio::fs::remove_file(&path).await {
        Ok(()) => tracing::debug!("Removed replaced image {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove replaced image {:?}: {}", path, e),
    }
}
