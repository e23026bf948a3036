use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use sqlx::sqlite::SqlitePool;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_cookies::CookieManagerLayer;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod auth;
mod state;

use recipebook::models::Recipe;
use recipebook::store::RecordStore;
use recipebook::sync::SearchCoordinator;
use recipebook::{config, db, search};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recipebook=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let app_config = config::load_config(&config::default_config_path())?;
    tracing::info!("Server will listen on {}", app_config.get_bind_address());

    let data_dir = app_config.get_data_dir();
    if !data_dir.exists() {
        std::fs::create_dir_all(&data_dir)?;
        tracing::info!("Created data directory: {:?}", data_dir);
    }
    let upload_dir = app_config.get_upload_dir();
    std::fs::create_dir_all(&upload_dir)?;

    let pool = SqlitePool::connect(&app_config.get_database_url()).await?;
    db::run_migrations(&pool).await?;

    let index = search::open_index(&app_config).await?;
    let coordinator = Arc::new(SearchCoordinator::new(index, pool.clone()));
    let store = RecordStore::new(pool.clone(), vec![coordinator.clone()]);

    if app_config.search.reindex_on_startup {
        match coordinator.reindex_all::<Recipe>().await {
            Ok(count) => tracing::info!("Startup reindex wrote {} recipes", count),
            Err(e) => tracing::warn!("Startup reindex failed: {}", e),
        }
    }

    let state = Arc::new(AppState {
        db: pool,
        store,
        coordinator,
        login_security: state::LoginSecurity::new(),
        config: app_config.clone(),
    });

    let app = Router::new()
        .route("/api/health", get(api::server::health_check))
        .route("/api/auth/register", post(api::auth::register))
        .route("/api/auth/login", post(api::auth::login))
        .route("/api/auth/logout", post(api::auth::logout))
        .route("/api/auth/me", get(api::auth::get_current_user))
        .route("/api/auth/profile", post(api::auth::update_profile))
        .route("/api/users/:username", get(api::users::get_user))
        .route("/api/recipes", get(api::recipes::list_my_recipes))
        .route("/api/recipes", post(api::recipes::create_recipe))
        .route("/api/recipes/:id", get(api::recipes::get_recipe))
        .route("/api/recipes/:id", post(api::recipes::update_recipe))
        .route("/api/recipes/:id/ingredients", post(api::recipes::add_ingredient))
        .route(
            "/api/recipes/:id/image",
            post(api::recipes::upload_image)
                .layer(DefaultBodyLimit::max(app_config.uploads.max_content_length)),
        )
        .route("/api/ingredients/:id/delete", post(api::ingredients::delete_ingredient))
        .route("/api/search", get(api::search::search_recipes))
        .route("/api/search/reindex", post(api::search::reindex))
        .nest_service("/images", ServeDir::new(&upload_dir))
        .layer(CookieManagerLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let bind_addr = app_config.get_bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server running at http://{}", bind_addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
