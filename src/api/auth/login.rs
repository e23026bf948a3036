use axum::{
    extract::{ConnectInfo, State},
    Json,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_cookies::{Cookie, Cookies};

use recipebook::error::AppError;
use recipebook::store::users;

use super::types::*;
use crate::auth::{create_session, delete_session, SESSION_COOKIE_NAME};
use crate::state::AppState;

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    cookies: Cookies,
    Json(req): Json<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    let ip = addr.ip().to_string();

    if state.login_security.is_ip_blocked(&ip) {
        return Err(AppError::TooManyRequests(
            "Too many failed logins, try again in 30 minutes".to_string(),
        ));
    }

    let user = users::find_by_username(&state.db, req.username.trim()).await?;

    let valid = match &user {
        Some(user) => bcrypt::verify(&req.password, &user.password_hash)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("password check failed: {}", e)))?,
        None => false,
    };

    let user = match user {
        Some(user) if valid => user,
        _ => {
            state.login_security.record_failure(&ip);
            tracing::warn!("Failed login for '{}' from {}", req.username, ip);
            return Err(AppError::Unauthorized);
        }
    };

    state.login_security.clear_failure(&ip);

    let session = create_session(&state.db, user.id, state.config.server.session_ttl_days).await?;

    let mut uow = state.store.begin().await?;
    let user = users::touch_last_seen(&mut uow, user.id).await?;
    uow.commit().await?;

    let mut cookie = Cookie::new(SESSION_COOKIE_NAME, session.id);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookies.add(cookie);

    Ok(Json(json!({ "user": UserInfo::from(user) })))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
) -> Result<Json<Value>, AppError> {
    if let Some(cookie) = cookies.get(SESSION_COOKIE_NAME) {
        delete_session(&state.db, cookie.value()).await?;
    }

    let mut cookie = Cookie::new(SESSION_COOKIE_NAME, "");
    cookie.set_path("/");
    cookies.remove(cookie);

    Ok(Json(json!({ "message": "Signed out" })))
}
