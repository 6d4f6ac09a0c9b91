//! Operator routes behind HTTP Basic-Auth.
//!
//! Provides:
//! - Dashboard (`/admin`)
//! - Single record JSON (`/admin/user/:id`)
//! - Full JSON export (`/admin/export`)
//! - Confirm and wipe (`/admin/clear`)

use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::{check_admin, ADMIN_REALM};
use crate::models::UserRecord;
use crate::AppState;

use super::html;

/// 401 with a Basic challenge.
pub fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(
            header::WWW_AUTHENTICATE,
            format!("Basic realm=\"{}\"", ADMIN_REALM),
        )],
        Html("<h1>401 Unauthorized</h1><p>Admin authentication required.</p>"),
    )
        .into_response()
}

/// Middleware that requires the configured admin credentials.
async fn require_admin(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if check_admin(request.headers(), &state.config.admin) {
        return next.run(request).await;
    }
    tracing::debug!(path = %request.uri().path(), "Rejected admin request");
    unauthorized()
}

/// Response for `/admin/export`.
#[derive(Debug, Serialize)]
pub struct ExportResponse {
    pub export_date: DateTime<Utc>,
    pub total_users: usize,
    pub users: Vec<UserRecord>,
}

/// GET /admin
async fn dashboard(State(state): State<Arc<AppState>>) -> Html<String> {
    let users = state.directory.list().await;
    let guild_count = if state.platform.is_ready().await {
        state.platform.guilds().await.len()
    } else {
        0
    };
    Html(html::admin_page(&users, guild_count))
}

/// GET /admin/user/:id
async fn user_detail(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Response {
    match state.directory.get(&user_id).await {
        Some(record) => Json(record).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Html(html::error_page("User not found")),
        )
            .into_response(),
    }
}

/// GET /admin/export
async fn export(State(state): State<Arc<AppState>>) -> Json<ExportResponse> {
    let users = state.directory.list().await;
    Json(ExportResponse {
        export_date: Utc::now(),
        total_users: users.len(),
        users,
    })
}

/// GET /admin/clear
async fn clear_form() -> Html<String> {
    Html(html::clear_confirm_page())
}

/// POST /admin/clear
async fn clear(State(state): State<Arc<AppState>>) -> Redirect {
    let removed = state.directory.clear().await;
    tracing::warn!("Admin cleared the user directory ({} records)", removed);
    Redirect::to("/admin")
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/admin", get(dashboard))
        .route("/admin/user/:id", get(user_detail))
        .route("/admin/export", get(export))
        .route("/admin/clear", get(clear_form).post(clear))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin))
        .with_state(state)
}
