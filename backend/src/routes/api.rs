//! Public JSON API.

use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use crate::auth::check_admin;
use crate::models::GuildSummary;
use crate::AppState;

use super::admin::unauthorized;

/// GET /api/users
async fn list_users(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if state.config.admin.protect_api_users && !check_admin(&headers, &state.config.admin) {
        return unauthorized();
    }
    Json(state.directory.list().await).into_response()
}

/// Guilds the bot is in, with their roles; empty until the bot is ready.
pub async fn guild_summaries(state: &AppState) -> Vec<GuildSummary> {
    if !state.platform.is_ready().await {
        return Vec::new();
    }
    state
        .platform
        .guilds()
        .await
        .iter()
        .map(GuildSummary::from)
        .collect()
}

/// GET /api/guilds
async fn list_guilds(State(state): State<Arc<AppState>>) -> Json<Vec<GuildSummary>> {
    Json(guild_summaries(&state).await)
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/users", get(list_users))
        .route("/api/guilds", get(list_guilds))
        .with_state(state)
}
