//! Browser-facing login flow.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use serde::Deserialize;

use rolegate_common::Snowflake;

use crate::error::AuthFlowError;
use crate::models::UserRecord;
use crate::AppState;

use super::api::guild_summaries;
use super::html;

/// Client address: first `X-Forwarded-For` entry, else the socket peer.
pub fn origin_address(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .or_else(|| peer.map(|p| p.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Empty values count as absent; anything else must be a numeric ID.
fn parse_id(params: &HashMap<String, String>, name: &str) -> Result<Option<Snowflake>, AuthFlowError> {
    match params.get(name).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| AuthFlowError::InvalidSelection(name.to_string())),
        None => Ok(None),
    }
}

fn redirect_with_cookie(location: &str, cookie: String) -> Response {
    ([(header::SET_COOKIE, cookie)], Redirect::to(location)).into_response()
}

/// GET /
async fn home(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Html<String> {
    let (_, session) = state.sessions.load(&headers).await;
    if session.is_authenticated() {
        return Html(html::status_page(session.profile.as_ref(), session.role_grant));
    }
    Html(html::login_page(&guild_summaries(&state).await))
}

/// GET /login
///
/// Accepts `guild_id` plus either `role_id` or the picker's `role_id_<guild>`.
async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AuthFlowError> {
    let guild_id = parse_id(&params, "guild_id")?;
    let role_id = match parse_id(&params, "role_id")? {
        Some(role_id) => Some(role_id),
        None => match guild_id {
            Some(g) => parse_id(&params, &format!("role_id_{}", g))?,
            None => None,
        },
    };

    let authorize_url = match state.oauth.authorize_url() {
        Ok(url) => url,
        Err(e) => {
            tracing::error!("Invalid OAuth2 authorize URL: {}", e);
            return Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(html::error_page("Login is not configured")),
            )
                .into_response());
        }
    };

    let (session_id, mut session) = state.sessions.load(&headers).await;
    if guild_id.is_some() {
        session.selected_guild_id = guild_id;
    }
    if role_id.is_some() {
        session.selected_role_id = role_id;
    }
    let cookie = state.sessions.save(session_id, session).await;

    Ok(redirect_with_cookie(authorize_url.as_str(), cookie))
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
}

/// GET /callback
async fn callback(
    State(state): State<Arc<AppState>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Result<Response, AuthFlowError> {
    if let Some(error) = params.error.as_deref() {
        tracing::info!("Authorization was not granted: {}", error);
    }
    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or(AuthFlowError::MissingCode)?;

    let token = state.oauth.exchange_code(&code).await?;
    let profile = state.oauth.fetch_profile(&token.access_token).await?;

    let origin = origin_address(&headers, peer.map(|ConnectInfo(addr)| addr));
    let record = UserRecord::from_profile(&profile, origin);
    tracing::info!(
        user_id = %record.external_id,
        origin = %record.origin_address,
        "User authenticated: {}",
        record.display_name
    );
    state.directory.upsert(record).await;

    let (session_id, mut session) = state.sessions.load(&headers).await;
    let outcome = state
        .granter
        .grant(
            profile.id,
            token.access_token.clone(),
            session.selected_guild_id,
            session.selected_role_id,
        )
        .await;
    tracing::info!(user_id = %profile.id, "Role grant {}", outcome);

    session.access_token = Some(token.access_token);
    session.profile = Some(profile);
    session.role_grant = Some(outcome);
    let cookie = state.sessions.save(session_id, session).await;

    Ok(redirect_with_cookie("/", cookie))
}

/// GET /logout
async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let cookie = state.sessions.destroy(&headers).await;
    redirect_with_cookie("/", cookie)
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/login", get(login))
        .route("/callback", get(callback))
        .route("/logout", get(logout))
        .with_state(state)
}
