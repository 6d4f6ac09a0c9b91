pub mod admin;
pub mod api;
pub mod health;
pub mod html;
pub mod pages;

use std::sync::Arc;

use axum::{middleware, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::logging::request_logger;
use crate::AppState;

/// Full application router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(health::router())
        .merge(pages::router(state.clone()))
        .merge(admin::router(state.clone()))
        .merge(api::router(state).layer(cors))
        .layer(middleware::from_fn(request_logger))
        .layer(TraceLayer::new_for_http())
}
