//! Errors surfaced to the browser.

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

use crate::routes::html::error_page;

/// Failures of the login flow.
#[derive(Debug, thiserror::Error)]
pub enum AuthFlowError {
    #[error("Invalid {0} parameter")]
    InvalidSelection(String),
    #[error("Authentication failed: no authorization code")]
    MissingCode,
    #[error("Failed to obtain an access token: {0}")]
    TokenExchange(String),
    #[error("Failed to fetch user information: {0}")]
    ProfileFetch(String),
}

impl AuthFlowError {
    /// Text shown to the user; upstream details stay in the logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            AuthFlowError::InvalidSelection(_) => "Invalid server or role selection",
            AuthFlowError::MissingCode => "Authentication failed",
            AuthFlowError::TokenExchange(_) => "Failed to obtain an access token",
            AuthFlowError::ProfileFetch(_) => "Failed to fetch user information",
        }
    }
}

impl IntoResponse for AuthFlowError {
    fn into_response(self) -> Response {
        tracing::warn!("Login failed: {}", self);
        (
            StatusCode::BAD_REQUEST,
            Html(error_page(self.user_message())),
        )
            .into_response()
    }
}
