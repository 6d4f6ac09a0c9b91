use axum::http::{header, HeaderMap};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use subtle::ConstantTimeEq;

use crate::config::AdminConfig;

/// Realm announced in `WWW-Authenticate` challenges.
pub const ADMIN_REALM: &str = "Admin Area";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

/// Parse an `Authorization: Basic ...` header.
pub fn parse_basic(headers: &HeaderMap) -> Option<BasicCredentials> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some(BasicCredentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}

/// Check request credentials against the configured admin account.
///
/// Always fails when no account is configured.
pub fn check_admin(headers: &HeaderMap, admin: &AdminConfig) -> bool {
    let (Some(expected_user), Some(expected_pass)) =
        (admin.username.as_deref(), admin.password.as_deref())
    else {
        return false;
    };
    if expected_user.is_empty() || expected_pass.is_empty() {
        return false;
    }
    let Some(given) = parse_basic(headers) else {
        return false;
    };

    let user_ok = given.username.as_bytes().ct_eq(expected_user.as_bytes());
    let pass_ok = given.password.as_bytes().ct_eq(expected_pass.as_bytes());
    bool::from(user_ok & pass_ok)
}
