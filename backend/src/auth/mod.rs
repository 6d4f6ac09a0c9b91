//! Authentication: the OAuth2 login flow, browser sessions, and admin Basic-Auth.

pub mod basic;
pub mod oauth;
pub mod session;

pub use basic::{check_admin, ADMIN_REALM};
pub use oauth::{OAuthClient, TokenResponse};
pub use session::{SessionData, SessionError, SessionStore};
