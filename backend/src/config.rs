//! Configuration for the RoleGate backend.

use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;

use rolegate_common::Snowflake;

use crate::auth::session::{DEFAULT_MAX_SESSIONS, DEFAULT_SESSION_TTL};

/// Application configuration.
///
/// Configuration sources (in order of precedence):
/// 1. Environment variables (`ROLEGATE__SECTION__KEY` format)
/// 2. config.toml file (if present)
/// 3. Built-in defaults
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub bot: BotConfig,
    pub session: SessionConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// OAuth2 client registration and platform endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Must match a redirect registered with the platform (`.../callback`).
    pub redirect_uri: String,
    #[serde(default = "default_authorize_url")]
    pub authorize_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    /// REST API base used for `/users/@me` and every bot call.
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl OAuthConfig {
    /// Public site root, derived from the redirect URI.
    pub fn site_url(&self) -> String {
        self.redirect_uri
            .trim_end_matches('/')
            .trim_end_matches("/callback")
            .to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Bot token. The bot is disabled when unset.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    /// Fallback guild when neither the caller nor auto-detection provides one (0 = unset).
    #[serde(default)]
    pub default_guild_id: Option<u64>,
    /// Fallback role (0 = unset).
    #[serde(default)]
    pub default_role_id: Option<u64>,
    /// Wait after adding a user to a guild before looking the member up.
    #[serde(default = "default_propagation_delay")]
    pub propagation_delay_ms: u64,
    /// Upper bound the web handler waits for a role grant.
    #[serde(default = "default_grant_timeout")]
    pub grant_timeout_secs: u64,
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,
}

impl BotConfig {
    pub fn default_guild(&self) -> Option<Snowflake> {
        Snowflake::non_zero(self.default_guild_id)
    }

    pub fn default_role(&self) -> Option<Snowflake> {
        Snowflake::non_zero(self.default_role_id)
    }

    pub fn is_enabled(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.trim().is_empty())
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: None,
            gateway_url: default_gateway_url(),
            command_prefix: default_command_prefix(),
            default_guild_id: None,
            default_role_id: None,
            propagation_delay_ms: default_propagation_delay(),
            grant_timeout_secs: default_grant_timeout(),
            reconnect_delay_secs: default_reconnect_delay(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// HMAC key for session cookies.
    pub secret: String,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Idle seconds before a session is dropped.
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

/// Operator credentials for `/admin`. Admin routes reject everyone when unset.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminConfig {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Also require admin credentials on `/api/users`.
    #[serde(default)]
    pub protect_api_users: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_authorize_url() -> String {
    "https://discord.com/api/oauth2/authorize".to_string()
}
fn default_token_url() -> String {
    "https://discord.com/api/oauth2/token".to_string()
}
fn default_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}
fn default_gateway_url() -> String {
    "wss://gateway.discord.gg/?v=10&encoding=json".to_string()
}
fn default_command_prefix() -> String {
    "!".to_string()
}
fn default_propagation_delay() -> u64 {
    1000
}
fn default_grant_timeout() -> u64 {
    15
}
fn default_reconnect_delay() -> u64 {
    5
}
fn default_cookie_name() -> String {
    "rolegate_session".to_string()
}
fn default_session_ttl() -> u64 {
    DEFAULT_SESSION_TTL.as_secs()
}
fn default_max_sessions() -> usize {
    DEFAULT_MAX_SESSIONS
}
fn default_log_level() -> String {
    "info".to_string()
}

const ENV_PREFIX: &str = "ROLEGATE";

impl Config {
    /// Load configuration from file and environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Environment::with_prefix(ENV_PREFIX))
    }

    /// Values stay strings until deserialized, so numeric-looking secrets keep
    /// their exact text while numeric fields are still converted.
    fn load_from(env: Environment) -> Result<Self, ConfigError> {
        let config = ConfigLoader::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port() as i64)?
            .set_default("logging.level", default_log_level())?
            .add_source(File::with_name("config").required(false))
            .add_source(env.separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
