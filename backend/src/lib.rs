pub mod auth;
pub mod bot;
pub mod config;
pub mod directory;
pub mod error;
pub mod logging;
pub mod models;
pub mod platform;
pub mod routes;
pub mod test_util;

pub use auth::{OAuthClient, SessionStore};
pub use bot::{RoleAssigner, RoleGranter, TargetDefaults};
pub use config::Config;
pub use directory::UserDirectory;
pub use error::AuthFlowError;
pub use models::{RoleGrantOutcome, UserRecord};
pub use platform::GuildPlatform;

use std::sync::Arc;
use std::time::Duration;

use auth::SessionError;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// Authenticated users, shared with the bot's `!auth` command.
    pub directory: Arc<UserDirectory>,
    pub sessions: SessionStore,
    pub oauth: OAuthClient,
    pub platform: Arc<dyn GuildPlatform>,
    pub assigner: RoleAssigner,
    /// Handle to the grant worker.
    pub granter: RoleGranter,
}

impl AppState {
    /// Build the state and spawn the grant worker. Must run inside a tokio runtime.
    pub fn new(config: Config, platform: Arc<dyn GuildPlatform>) -> Result<Self, SessionError> {
        let sessions = SessionStore::new(&config.session.secret, config.session.cookie_name.clone())?
            .with_limits(
                Duration::from_secs(config.session.ttl_secs),
                config.session.max_sessions,
            );
        let oauth = OAuthClient::new(config.oauth.clone());

        let defaults = TargetDefaults {
            guild_id: config.bot.default_guild(),
            role_id: config.bot.default_role(),
        };
        let assigner = RoleAssigner::new(
            platform.clone(),
            defaults,
            Duration::from_millis(config.bot.propagation_delay_ms),
        );
        let (granter, _worker) = RoleGranter::spawn(
            assigner.clone(),
            Duration::from_secs(config.bot.grant_timeout_secs),
        );

        Ok(Self {
            config,
            directory: Arc::new(UserDirectory::new()),
            sessions,
            oauth,
            platform,
            assigner,
            granter,
        })
    }
}
