//! Chat platform abstraction.
//!
//! The `GuildPlatform` trait is the narrow surface role granting needs from
//! the platform: guild/role lookups served by the gateway cache, and the
//! handful of REST mutations that change membership and roles.

mod cache;
mod discord;
mod http;

pub use cache::GuildCache;
pub use discord::DiscordPlatform;
pub use http::{DiscordHttp, MemberJoin};

use async_trait::async_trait;
use rolegate_common::{Guild, Member, Role, Snowflake};

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),
    #[error("Missing permissions: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Platform returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Bot token is not configured")]
    NotConfigured,
}

impl PlatformError {
    pub fn is_forbidden(&self) -> bool {
        matches!(self, PlatformError::Forbidden(_))
    }
}

/// Platform capabilities used by role assignment.
#[async_trait]
pub trait GuildPlatform: Send + Sync {
    /// Whether the bot finished receiving its guild list.
    async fn is_ready(&self) -> bool;

    /// Guilds the bot belongs to, in the order they were received.
    async fn guilds(&self) -> Vec<Guild>;

    async fn guild(&self, guild_id: Snowflake) -> Option<Guild>;

    async fn role(&self, guild_id: Snowflake, role_id: Snowflake) -> Option<Role> {
        self.guild(guild_id)
            .await
            .and_then(|g| g.role(role_id).cloned())
    }

    /// `Ok(None)` when the user is not a member.
    async fn member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
    ) -> Result<Option<Member>, PlatformError>;

    /// Add a user to a guild on their behalf using their OAuth2 access token.
    async fn add_guild_member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
        access_token: &str,
    ) -> Result<MemberJoin, PlatformError>;

    async fn add_member_role(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
        role_id: Snowflake,
    ) -> Result<(), PlatformError>;
}
