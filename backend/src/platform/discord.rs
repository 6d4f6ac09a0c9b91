use std::sync::Arc;

use async_trait::async_trait;
use rolegate_common::{Guild, Member, Snowflake};

use super::{DiscordHttp, GuildCache, GuildPlatform, MemberJoin, PlatformError};

/// `GuildPlatform` backed by the gateway cache for reads and REST for everything else.
#[derive(Clone)]
pub struct DiscordPlatform {
    http: Arc<DiscordHttp>,
    cache: Arc<GuildCache>,
}

impl DiscordPlatform {
    pub fn new(http: Arc<DiscordHttp>, cache: Arc<GuildCache>) -> Self {
        Self { http, cache }
    }
}

#[async_trait]
impl GuildPlatform for DiscordPlatform {
    async fn is_ready(&self) -> bool {
        self.cache.is_ready().await
    }

    async fn guilds(&self) -> Vec<Guild> {
        self.cache.guilds().await
    }

    /// Cached guild, else a REST lookup (configured guilds before `READY` completes).
    async fn guild(&self, guild_id: Snowflake) -> Option<Guild> {
        if let Some(guild) = self.cache.guild(guild_id).await {
            return Some(guild);
        }
        match self.http.guild(guild_id).await {
            Ok(mut guild) => {
                guild.roles.sort_by_key(|r| r.position);
                Some(guild)
            }
            Err(e) => {
                tracing::debug!(guild_id = %guild_id, "Guild lookup failed: {}", e);
                None
            }
        }
    }

    async fn member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
    ) -> Result<Option<Member>, PlatformError> {
        self.http.guild_member(guild_id, user_id).await
    }

    async fn add_guild_member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
        access_token: &str,
    ) -> Result<MemberJoin, PlatformError> {
        self.http
            .add_guild_member(guild_id, user_id, access_token)
            .await
    }

    async fn add_member_role(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
        role_id: Snowflake,
    ) -> Result<(), PlatformError> {
        self.http.add_member_role(guild_id, user_id, role_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_guild_falls_back_to_rest() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/guilds/10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "10",
                "name": "Remote",
                "approximate_member_count": 7,
                "roles": [
                    {"id": "12", "name": "Second", "position": 2},
                    {"id": "10", "name": "@everyone", "position": 0},
                    {"id": "11", "name": "First", "position": 1}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let platform = DiscordPlatform::new(
            Arc::new(DiscordHttp::new(&server.uri(), Some("bot-token"))),
            Arc::new(GuildCache::new()),
        );
        let guild = platform.guild(Snowflake(10)).await.unwrap();

        assert_eq!(guild.name, "Remote");
        assert_eq!(guild.member_count, Some(7));
        assert_eq!(guild.first_grantable_role().unwrap().name, "First");
        assert!(!platform.is_ready().await);
    }

    #[tokio::test]
    async fn test_guild_without_token_is_none() {
        let platform = DiscordPlatform::new(
            Arc::new(DiscordHttp::new("http://localhost:1", None)),
            Arc::new(GuildCache::new()),
        );
        assert!(platform.guild(Snowflake(10)).await.is_none());
    }
}
