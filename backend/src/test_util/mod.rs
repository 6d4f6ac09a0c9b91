//! Fixtures shared by unit and integration tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use rolegate_common::{Guild, Member, Role, Snowflake, User};

use crate::config::{
    AdminConfig, BotConfig, Config, LoggingConfig, OAuthConfig, ServerConfig, SessionConfig,
};
use crate::platform::{GuildPlatform, MemberJoin, PlatformError};
use crate::AppState;

pub const TEST_ADMIN_USER: &str = "operator";
pub const TEST_ADMIN_PASSWORD: &str = "test-password";

/// Config pointing every OAuth2/REST endpoint at `base_url`.
pub fn test_config(base_url: &str) -> Config {
    Config {
        server: ServerConfig::default(),
        oauth: OAuthConfig {
            client_id: "test-client".to_string(),
            client_secret: "test-secret".to_string(),
            redirect_uri: "http://localhost:8080/callback".to_string(),
            authorize_url: format!("{}/oauth2/authorize", base_url),
            token_url: format!("{}/oauth2/token", base_url),
            api_base: base_url.to_string(),
        },
        bot: BotConfig {
            propagation_delay_ms: 0,
            grant_timeout_secs: 5,
            ..BotConfig::default()
        },
        session: SessionConfig {
            secret: "test-session-secret".to_string(),
            cookie_name: "rolegate_session".to_string(),
            ttl_secs: 3600,
            max_sessions: 1000,
        },
        admin: AdminConfig {
            username: Some(TEST_ADMIN_USER.to_string()),
            password: Some(TEST_ADMIN_PASSWORD.to_string()),
            protect_api_users: false,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
        },
    }
}

pub fn create_test_state(config: Config, platform: Arc<dyn GuildPlatform>) -> Arc<AppState> {
    Arc::new(AppState::new(config, platform).expect("test config has a session secret"))
}

pub fn test_user(id: u64, username: &str) -> User {
    User {
        id: Snowflake(id),
        username: username.to_string(),
        discriminator: Some("0".to_string()),
        global_name: None,
        email: None,
        bot: false,
    }
}

pub fn test_member(user_id: u64, roles: &[u64]) -> Member {
    Member {
        user: Some(test_user(user_id, &format!("user{}", user_id))),
        nick: None,
        roles: roles.iter().copied().map(Snowflake).collect(),
        permissions: None,
    }
}

/// Guild named `Test Guild <id>` with `@everyone` plus `(id, name, managed)` roles in order.
pub fn test_guild(id: u64, roles: &[(u64, &str, bool)]) -> Guild {
    let everyone = Role {
        id: Snowflake(id),
        name: "@everyone".to_string(),
        color: 0,
        managed: false,
        position: 0,
        permissions: "0".to_string(),
    };
    let mut all = vec![everyone];
    all.extend(roles.iter().enumerate().map(|(i, (role_id, name, managed))| Role {
        id: Snowflake(*role_id),
        name: name.to_string(),
        color: 0,
        managed: *managed,
        position: i as i32 + 1,
        permissions: "0".to_string(),
    }));

    Guild {
        id: Snowflake(id),
        name: format!("Test Guild {}", id),
        owner_id: None,
        member_count: Some(1),
        roles: all,
        unavailable: false,
    }
}

/// Mutating call recorded by `FakePlatform`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    AddGuildMember {
        guild_id: Snowflake,
        user_id: Snowflake,
    },
    AddMemberRole {
        guild_id: Snowflake,
        user_id: Snowflake,
        role_id: Snowflake,
    },
}

#[derive(Default)]
struct FakeState {
    members: HashMap<(Snowflake, Snowflake), Member>,
    calls: Vec<PlatformCall>,
    join_on_add: bool,
    fail_joins: bool,
    forbid_role_grants: bool,
}

/// In-memory `GuildPlatform` that records mutations.
pub struct FakePlatform {
    ready: bool,
    guilds: Vec<Guild>,
    state: Mutex<FakeState>,
}

impl FakePlatform {
    pub fn ready(guilds: Vec<Guild>) -> Self {
        Self {
            ready: true,
            guilds,
            state: Mutex::new(FakeState::default()),
        }
    }

    pub fn not_ready() -> Self {
        Self {
            ready: false,
            guilds: Vec::new(),
            state: Mutex::new(FakeState::default()),
        }
    }

    /// Make `add_guild_member` create the member.
    pub async fn join_on_add(&self) {
        self.state.lock().await.join_on_add = true;
    }

    pub async fn fail_joins(&self) {
        self.state.lock().await.fail_joins = true;
    }

    pub async fn forbid_role_grants(&self) {
        self.state.lock().await.forbid_role_grants = true;
    }

    pub async fn insert_member(&self, guild_id: u64, member: Member) {
        if let Some(user) = member.user.as_ref() {
            let key = (Snowflake(guild_id), user.id);
            self.state.lock().await.members.insert(key, member);
        }
    }

    pub async fn mutations(&self) -> Vec<PlatformCall> {
        self.state.lock().await.calls.clone()
    }
}

#[async_trait]
impl GuildPlatform for FakePlatform {
    async fn is_ready(&self) -> bool {
        self.ready
    }

    async fn guilds(&self) -> Vec<Guild> {
        self.guilds.clone()
    }

    async fn guild(&self, guild_id: Snowflake) -> Option<Guild> {
        self.guilds.iter().find(|g| g.id == guild_id).cloned()
    }

    async fn member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
    ) -> Result<Option<Member>, PlatformError> {
        Ok(self.state.lock().await.members.get(&(guild_id, user_id)).cloned())
    }

    async fn add_guild_member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
        _access_token: &str,
    ) -> Result<MemberJoin, PlatformError> {
        let mut state = self.state.lock().await;
        state.calls.push(PlatformCall::AddGuildMember { guild_id, user_id });
        if state.fail_joins {
            return Err(PlatformError::Status {
                status: 400,
                body: "join failed".to_string(),
            });
        }
        if state.members.contains_key(&(guild_id, user_id)) {
            return Ok(MemberJoin::AlreadyMember);
        }
        if state.join_on_add {
            state
                .members
                .insert((guild_id, user_id), test_member(user_id.get(), &[]));
        }
        Ok(MemberJoin::Joined)
    }

    async fn add_member_role(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
        role_id: Snowflake,
    ) -> Result<(), PlatformError> {
        let mut state = self.state.lock().await;
        state.calls.push(PlatformCall::AddMemberRole {
            guild_id,
            user_id,
            role_id,
        });
        if state.forbid_role_grants {
            return Err(PlatformError::Forbidden("Missing Permissions".to_string()));
        }
        if let Some(member) = state.members.get_mut(&(guild_id, user_id)) {
            if !member.has_role(role_id) {
                member.roles.push(role_id);
            }
        }
        Ok(())
    }
}
