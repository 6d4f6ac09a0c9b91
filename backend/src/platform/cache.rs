use std::collections::HashSet;

use tokio::sync::RwLock;

use rolegate_common::{Guild, Ready, Role, Snowflake, User};

/// Guild state maintained from gateway events.
///
/// Guilds keep the order in which the gateway delivered them, so "the first
/// guild the bot belongs to" is stable for the lifetime of a session.
#[derive(Debug, Default)]
pub struct GuildCache {
    state: RwLock<CacheState>,
}

#[derive(Debug, Default)]
struct CacheState {
    bot_user: Option<User>,
    guilds: Vec<Guild>,
    /// Guilds announced in READY that have not been streamed yet.
    pending: HashSet<Snowflake>,
    ready_received: bool,
    ready: bool,
}

impl CacheState {
    /// Flip to ready once READY arrived and every announced guild followed.
    fn check_ready(&mut self) -> bool {
        if !self.ready && self.ready_received && self.pending.is_empty() {
            self.ready = true;
            return true;
        }
        false
    }
}

impl GuildCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset for a fresh gateway session. Returns `true` if the cache is ready already.
    pub async fn on_ready(&self, ready: &Ready) -> bool {
        let mut state = self.state.write().await;
        state.bot_user = Some(ready.user.clone());
        state.guilds.clear();
        state.pending = ready.guilds.iter().map(|g| g.id).collect();
        state.ready_received = true;
        state.ready = false;
        state.check_ready()
    }

    /// Insert or replace a guild. Returns `true` when this completed the initial guild stream.
    pub async fn upsert_guild(&self, mut guild: Guild) -> bool {
        guild.roles.sort_by_key(|r| r.position);
        let mut state = self.state.write().await;
        state.pending.remove(&guild.id);
        if guild.unavailable {
            return state.check_ready();
        }
        match state.guilds.iter().position(|g| g.id == guild.id) {
            Some(index) => {
                // GUILD_UPDATE omits member_count
                let member_count = guild.member_count.or(state.guilds[index].member_count);
                state.guilds[index] = Guild {
                    member_count,
                    ..guild
                };
            }
            None => state.guilds.push(guild),
        }
        state.check_ready()
    }

    pub async fn remove_guild(&self, guild_id: Snowflake) -> Option<Guild> {
        let mut state = self.state.write().await;
        state.pending.remove(&guild_id);
        let index = state.guilds.iter().position(|g| g.id == guild_id)?;
        Some(state.guilds.remove(index))
    }

    pub async fn upsert_role(&self, guild_id: Snowflake, role: Role) {
        let mut state = self.state.write().await;
        if let Some(guild) = state.guilds.iter_mut().find(|g| g.id == guild_id) {
            match guild.roles.iter_mut().find(|r| r.id == role.id) {
                Some(existing) => *existing = role,
                None => guild.roles.push(role),
            }
            guild.roles.sort_by_key(|r| r.position);
        }
    }

    pub async fn remove_role(&self, guild_id: Snowflake, role_id: Snowflake) {
        let mut state = self.state.write().await;
        if let Some(guild) = state.guilds.iter_mut().find(|g| g.id == guild_id) {
            guild.roles.retain(|r| r.id != role_id);
        }
    }

    /// Mark the connection lost; lookups keep serving the last known state.
    pub async fn on_disconnect(&self) {
        let mut state = self.state.write().await;
        state.ready_received = false;
    }

    pub async fn is_ready(&self) -> bool {
        self.state.read().await.ready
    }

    pub async fn bot_user(&self) -> Option<User> {
        self.state.read().await.bot_user.clone()
    }

    pub async fn guilds(&self) -> Vec<Guild> {
        self.state.read().await.guilds.clone()
    }

    pub async fn guild(&self, guild_id: Snowflake) -> Option<Guild> {
        self.state
            .read()
            .await
            .guilds
            .iter()
            .find(|g| g.id == guild_id)
            .cloned()
    }
}
