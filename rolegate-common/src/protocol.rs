//! WebSocket gateway protocol types.
//!
//! Every frame is a JSON object `{ "op", "d", "s", "t" }`. The opcode decides
//! the shape of `d`; dispatch frames (`op = 0`) also carry the event name in
//! `t` and a sequence number in `s` that heartbeats must echo back.
//!
//! ## Connection Flow
//!
//! 1. Client connects and receives `Hello` with the heartbeat interval
//! 2. Client sends `Identify` with the bot token and intents
//! 3. Gateway dispatches `READY`, then one `GUILD_CREATE` per guild
//! 4. Client sends `Heartbeat` every interval; gateway answers `HeartbeatAck`
//! 5. Gateway may ask the client to `Reconnect` or report `InvalidSession`

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Guild, Member, Role, Snowflake, UnavailableGuild, User};

/// Gateway intents.
pub mod intents {
    pub const GUILDS: u64 = 1 << 0;
    pub const GUILD_MEMBERS: u64 = 1 << 1;
    pub const GUILD_MESSAGES: u64 = 1 << 9;
    pub const MESSAGE_CONTENT: u64 = 1 << 15;
}

/// Gateway opcodes used by the bot.
pub mod opcode {
    pub const DISPATCH: u8 = 0;
    pub const HEARTBEAT: u8 = 1;
    pub const IDENTIFY: u8 = 2;
    pub const RECONNECT: u8 = 7;
    pub const INVALID_SESSION: u8 = 9;
    pub const HELLO: u8 = 10;
    pub const HEARTBEAT_ACK: u8 = 11;
}

/// Close code sent when the bot token is rejected.
pub const CLOSE_AUTHENTICATION_FAILED: u16 = 4004;

/// Close codes after which reconnecting cannot succeed.
pub fn is_fatal_close_code(code: u16) -> bool {
    matches!(code, 4004 | 4010 | 4011 | 4012 | 4013 | 4014)
}

/// Raw gateway frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayPayload {
    pub op: u8,
    #[serde(default)]
    pub d: Value,
    #[serde(default)]
    pub s: Option<u64>,
    #[serde(default)]
    pub t: Option<String>,
}

impl GatewayPayload {
    pub fn heartbeat(last_sequence: Option<u64>) -> Self {
        Self {
            op: opcode::HEARTBEAT,
            d: last_sequence.map(Value::from).unwrap_or(Value::Null),
            s: None,
            t: None,
        }
    }

    pub fn identify(identify: &Identify) -> Self {
        Self {
            op: opcode::IDENTIFY,
            d: serde_json::to_value(identify).unwrap_or(Value::Null),
            s: None,
            t: None,
        }
    }
}

/// `d` of a `Hello` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hello {
    /// Milliseconds between heartbeats.
    pub heartbeat_interval: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identify {
    pub token: String,
    pub intents: u64,
    pub properties: IdentifyProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

impl Identify {
    pub fn new(token: impl Into<String>, intents: u64) -> Self {
        Self {
            token: token.into(),
            intents,
            properties: IdentifyProperties {
                os: std::env::consts::OS.to_string(),
                browser: "rolegate".to_string(),
                device: "rolegate".to_string(),
            },
        }
    }
}

/// `d` of the `READY` dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ready {
    pub user: User,
    #[serde(default)]
    pub guilds: Vec<UnavailableGuild>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// `d` of `GUILD_ROLE_CREATE` / `GUILD_ROLE_UPDATE`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildRoleEvent {
    pub guild_id: Snowflake,
    pub role: Role,
}

/// `d` of `GUILD_ROLE_DELETE`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildRoleDelete {
    pub guild_id: Snowflake,
    pub role_id: Snowflake,
}

/// `d` of `GUILD_MEMBER_ADD`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildMemberAdd {
    pub guild_id: Snowflake,
    #[serde(flatten)]
    pub member: Member,
}

/// Dispatch events the bot reacts to.
#[derive(Debug, Clone)]
pub enum DispatchEvent {
    Ready(Ready),
    GuildCreate(Guild),
    GuildUpdate(Guild),
    GuildDelete(UnavailableGuild),
    GuildRoleCreate(GuildRoleEvent),
    GuildRoleUpdate(GuildRoleEvent),
    GuildRoleDelete(GuildRoleDelete),
    GuildMemberAdd(GuildMemberAdd),
    MessageCreate(crate::Message),
    InteractionCreate(crate::Interaction),
    /// Any event the bot does not handle.
    Other(String),
}

impl DispatchEvent {
    /// Decode a dispatch frame's `t` and `d` into a typed event.
    pub fn parse(name: &str, data: Value) -> Result<Self, serde_json::Error> {
        Ok(match name {
            "READY" => Self::Ready(serde_json::from_value(data)?),
            "GUILD_CREATE" => Self::GuildCreate(serde_json::from_value(data)?),
            "GUILD_UPDATE" => Self::GuildUpdate(serde_json::from_value(data)?),
            "GUILD_DELETE" => Self::GuildDelete(serde_json::from_value(data)?),
            "GUILD_ROLE_CREATE" => Self::GuildRoleCreate(serde_json::from_value(data)?),
            "GUILD_ROLE_UPDATE" => Self::GuildRoleUpdate(serde_json::from_value(data)?),
            "GUILD_ROLE_DELETE" => Self::GuildRoleDelete(serde_json::from_value(data)?),
            "GUILD_MEMBER_ADD" => Self::GuildMemberAdd(serde_json::from_value(data)?),
            "MESSAGE_CREATE" => Self::MessageCreate(serde_json::from_value(data)?),
            "INTERACTION_CREATE" => Self::InteractionCreate(serde_json::from_value(data)?),
            other => Self::Other(other.to_string()),
        })
    }
}
