//! Chat platform resource models (users, guilds, roles, members).

use serde::{Deserialize, Serialize};

use crate::Snowflake;

/// Permission bit granting every other permission.
pub const PERMISSION_ADMINISTRATOR: u64 = 1 << 3;

/// A platform user, as returned by `/users/@me` or embedded in members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Snowflake,
    pub username: String,
    /// Legacy discriminator; `"0"` for accounts migrated to unique usernames.
    #[serde(default)]
    pub discriminator: Option<String>,
    #[serde(default)]
    pub global_name: Option<String>,
    /// Only present when the `email` scope was granted.
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

impl User {
    /// Human-readable tag: `name#1234` for legacy accounts, otherwise the username.
    pub fn tag(&self) -> String {
        match self.discriminator.as_deref() {
            Some(d) if !d.is_empty() && d != "0" => format!("{}#{}", self.username, d),
            _ => self.username.clone(),
        }
    }

    /// Mention markup that pings the user.
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

/// A role within a guild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: Snowflake,
    pub name: String,
    #[serde(default)]
    pub color: u32,
    /// Managed roles belong to integrations and cannot be assigned manually.
    #[serde(default)]
    pub managed: bool,
    #[serde(default)]
    pub position: i32,
    /// Permission bitset, serialized by the platform as a decimal string.
    #[serde(default)]
    pub permissions: String,
}

impl Role {
    /// The implicit `@everyone` role shares its ID with the guild.
    pub fn is_everyone(&self, guild_id: Snowflake) -> bool {
        self.id == guild_id || self.name == "@everyone"
    }

    pub fn permission_bits(&self) -> u64 {
        self.permissions.parse().unwrap_or(0)
    }

    pub fn is_administrator(&self) -> bool {
        self.permission_bits() & PERMISSION_ADMINISTRATOR != 0
    }

    /// Color as `#rrggbb`.
    pub fn color_hex(&self) -> String {
        format!("#{:06x}", self.color)
    }

    pub fn mention(&self) -> String {
        format!("<@&{}>", self.id)
    }
}

/// A guild (community server).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guild {
    pub id: Snowflake,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub owner_id: Option<Snowflake>,
    /// Only sent with `GUILD_CREATE` or `with_counts=true`.
    #[serde(default, alias = "approximate_member_count")]
    pub member_count: Option<u64>,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub unavailable: bool,
}

impl Guild {
    pub fn role(&self, role_id: Snowflake) -> Option<&Role> {
        self.roles.iter().find(|r| r.id == role_id)
    }

    /// Roles a member could be granted: everything except `@everyone`.
    pub fn assignable_roles(&self) -> impl Iterator<Item = &Role> {
        self.roles.iter().filter(move |r| !r.is_everyone(self.id))
    }

    /// First role that is neither `@everyone` nor integration-managed.
    pub fn first_grantable_role(&self) -> Option<&Role> {
        self.assignable_roles().find(|r| !r.managed)
    }
}

/// Guild placeholder sent in `READY` and `GUILD_DELETE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnavailableGuild {
    pub id: Snowflake,
    #[serde(default)]
    pub unavailable: bool,
}

/// A guild member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    /// Absent in `MESSAGE_CREATE`, where the author is sent separately.
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<Snowflake>,
    /// Computed permissions; only present on interaction payloads.
    #[serde(default)]
    pub permissions: Option<String>,
}

impl Member {
    pub fn has_role(&self, role_id: Snowflake) -> bool {
        self.roles.contains(&role_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(id: u64, name: &str, managed: bool) -> Role {
        Role {
            id: Snowflake(id),
            name: name.to_string(),
            color: 0,
            managed,
            position: 0,
            permissions: "0".to_string(),
        }
    }

    #[test]
    fn test_user_tag_legacy_and_migrated() {
        let mut user: User = serde_json::from_value(serde_json::json!({
            "id": "1",
            "username": "alice",
            "discriminator": "1234"
        }))
        .unwrap();
        assert_eq!(user.tag(), "alice#1234");

        user.discriminator = Some("0".to_string());
        assert_eq!(user.tag(), "alice");

        user.discriminator = None;
        assert_eq!(user.tag(), "alice");
    }

    #[test]
    fn test_first_grantable_role_skips_everyone_and_managed() {
        let guild = Guild {
            id: Snowflake(10),
            name: "g".to_string(),
            owner_id: None,
            member_count: Some(3),
            roles: vec![
                role(10, "@everyone", false),
                role(11, "Bot Integration", true),
                role(12, "Member", false),
                role(13, "Moderator", false),
            ],
            unavailable: false,
        };
        assert_eq!(guild.first_grantable_role().map(|r| r.id), Some(Snowflake(12)));
        assert_eq!(guild.assignable_roles().count(), 3);
    }

    #[test]
    fn test_administrator_bit() {
        let mut r = role(1, "Admin", false);
        r.permissions = "8".to_string();
        assert!(r.is_administrator());
        r.permissions = "2147483647".to_string();
        assert!(r.is_administrator());
        r.permissions = "1024".to_string();
        assert!(!r.is_administrator());
    }

    #[test]
    fn test_color_hex() {
        let mut r = role(1, "Blue", false);
        r.color = 0x5865F2;
        assert_eq!(r.color_hex(), "#5865f2");
    }
}
