use serde::{Deserialize, Serialize};

use rolegate_common::{Guild, Role, Snowflake};

/// Guild entry of `/api/guilds` and the login-page picker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildSummary {
    pub id: Snowflake,
    pub name: String,
    pub member_count: Option<u64>,
    /// Every role except `@everyone`.
    pub roles: Vec<RoleSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleSummary {
    pub id: Snowflake,
    pub name: String,
    /// `#rrggbb`
    pub color: String,
}

impl From<&Role> for RoleSummary {
    fn from(role: &Role) -> Self {
        Self {
            id: role.id,
            name: role.name.clone(),
            color: role.color_hex(),
        }
    }
}

impl From<&Guild> for GuildSummary {
    fn from(guild: &Guild) -> Self {
        Self {
            id: guild.id,
            name: guild.name.clone(),
            member_count: guild.member_count,
            roles: guild.assignable_roles().map(RoleSummary::from).collect(),
        }
    }
}
