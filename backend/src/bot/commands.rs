//! Prefix commands and button interactions.

use std::sync::Arc;

use rolegate_common::message::interaction_type;
use rolegate_common::{
    Button, ButtonStyle, CreateMessage, Embed, Guild, Interaction, InteractionResponse, Member,
    Message, Role, Snowflake, User, COLOR_BLURPLE, COLOR_GREEN,
};

use crate::directory::UserDirectory;
use crate::platform::DiscordHttp;

use super::grant::{InteractiveGrant, InteractiveGrantError, RoleAssigner};

/// Custom ID of the button that sends the login link.
pub const AUTH_BUTTON_ID: &str = "auth";
/// Prefix of role buttons; the role ID follows.
pub const ROLE_BUTTON_PREFIX: &str = "role_assign:";

const NOT_CONFIGURED: &str = "Not configured";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Auth,
    SetupRole(Option<Snowflake>),
    Role(Option<Snowflake>),
}

/// Parse a prefixed command. Unknown commands and plain messages yield `None`.
pub fn parse_command(prefix: &str, content: &str) -> Option<Command> {
    let rest = content.trim().strip_prefix(prefix)?;
    let mut parts = rest.split_whitespace();
    let name = parts.next()?;
    let arg = parts.next().and_then(parse_mention);
    match name {
        "auth" => Some(Command::Auth),
        "setuprole" => Some(Command::SetupRole(arg)),
        "role" => Some(Command::Role(arg)),
        _ => None,
    }
}

/// Accepts `<@id>`, `<@!id>`, `<@&id>` or a bare ID.
pub fn parse_mention(arg: &str) -> Option<Snowflake> {
    let id = arg
        .strip_prefix("<@")
        .and_then(|s| s.strip_suffix('>'))
        .map(|s| s.trim_start_matches(['!', '&']))
        .unwrap_or(arg);
    id.parse().ok()
}

/// Guild owner, or a member holding a role with the administrator bit.
///
/// Every member implicitly holds `@everyone`, whose ID is the guild ID.
pub fn is_admin(guild: &Guild, user_id: Snowflake, member: &Member) -> bool {
    if guild.owner_id == Some(user_id) {
        return true;
    }
    std::iter::once(&guild.id)
        .chain(member.roles.iter())
        .filter_map(|id| guild.role(*id))
        .any(Role::is_administrator)
}

fn role_color(role: &Role, fallback: u32) -> u32 {
    if role.color == 0 {
        fallback
    } else {
        role.color
    }
}

/// Status embed with the login button.
pub fn auth_prompt(guild_name: &str, role_name: &str, authenticated: bool) -> CreateMessage {
    let mut embed = Embed::new(
        "Authentication",
        format!("**{}**\nMember verification page", guild_name),
        COLOR_BLURPLE,
    )
    .field("Server", guild_name, true)
    .field("Role", role_name, true);

    embed = if authenticated {
        embed.color = Some(COLOR_GREEN);
        embed.field("✅ Status", "Authenticated", false)
    } else {
        embed.field("❌ Status", "Not authenticated", false)
    };

    CreateMessage::embed(embed).with_button(Button::new(
        ButtonStyle::Primary,
        "Verify as member",
        AUTH_BUTTON_ID,
    ))
}

/// Ephemeral reply carrying the login link.
pub fn login_link(login_url: &str, guild_name: &str, role_name: &str) -> CreateMessage {
    let embed = Embed::new(
        "🔐 OAuth2 authentication",
        format!(
            "Follow the link below to complete authentication:\n\n[**🔗 Go to the verification site**]({})",
            login_url
        ),
        COLOR_BLURPLE,
    )
    .field("🏠 Server", guild_name, true)
    .field("🎭 Role granted", role_name, true)
    .field(
        "📋 Steps",
        "1. Open the link above\n2. Log in\n3. Authorize the application\n4. The role is granted automatically",
        false,
    );
    CreateMessage::embed(embed).ephemeral()
}

/// Persistent self-service button for one role.
pub fn role_button_message(role: &Role) -> CreateMessage {
    let embed = Embed::new(
        "🎭 Role assignment",
        format!("Click the button below to get the **{}** role.", role.name),
        role_color(role, COLOR_BLURPLE),
    )
    .field("📋 Available role", format!("🎭 {}", role.mention()), true)
    .field(
        "ℹ️ Notes",
        "• Anyone can press the button\n• Nothing happens if you already have the role\n• No authentication required",
        false,
    );
    CreateMessage::embed(embed).with_button(Button::new(
        ButtonStyle::Success,
        "🎭 Get role",
        format!("{}{}", ROLE_BUTTON_PREFIX, role.id),
    ))
}

/// Ephemeral reply for a role button press.
pub fn interactive_reply(
    user: &User,
    result: Result<InteractiveGrant, InteractiveGrantError>,
) -> CreateMessage {
    let message = match result {
        Ok(InteractiveGrant::AlreadyHasRole(role)) => {
            CreateMessage::text(format!("✅ You already have the **{}** role.", role.name))
        }
        Ok(InteractiveGrant::Granted(role)) => {
            let embed = Embed::new(
                "🎉 Role granted!",
                format!("The **{}** role has been granted.", role.name),
                role_color(&role, COLOR_GREEN),
            )
            .field("👤 User", user.mention(), true)
            .field("🎭 Role", role.mention(), true);
            CreateMessage::embed(embed)
        }
        Err(InteractiveGrantError::RoleNotFound) => {
            CreateMessage::text("❌ Role not found. Please contact an administrator.")
        }
        Err(InteractiveGrantError::PermissionDenied) => CreateMessage::text(
            "❌ I don't have permission to grant this role. Please check the bot's role settings.",
        ),
        Err(InteractiveGrantError::Failed(e)) => {
            CreateMessage::text(format!("❌ An error occurred: {}", e))
        }
    };
    message.ephemeral()
}

/// Handles bot commands from `MESSAGE_CREATE` and button clicks from `INTERACTION_CREATE`.
pub struct CommandHandler {
    http: Arc<DiscordHttp>,
    assigner: RoleAssigner,
    directory: Arc<UserDirectory>,
    prefix: String,
    login_url: String,
}

impl CommandHandler {
    pub fn new(
        http: Arc<DiscordHttp>,
        assigner: RoleAssigner,
        directory: Arc<UserDirectory>,
        prefix: String,
        login_url: String,
    ) -> Self {
        Self {
            http,
            assigner,
            directory,
            prefix,
            login_url,
        }
    }

    pub async fn handle_message(&self, message: Message) {
        if message.author.bot {
            return;
        }
        let Some(command) = parse_command(&self.prefix, &message.content) else {
            return;
        };
        tracing::debug!(
            channel_id = %message.channel_id,
            author = %message.author.tag(),
            ?command,
            "Handling command"
        );

        let reply = self.command_reply(&message, &command).await;
        if let Err(e) = self.http.create_message(message.channel_id, &reply).await {
            tracing::error!(channel_id = %message.channel_id, "Failed to send reply: {}", e);
            return;
        }

        // Only a successfully posted role button replaces the setup command
        if matches!(command, Command::SetupRole(_)) && !reply.components.is_empty() {
            if let Err(e) = self
                .http
                .delete_message(message.channel_id, message.id)
                .await
            {
                tracing::warn!(message_id = %message.id, "Failed to delete setup command: {}", e);
            }
        }
    }

    pub async fn handle_interaction(&self, interaction: Interaction) {
        let Some(reply) = self.interaction_reply(&interaction).await else {
            return;
        };
        let response = InteractionResponse::message(reply);
        if let Err(e) = self
            .http
            .create_interaction_response(interaction.id, &interaction.token, &response)
            .await
        {
            tracing::error!(interaction_id = %interaction.id, "Failed to answer interaction: {}", e);
        }
    }

    /// Names of the guild/role a login would target, auto-detection first.
    async fn target_names(&self) -> (String, String) {
        let detected = self.assigner.detect().await;
        let defaults = self.assigner.defaults();
        let guild_id = detected.map(|t| t.guild_id).or(defaults.guild_id);
        let role_id = detected.and_then(|t| t.role_id).or(defaults.role_id);

        let guild = match guild_id {
            Some(id) => self.assigner.platform().guild(id).await,
            None => None,
        };
        let guild_name = guild
            .as_ref()
            .map(|g| g.name.clone())
            .unwrap_or_else(|| NOT_CONFIGURED.to_string());
        let role_name = guild
            .as_ref()
            .zip(role_id)
            .and_then(|(g, id)| g.role(id))
            .map(|r| r.name.clone())
            .unwrap_or_else(|| NOT_CONFIGURED.to_string());
        (guild_name, role_name)
    }

    /// Build the channel reply for a command.
    pub async fn command_reply(&self, message: &Message, command: &Command) -> CreateMessage {
        match command {
            Command::Auth => {
                let (guild_name, role_name) = self.target_names().await;
                let authenticated = self
                    .directory
                    .contains(&message.author.id.to_string())
                    .await;
                auth_prompt(&guild_name, &role_name, authenticated)
            }
            Command::SetupRole(role_id) => {
                let guild = match self.admin_guild(message).await {
                    Ok(guild) => guild,
                    Err(reply) => return reply,
                };
                let Some(role_id) = role_id.or_else(|| message.mention_roles.first().copied()) else {
                    return CreateMessage::text(format!(
                        "Usage: {}setuprole <role>",
                        self.prefix
                    ));
                };
                match guild.role(role_id) {
                    Some(role) => role_button_message(role),
                    None => CreateMessage::text("❌ Role not found."),
                }
            }
            Command::Role(user_id) => {
                let guild = match self.admin_guild(message).await {
                    Ok(guild) => guild,
                    Err(reply) => return reply,
                };
                let Some(user_id) = user_id.or_else(|| message.mentions.first().map(|u| u.id)) else {
                    return CreateMessage::text(format!(
                        "Usage: {}role <member>",
                        self.prefix
                    ));
                };
                CreateMessage::text(self.grant_default_role(&guild, user_id).await)
            }
        }
    }

    /// The invoking guild, if the author may run admin commands there.
    async fn admin_guild(&self, message: &Message) -> Result<Guild, CreateMessage> {
        let Some(guild_id) = message.guild_id else {
            return Err(CreateMessage::text("This command only works in a server."));
        };
        let Some(guild) = self.assigner.platform().guild(guild_id).await else {
            return Err(CreateMessage::text("❌ Server information is not available yet."));
        };
        let authorized = message
            .member
            .as_ref()
            .is_some_and(|m| is_admin(&guild, message.author.id, m));
        if !authorized {
            tracing::info!(
                guild_id = %guild_id,
                author = %message.author.tag(),
                "Refused admin command"
            );
            return Err(CreateMessage::text(
                "❌ You need administrator permission to use this command.",
            ));
        }
        Ok(guild)
    }

    async fn grant_default_role(&self, guild: &Guild, user_id: Snowflake) -> String {
        let role_id = self
            .assigner
            .detect()
            .await
            .and_then(|t| t.role_id)
            .or(self.assigner.defaults().role_id);
        let Some(role_id) = role_id else {
            return "No role is configured and none could be detected, so no role was granted."
                .to_string();
        };
        let Some(role) = guild.role(role_id) else {
            return "❌ The configured role was not found in this server.".to_string();
        };

        match self
            .assigner
            .platform()
            .add_member_role(guild.id, user_id, role.id)
            .await
        {
            Ok(()) => {
                tracing::info!(guild_id = %guild.id, user_id = %user_id, "Granted role '{}' by command", role.name);
                format!("Granted the {} role to <@{}>!", role.name, user_id)
            }
            Err(e) if e.is_forbidden() => {
                "❌ I don't have permission to grant this role.".to_string()
            }
            Err(e) => {
                tracing::error!(guild_id = %guild.id, user_id = %user_id, "Role command failed: {}", e);
                format!("❌ An error occurred: {}", e)
            }
        }
    }

    /// Build the ephemeral reply for a component interaction, if any.
    pub async fn interaction_reply(&self, interaction: &Interaction) -> Option<CreateMessage> {
        if interaction.kind != interaction_type::MESSAGE_COMPONENT {
            return None;
        }
        let custom_id = interaction.custom_id()?;

        if custom_id == AUTH_BUTTON_ID {
            let (guild_name, role_name) = self.target_names().await;
            return Some(login_link(&self.login_url, &guild_name, &role_name));
        }

        let role_id: Snowflake = custom_id.strip_prefix(ROLE_BUTTON_PREFIX)?.parse().ok()?;
        let user = interaction.invoker()?.clone();
        let (Some(guild_id), Some(member)) = (interaction.guild_id, interaction.member.as_ref())
        else {
            return Some(
                CreateMessage::text("This button only works in a server.").ephemeral(),
            );
        };

        let result = self
            .assigner
            .grant_interactive(guild_id, role_id, user.id, member)
            .await;
        if let Err(ref e) = result {
            tracing::warn!(guild_id = %guild_id, role_id = %role_id, user_id = %user.id, "Role button failed: {}", e);
        }
        Some(interactive_reply(&user, result))
    }
}
