//! RoleGate Common Types
//!
//! Chat platform models and gateway protocol messages shared by the backend.

pub mod message;
pub mod model;
pub mod protocol;
pub mod snowflake;

pub use message::{
    ActionRow, Button, ButtonStyle, CreateMessage, Embed, EmbedField, Interaction, InteractionData,
    InteractionResponse, Message, COLOR_BLURPLE, COLOR_GREEN, FLAG_EPHEMERAL,
};
pub use model::{Guild, Member, Role, UnavailableGuild, User, PERMISSION_ADMINISTRATOR};
pub use protocol::{DispatchEvent, GatewayPayload, Hello, Identify, Ready};
pub use snowflake::Snowflake;
