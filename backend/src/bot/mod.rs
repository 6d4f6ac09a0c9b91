//! Bot side: gateway connection, commands, and role granting.

pub mod commands;
pub mod gateway;
pub mod grant;
pub mod worker;

pub use commands::CommandHandler;
pub use gateway::{GatewayClient, GatewayError};
pub use grant::{GrantTarget, RoleAssigner, Target, TargetDefaults};
pub use worker::RoleGranter;
