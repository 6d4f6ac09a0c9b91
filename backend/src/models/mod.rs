pub mod grant;
pub mod guild;
pub mod user;

pub use grant::RoleGrantOutcome;
pub use guild::{GuildSummary, RoleSummary};
pub use user::UserRecord;
