use serde::{Deserialize, Serialize};

/// Result of one role-grant attempt from the web flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleGrantOutcome {
    Granted,
    /// No guild could be resolved; role granting is optional.
    Skipped,
    Failed,
}

impl RoleGrantOutcome {
    /// Status line for the post-login page.
    pub fn status_message(&self) -> &'static str {
        match self {
            RoleGrantOutcome::Granted => "Your role has been granted.",
            RoleGrantOutcome::Skipped => "Role granting is not configured on this server.",
            RoleGrantOutcome::Failed => "The role could not be granted.",
        }
    }
}

impl std::fmt::Display for RoleGrantOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoleGrantOutcome::Granted => write!(f, "granted"),
            RoleGrantOutcome::Skipped => write!(f, "skipped"),
            RoleGrantOutcome::Failed => write!(f, "failed"),
        }
    }
}
