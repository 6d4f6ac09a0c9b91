use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rolegate_common::User;

/// Directory entry written on every successful authentication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Platform user ID; directory key.
    pub external_id: String,
    /// Name at time of authentication (not kept fresh).
    pub display_name: String,
    /// Absent when the email scope was not granted.
    pub email: Option<String>,
    /// Client address at authentication time.
    pub origin_address: String,
    pub authenticated_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn from_profile(profile: &User, origin_address: impl Into<String>) -> Self {
        Self {
            external_id: profile.id.to_string(),
            display_name: profile.tag(),
            email: profile.email.clone(),
            origin_address: origin_address.into(),
            authenticated_at: Utc::now(),
        }
    }
}
