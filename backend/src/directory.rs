//! In-memory directory of authenticated users.
//!
//! Process-lifetime only: nothing is persisted and nothing expires. The
//! directory is an audit list for operators, not an authorization source.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::models::UserRecord;

/// Store of the last successful authentication per external user ID.
#[derive(Debug, Default)]
pub struct UserDirectory {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or wholesale-replace the record for `record.external_id`.
    ///
    /// Returns the record that was replaced, if any.
    pub async fn upsert(&self, record: UserRecord) -> Option<UserRecord> {
        let previous = self
            .users
            .write()
            .await
            .insert(record.external_id.clone(), record);
        if let Some(ref prev) = previous {
            tracing::debug!(user_id = %prev.external_id, "Replaced existing directory record");
        }
        previous
    }

    pub async fn get(&self, external_id: &str) -> Option<UserRecord> {
        self.users.read().await.get(external_id).cloned()
    }

    pub async fn contains(&self, external_id: &str) -> bool {
        self.users.read().await.contains_key(external_id)
    }

    /// All records, oldest authentication first.
    pub async fn list(&self) -> Vec<UserRecord> {
        let mut users: Vec<UserRecord> = self.users.read().await.values().cloned().collect();
        users.sort_by(|a, b| {
            a.authenticated_at
                .cmp(&b.authenticated_at)
                .then_with(|| a.external_id.cmp(&b.external_id))
        });
        users
    }

    /// Remove every record. Returns how many were dropped.
    pub async fn clear(&self) -> usize {
        let mut users = self.users.write().await;
        let removed = users.len();
        users.clear();
        removed
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}
