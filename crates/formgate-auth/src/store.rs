//! The user record store.
//!
//! The store is an external collaborator: the verifier only ever asks it for
//! one record by username. [`InMemoryUserStore`] backs tests, the CLI, and
//! deployments that seed their users from settings.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use formgate_core::error::GateError;
use formgate_core::settings::UserSeed;
use tokio::sync::RwLock;

use crate::user::UserRecord;

/// A read-only lookup of user records by username.
///
/// Lookups must observe the latest committed record, so a password change
/// takes effect on the next verification.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Returns the record for `username`, or `None` if there is none.
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, GateError>;
}

/// A user store held in memory.
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<HashMap<String, UserRecord>>>,
}

impl InMemoryUserStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store populated from configured seed users.
    pub fn from_seeds(seeds: &[UserSeed]) -> Result<Self, GateError> {
        let mut users = HashMap::with_capacity(seeds.len());
        for seed in seeds {
            let record = UserRecord::from_seed(seed)?;
            if users.insert(record.username.clone(), record).is_some() {
                return Err(GateError::ConfigurationError(format!(
                    "Duplicate user '{}' in settings",
                    seed.username
                )));
            }
        }
        Ok(Self {
            users: Arc::new(RwLock::new(users)),
        })
    }

    /// Inserts a record, replacing any existing record with the same username.
    pub async fn insert(&self, record: UserRecord) {
        self.users
            .write()
            .await
            .insert(record.username.clone(), record);
    }

    /// Removes a record, returning it if it existed.
    pub async fn remove(&self, username: &str) -> Option<UserRecord> {
        self.users.write().await.remove(username)
    }

    /// Returns the number of stored records.
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    /// Returns `true` if the store holds no records.
    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, GateError> {
        Ok(self.users.read().await.get(username).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::Authority;

    #[tokio::test]
    async fn test_find_existing() {
        let store = InMemoryUserStore::new();
        store
            .insert(UserRecord::new("alice", "h", "xyz").with_authority(Authority::User))
            .await;

        let found = store.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(found.salt_suffix, "xyz");
    }

    #[tokio::test]
    async fn test_find_missing() {
        let store = InMemoryUserStore::new();
        assert!(store.find_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lookup_is_case_sensitive() {
        let store = InMemoryUserStore::new();
        store.insert(UserRecord::new("alice", "h", "")).await;
        assert!(store.find_by_username("Alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_replaces_record() {
        let store = InMemoryUserStore::new();
        store.insert(UserRecord::new("alice", "old", "")).await;
        store.insert(UserRecord::new("alice", "new", "")).await;

        assert_eq!(store.len().await, 1);
        let found = store.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(found.password_hash, "new");
    }

    #[tokio::test]
    async fn test_remove() {
        let store = InMemoryUserStore::new();
        store.insert(UserRecord::new("alice", "h", "")).await;
        assert!(store.remove("alice").await.is_some());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_from_seeds() {
        let seeds = vec![UserSeed {
            username: "root".to_string(),
            password_hash: "h".to_string(),
            salt_suffix: String::new(),
            authorities: vec!["ADMIN".to_string(), "USER".to_string()],
        }];
        let store = InMemoryUserStore::from_seeds(&seeds).unwrap();
        let root = store.find_by_username("root").await.unwrap().unwrap();
        assert_eq!(root.authorities.len(), 2);
    }

    #[test]
    fn test_from_seeds_duplicate() {
        let seed = UserSeed {
            username: "root".to_string(),
            password_hash: "h".to_string(),
            salt_suffix: String::new(),
            authorities: Vec::new(),
        };
        let result = InMemoryUserStore::from_seeds(&[seed.clone(), seed]);
        assert!(matches!(result, Err(GateError::ConfigurationError(_))));
    }

    #[tokio::test]
    async fn test_clones_share_records() {
        let store = InMemoryUserStore::new();
        let handle = store.clone();
        store.insert(UserRecord::new("alice", "h", "")).await;
        assert!(handle.find_by_username("alice").await.unwrap().is_some());
    }
}
