use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::DirectoryResult;
use crate::models::{User, UserId};

/// Read-only lookup of users by id. Implementations must tolerate concurrent use.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// `Ok(None)` when no such user exists.
    async fn get_by_id(&self, id: &UserId) -> DirectoryResult<Option<User>>;
}

/// In-memory implementation of UserDirectory (for development/testing)
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserDirectory {
    users: Arc<RwLock<HashMap<UserId, User>>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        let users = users.into_iter().map(|u| (u.id.clone(), u)).collect();
        Self {
            users: Arc::new(RwLock::new(users)),
        }
    }

    pub async fn insert(&self, user: User) {
        self.users.write().await.insert(user.id.clone(), user);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn get_by_id(&self, id: &UserId) -> DirectoryResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn maria() -> User {
        User::new(UserId::parse("U1").unwrap(), "Maria", "maria@example.com")
    }

    #[tokio::test]
    async fn test_lookup_existing_and_missing() {
        let directory = InMemoryUserDirectory::with_users([maria()]);

        let found = directory.get_by_id(&UserId::parse("U1").unwrap()).await.unwrap();
        assert_eq!(found, Some(maria()));

        let missing = directory.get_by_id(&UserId::parse("U2").unwrap()).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_insert_is_visible_to_clones() {
        let directory = InMemoryUserDirectory::new();
        let clone = directory.clone();
        directory.insert(maria()).await;

        assert!(clone.get_by_id(&maria().id).await.unwrap().is_some());
    }
}
