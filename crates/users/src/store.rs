//! User persistence boundary.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use thiserror::Error;

use kluster_core::UserId;

use crate::user::{ApplicationUser, normalize_email};

#[derive(Debug, Error)]
pub enum UserStoreError {
    #[error("a user with this email already exists")]
    DuplicateEmail,

    #[error("user not found")]
    NotFound,

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Async user repository. Email lookups are case-insensitive.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, user: &ApplicationUser) -> Result<(), UserStoreError>;

    async fn find_by_id(&self, id: &UserId) -> Result<Option<ApplicationUser>, UserStoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<ApplicationUser>, UserStoreError>;

    /// Replace a stored user. Fails with `NotFound` when the id is unknown.
    async fn update(&self, user: &ApplicationUser) -> Result<(), UserStoreError>;
}

/// In-memory store for dev/test.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<UserId, ApplicationUser>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> UserStoreError {
    UserStoreError::Backend("user store lock poisoned".into())
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn insert(&self, user: &ApplicationUser) -> Result<(), UserStoreError> {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        let email = user.normalized_email();
        if users.values().any(|u| u.normalized_email() == email) {
            return Err(UserStoreError::DuplicateEmail);
        }
        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<ApplicationUser>, UserStoreError> {
        let users = self.users.read().map_err(|_| poisoned())?;
        Ok(users.get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<ApplicationUser>, UserStoreError> {
        let email = normalize_email(email);
        let users = self.users.read().map_err(|_| poisoned())?;
        Ok(users.values().find(|u| u.normalized_email() == email).cloned())
    }

    async fn update(&self, user: &ApplicationUser) -> Result<(), UserStoreError> {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        match users.get_mut(&user.id) {
            Some(existing) => {
                *existing = user.clone();
                Ok(())
            }
            None => Err(UserStoreError::NotFound),
        }
    }
}
