//! User directory
//!
//! The coordinator resolves wallets to users through [`UserDirectory`]. Real
//! deployments back it with their own user table; [`InMemoryUserDirectory`]
//! serves tests and single-process setups.

use crate::address::CanonicalAddress;
use crate::random::{generate_uuid, OsRandom, RandomSource};
use crate::types::User;
use crate::{AuthError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Lookup and creation of wallet owners
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Find the user owning `wallet`
    async fn find_by_wallet(&self, wallet: &CanonicalAddress) -> Result<Option<User>>;

    /// Create a user for `wallet`
    ///
    /// Idempotent: if a user already owns `wallet`, that record is returned.
    async fn create(&self, wallet: &CanonicalAddress, now: DateTime<Utc>) -> Result<User>;

    /// Record a successful login
    async fn touch_login(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<()>;
}

/// In-memory user directory keyed by wallet
#[derive(Clone)]
pub struct InMemoryUserDirectory {
    users: Arc<RwLock<HashMap<CanonicalAddress, User>>>,
    random: Arc<dyn RandomSource>,
}

impl std::fmt::Debug for InMemoryUserDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryUserDirectory").finish_non_exhaustive()
    }
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::with_random(Arc::new(OsRandom))
    }

    /// Use `random` to generate user ids
    pub fn with_random(random: Arc<dyn RandomSource>) -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
            random,
        }
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

impl Default for InMemoryUserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_wallet(&self, wallet: &CanonicalAddress) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(wallet).cloned())
    }

    async fn create(&self, wallet: &CanonicalAddress, now: DateTime<Utc>) -> Result<User> {
        let mut users = self.users.write().await;
        let user = users
            .entry(*wallet)
            .or_insert_with(|| User::new(generate_uuid(self.random.as_ref()), *wallet, now));
        Ok(user.clone())
    }

    async fn touch_login(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let mut users = self.users.write().await;
        let user = users
            .values_mut()
            .find(|user| user.id == user_id)
            .ok_or_else(|| AuthError::storage(format!("Unknown user {}", user_id)))?;
        user.last_login_at = at;
        Ok(())
    }
}
