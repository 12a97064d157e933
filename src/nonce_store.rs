//! Nonce lifecycle on top of a [`NonceStorage`] backend
//!
//! [`NonceStore`] owns the policy (random values, TTL, the clock used for
//! expiry) while the backend owns atomicity. Nonce values never appear in
//! log output.

use crate::address::CanonicalAddress;
use crate::clock::Clock;
use crate::config::MAX_NONCE_TTL;
use crate::nonce_storage::NonceStorage;
use crate::random::{generate_nonce_value, RandomSource};
use crate::types::{ClientInfo, Nonce};
use crate::{AuthError, Result};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Issues, claims and sweeps per-wallet login nonces
pub struct NonceStore<S: NonceStorage> {
    storage: Arc<S>,
    clock: Arc<dyn Clock>,
    random: Arc<dyn RandomSource>,
    ttl: Duration,
}

impl<S: NonceStorage> Clone for NonceStore<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            clock: Arc::clone(&self.clock),
            random: Arc::clone(&self.random),
            ttl: self.ttl,
        }
    }
}

impl<S: NonceStorage> std::fmt::Debug for NonceStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceStore")
            .field("ttl_secs", &self.ttl.num_seconds())
            .finish()
    }
}

impl<S: NonceStorage> NonceStore<S> {
    /// Create a store issuing nonces valid for `ttl`
    pub fn new(
        storage: Arc<S>,
        clock: Arc<dyn Clock>,
        random: Arc<dyn RandomSource>,
        ttl: std::time::Duration,
    ) -> Result<Self> {
        if ttl > MAX_NONCE_TTL {
            return Err(AuthError::config("Nonce TTL must not exceed 24 hours"));
        }
        let ttl = Duration::from_std(ttl)
            .map_err(|_| AuthError::config("Nonce TTL out of range"))?;
        if ttl <= Duration::zero() {
            return Err(AuthError::config("Nonce TTL must be greater than zero"));
        }

        Ok(Self {
            storage,
            clock,
            random,
            ttl,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Current time by the store's clock
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Issue a fresh nonce for `wallet`, replacing any previous one
    pub async fn issue(&self, wallet: &CanonicalAddress, client: &ClientInfo) -> Result<Nonce> {
        let value = generate_nonce_value(self.random.as_ref());
        let nonce = Nonce::new(*wallet, value, self.clock.now(), self.ttl, client)?;

        self.storage.upsert(nonce.clone()).await?;

        tracing::debug!(
            wallet = %wallet,
            expires_at = %nonce.expires_at,
            client_ip = nonce.client_ip.as_deref().unwrap_or("-"),
            "Issued login nonce"
        );
        Ok(nonce)
    }

    /// Atomically consume the nonce for `wallet`
    pub async fn claim(&self, wallet: &CanonicalAddress) -> Result<Nonce> {
        let now = self.clock.now();
        match self.storage.claim(wallet, now).await {
            Ok(nonce) => {
                tracing::debug!(wallet = %wallet, "Claimed login nonce");
                Ok(nonce)
            }
            Err(e) => {
                tracing::debug!(wallet = %wallet, reason = e.code(), "Nonce claim rejected");
                Err(e)
            }
        }
    }

    /// Read the current nonce for `wallet` without consuming it
    pub async fn peek(&self, wallet: &CanonicalAddress) -> Result<Option<Nonce>> {
        self.storage.get(wallet).await
    }

    /// Delete the nonce for `wallet`
    pub async fn invalidate(&self, wallet: &CanonicalAddress) -> Result<bool> {
        let removed = self.storage.remove(wallet).await?;
        if removed {
            tracing::info!(wallet = %wallet, "Invalidated login nonce");
        }
        Ok(removed)
    }

    /// Delete nonces that expired before `before`
    pub async fn sweep_expired(&self, before: DateTime<Utc>) -> Result<u64> {
        let removed = self.storage.sweep_expired(before).await?;
        if removed > 0 {
            tracing::info!(removed, before = %before, "Swept expired nonces");
        }
        Ok(removed)
    }

    /// Sweep with the store's clock
    pub async fn sweep_now(&self) -> Result<u64> {
        self.sweep_expired(self.clock.now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::nonce_storage::InMemoryStorage;
    use crate::random::OsRandom;

    fn wallet() -> CanonicalAddress {
        "0x70997970c51812dc3a010c7d01b50e0d17dc79c8".parse().unwrap()
    }

    fn store(clock: &FakeClock) -> NonceStore<InMemoryStorage> {
        NonceStore::new(
            Arc::new(InMemoryStorage::new()),
            Arc::new(clock.clone()),
            Arc::new(OsRandom),
            std::time::Duration::from_secs(300),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_issue_sets_ttl_and_provenance() {
        let clock = FakeClock::new();
        let store = store(&clock);
        let client = ClientInfo::new()
            .with_ip("198.51.100.4")
            .with_user_agent("MetaMask/11");

        let nonce = store.issue(&wallet(), &client).await.unwrap();

        assert_eq!(nonce.value.len(), 32);
        assert_eq!(nonce.created_at, clock.now());
        assert_eq!(nonce.expires_at, clock.now() + Duration::minutes(5));
        assert!(!nonce.used);
        assert_eq!(nonce.client_ip.as_deref(), Some("198.51.100.4"));
        assert_eq!(nonce.user_agent.as_deref(), Some("MetaMask/11"));
        assert_eq!(store.peek(&wallet()).await.unwrap(), Some(nonce));
    }

    #[tokio::test]
    async fn test_reissue_invalidates_previous_value() {
        let clock = FakeClock::new();
        let store = store(&clock);

        let first = store.issue(&wallet(), &ClientInfo::new()).await.unwrap();
        let second = store.issue(&wallet(), &ClientInfo::new()).await.unwrap();
        assert_ne!(first.value, second.value);

        let claimed = store.claim(&wallet()).await.unwrap();
        assert_eq!(claimed.value, second.value);
    }

    #[tokio::test]
    async fn test_claim_twice() {
        let clock = FakeClock::new();
        let store = store(&clock);
        store.issue(&wallet(), &ClientInfo::new()).await.unwrap();

        assert!(store.claim(&wallet()).await.is_ok());
        let err = store.claim(&wallet()).await.unwrap_err();
        assert!(matches!(err, AuthError::NonceAlreadyUsed { .. }));
    }

    #[tokio::test]
    async fn test_claim_after_expiry() {
        let clock = FakeClock::new();
        let store = store(&clock);
        store.issue(&wallet(), &ClientInfo::new()).await.unwrap();

        clock.advance(Duration::minutes(5));
        let err = store.claim(&wallet()).await.unwrap_err();
        assert!(matches!(err, AuthError::NonceExpired { .. }));
        assert!(store.peek(&wallet()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_just_before_expiry() {
        let clock = FakeClock::new();
        let store = store(&clock);
        store.issue(&wallet(), &ClientInfo::new()).await.unwrap();

        clock.advance(Duration::seconds(299));
        assert!(store.claim(&wallet()).await.is_ok());
    }

    #[tokio::test]
    async fn test_invalidate() {
        let clock = FakeClock::new();
        let store = store(&clock);
        store.issue(&wallet(), &ClientInfo::new()).await.unwrap();

        assert!(store.invalidate(&wallet()).await.unwrap());
        assert!(!store.invalidate(&wallet()).await.unwrap());
        let err = store.claim(&wallet()).await.unwrap_err();
        assert!(matches!(err, AuthError::NonceNotFound { .. }));
    }

    #[tokio::test]
    async fn test_sweep_now() {
        let clock = FakeClock::new();
        let store = store(&clock);
        store.issue(&wallet(), &ClientInfo::new()).await.unwrap();

        assert_eq!(store.sweep_now().await.unwrap(), 0);

        clock.advance(Duration::minutes(6));
        assert_eq!(store.sweep_now().await.unwrap(), 1);
        assert!(store.storage().is_empty().await);
    }

    #[test]
    fn test_zero_ttl_is_rejected() {
        let err = NonceStore::new(
            Arc::new(InMemoryStorage::new()),
            Arc::new(FakeClock::new()),
            Arc::new(OsRandom),
            std::time::Duration::ZERO,
        )
        .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_oversized_ttl_is_rejected() {
        for secs in [9_000_000_000_000, u64::MAX] {
            let err = NonceStore::new(
                Arc::new(InMemoryStorage::new()),
                Arc::new(FakeClock::new()),
                Arc::new(OsRandom),
                std::time::Duration::from_secs(secs),
            )
            .unwrap_err();
            assert!(matches!(err, AuthError::Configuration { .. }), "{}", secs);
        }
    }
}
