//! Storage trait for login nonces
//!
//! This module provides a trait-based storage abstraction for the single
//! live challenge each wallet may hold. Backends must make [`NonceStorage::claim`]
//! atomic: two concurrent claims for the same wallet must never both succeed.

use crate::address::CanonicalAddress;
use crate::types::Nonce;
use crate::{AuthError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Trait for storing and consuming nonce records
///
/// This trait allows different storage backends to be used by the nonce
/// store, enabling single-process and distributed deployments.
#[async_trait]
pub trait NonceStorage: Send + Sync {
    /// Insert or overwrite the nonce for `nonce.wallet_address`
    async fn upsert(&self, nonce: Nonce) -> Result<()>;

    /// Atomically consume the nonce for `wallet`
    ///
    /// Fails with `NonceNotFound`, `NonceAlreadyUsed` or `NonceExpired`, checked
    /// in that order. An unused nonce observed expired is deleted. On success
    /// the stored row is marked used at `now` and the consumed row is returned.
    async fn claim(&self, wallet: &CanonicalAddress, now: DateTime<Utc>) -> Result<Nonce>;

    /// Read the nonce for `wallet` without consuming it
    async fn get(&self, wallet: &CanonicalAddress) -> Result<Option<Nonce>>;

    /// Delete the nonce for `wallet`, returning whether one existed
    async fn remove(&self, wallet: &CanonicalAddress) -> Result<bool>;

    /// Delete every nonce with `expires_at < before`, used or not
    async fn sweep_expired(&self, before: DateTime<Utc>) -> Result<u64>;
}

/// In-memory storage implementation
///
/// This is the default storage implementation that uses an in-memory HashMap.
/// Data is lost when the process restarts.
#[derive(Debug, Clone)]
pub struct InMemoryStorage {
    nonces: Arc<RwLock<HashMap<CanonicalAddress, Nonce>>>,
}

impl InMemoryStorage {
    /// Create a new in-memory storage instance
    pub fn new() -> Self {
        Self {
            nonces: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of stored nonces, live or not
    pub async fn len(&self) -> usize {
        self.nonces.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.nonces.read().await.is_empty()
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NonceStorage for InMemoryStorage {
    async fn upsert(&self, nonce: Nonce) -> Result<()> {
        let mut nonces = self.nonces.write().await;
        nonces.insert(nonce.wallet_address, nonce);
        Ok(())
    }

    async fn claim(&self, wallet: &CanonicalAddress, now: DateTime<Utc>) -> Result<Nonce> {
        // The whole read-check-write runs under the write lock
        let mut nonces = self.nonces.write().await;

        let nonce = nonces.get_mut(wallet).ok_or_else(|| AuthError::NonceNotFound {
            wallet: wallet.to_string(),
        })?;

        if nonce.used {
            return Err(AuthError::NonceAlreadyUsed {
                wallet: wallet.to_string(),
            });
        }

        if nonce.is_expired(now) {
            nonces.remove(wallet);
            return Err(AuthError::NonceExpired {
                wallet: wallet.to_string(),
            });
        }

        nonce.mark_used(now);
        Ok(nonce.clone())
    }

    async fn get(&self, wallet: &CanonicalAddress) -> Result<Option<Nonce>> {
        let nonces = self.nonces.read().await;
        Ok(nonces.get(wallet).cloned())
    }

    async fn remove(&self, wallet: &CanonicalAddress) -> Result<bool> {
        let mut nonces = self.nonces.write().await;
        Ok(nonces.remove(wallet).is_some())
    }

    async fn sweep_expired(&self, before: DateTime<Utc>) -> Result<u64> {
        let mut nonces = self.nonces.write().await;
        let initial = nonces.len();
        nonces.retain(|_, nonce| nonce.expires_at >= before);
        Ok((initial - nonces.len()) as u64)
    }
}


#[cfg(feature = "redis")]
pub mod redis_storage {
    use super::{NonceStorage, Result};
    use crate::address::CanonicalAddress;
    use crate::types::Nonce;
    use crate::AuthError;
    use chrono::{DateTime, Utc};
    use redis::aio::MultiplexedConnection;
    use redis::{AsyncCommands, Client, Script};
    use std::collections::HashMap;
    use std::time::Duration;

    /// Default key prefix
    pub const DEFAULT_KEY_PREFIX: &str = "audion:nonce:";

    const FIELD_DATA: &str = "data";
    const FIELD_EXPIRES_AT: &str = "expires_at_ms";
    const FIELD_USED: &str = "used";
    const FIELD_USED_AT: &str = "used_at_ms";

    const SCAN_BATCH: usize = 200;

    // Returns {status, data}: 0 missing, 1 expired (deleted), 2 used, 3 claimed
    const CLAIM_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
  return {0, ''}
end
if redis.call('HGET', KEYS[1], 'used') == '1' then
  return {2, ''}
end
local expires_at = tonumber(redis.call('HGET', KEYS[1], 'expires_at_ms'))
if expires_at == nil or tonumber(ARGV[1]) >= expires_at then
  redis.call('DEL', KEYS[1])
  return {1, ''}
end
redis.call('HSET', KEYS[1], 'used', '1', 'used_at_ms', ARGV[1])
return {3, redis.call('HGET', KEYS[1], 'data')}
"#;

    const SWEEP_SCRIPT: &str = r#"
local expires_at = tonumber(redis.call('HGET', KEYS[1], 'expires_at_ms'))
if expires_at ~= nil and expires_at < tonumber(ARGV[1]) then
  return redis.call('DEL', KEYS[1])
end
return 0
"#;

    /// Redis-based storage implementation
    ///
    /// Each wallet's nonce lives in one hash: the serialized record plus the
    /// `used` and `expires_at_ms` fields the claim script inspects. Keys also
    /// carry a Redis expiry of `expires_at + retention` so a stalled sweeper
    /// cannot let them accumulate.
    #[derive(Debug, Clone)]
    pub struct RedisStorage {
        client: Client,
        key_prefix: String,
        retention: Duration,
        claim_script: Script,
        sweep_script: Script,
    }

    impl RedisStorage {
        /// Create a new Redis storage instance
        ///
        /// # Arguments
        ///
        /// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
        /// * `key_prefix` - Optional prefix for Redis keys (default: "audion:nonce:")
        pub async fn new(redis_url: &str, key_prefix: Option<&str>) -> Result<Self> {
            let client = Client::open(redis_url)
                .map_err(|e| AuthError::config(format!("Invalid Redis URL: {}", e)))?;

            let key_prefix = key_prefix.unwrap_or(DEFAULT_KEY_PREFIX).to_string();

            Ok(Self {
                client,
                key_prefix,
                retention: crate::config::DEFAULT_SWEEP_INTERVAL,
                claim_script: Script::new(CLAIM_SCRIPT),
                sweep_script: Script::new(SWEEP_SCRIPT),
            })
        }

        /// How long a key outlives its nonce before Redis drops it
        pub fn with_retention(mut self, retention: Duration) -> Self {
            self.retention = retention;
            self
        }

        pub fn key_prefix(&self) -> &str {
            &self.key_prefix
        }

        fn make_key(&self, wallet: &CanonicalAddress) -> String {
            format!("{}{}", self.key_prefix, wallet)
        }

        async fn connection(&self) -> Result<MultiplexedConnection> {
            self.client
                .get_multiplexed_async_connection()
                .await
                .map_err(|e| AuthError::storage(format!("Failed to get Redis connection: {}", e)))
        }

        fn decode(fields: HashMap<String, String>) -> Result<Option<Nonce>> {
            let Some(data) = fields.get(FIELD_DATA) else {
                return Ok(None);
            };

            let mut nonce: Nonce = serde_json::from_str(data)?;
            if fields.get(FIELD_USED).map(String::as_str) == Some("1") {
                nonce.used = true;
                nonce.used_at = fields
                    .get(FIELD_USED_AT)
                    .and_then(|ms| ms.parse::<i64>().ok())
                    .and_then(DateTime::<Utc>::from_timestamp_millis);
            }
            Ok(Some(nonce))
        }
    }

    #[async_trait::async_trait]
    impl NonceStorage for RedisStorage {
        async fn upsert(&self, nonce: Nonce) -> Result<()> {
            let drop_at = chrono::Duration::from_std(self.retention)
                .ok()
                .and_then(|retention| nonce.expires_at.checked_add_signed(retention))
                .ok_or_else(|| AuthError::config("Redis retention out of range"))?
                .timestamp_millis();
            let data = serde_json::to_string(&nonce)?;

            let mut conn = self.connection().await?;
            let key = self.make_key(&nonce.wallet_address);

            let _: () = redis::pipe()
                .atomic()
                .del(&key)
                .ignore()
                .cmd("HSET")
                .arg(&key)
                .arg(FIELD_DATA)
                .arg(data)
                .arg(FIELD_EXPIRES_AT)
                .arg(nonce.expires_at.timestamp_millis())
                .arg(FIELD_USED)
                .arg(if nonce.used { "1" } else { "0" })
                .ignore()
                .cmd("PEXPIREAT")
                .arg(&key)
                .arg(drop_at)
                .ignore()
                .query_async(&mut conn)
                .await?;

            Ok(())
        }

        async fn claim(&self, wallet: &CanonicalAddress, now: DateTime<Utc>) -> Result<Nonce> {
            let mut conn = self.connection().await?;
            let key = self.make_key(wallet);

            let (status, data): (i64, String) = self
                .claim_script
                .key(&key)
                .arg(now.timestamp_millis())
                .invoke_async(&mut conn)
                .await?;

            match status {
                0 => Err(AuthError::NonceNotFound {
                    wallet: wallet.to_string(),
                }),
                1 => Err(AuthError::NonceExpired {
                    wallet: wallet.to_string(),
                }),
                2 => Err(AuthError::NonceAlreadyUsed {
                    wallet: wallet.to_string(),
                }),
                3 => {
                    let mut nonce: Nonce = serde_json::from_str(&data)?;
                    nonce.mark_used(now);
                    Ok(nonce)
                }
                other => Err(AuthError::storage(format!(
                    "Unexpected claim script status {}",
                    other
                ))),
            }
        }

        async fn get(&self, wallet: &CanonicalAddress) -> Result<Option<Nonce>> {
            let mut conn = self.connection().await?;
            let fields: HashMap<String, String> = conn.hgetall(self.make_key(wallet)).await?;
            Self::decode(fields)
        }

        async fn remove(&self, wallet: &CanonicalAddress) -> Result<bool> {
            let mut conn = self.connection().await?;
            let removed: i64 = conn.del(self.make_key(wallet)).await?;
            Ok(removed > 0)
        }

        async fn sweep_expired(&self, before: DateTime<Utc>) -> Result<u64> {
            let mut conn = self.connection().await?;
            let pattern = format!("{}*", self.key_prefix);
            let before_ms = before.timestamp_millis();

            let mut cursor: u64 = 0;
            let mut removed: u64 = 0;
            loop {
                let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(&pattern)
                    .arg("COUNT")
                    .arg(SCAN_BATCH)
                    .query_async(&mut conn)
                    .await?;

                for key in keys {
                    let deleted: i64 = self
                        .sweep_script
                        .key(&key)
                        .arg(before_ms)
                        .invoke_async(&mut conn)
                        .await?;
                    removed += deleted as u64;
                }

                if next == 0 {
                    break;
                }
                cursor = next;
            }

            Ok(removed)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::types::ClientInfo;
        use std::env;

        /// Helper function to check if Redis is available
        /// Tests will be skipped if Redis is not available
        async fn check_redis_available(redis_url: &str) -> bool {
            match Client::open(redis_url) {
                Ok(client) => match client.get_multiplexed_async_connection().await {
                    Ok(mut conn) => conn.exists::<&str, bool>("__test_key__").await.is_ok(),
                    Err(_) => false,
                },
                Err(_) => false,
            }
        }

        async fn test_storage() -> Option<RedisStorage> {
            let redis_url =
                env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

            if !check_redis_available(&redis_url).await {
                println!("Skipping Redis test: Redis not available at {}", redis_url);
                return None;
            }

            // Use a unique prefix per test to avoid conflicts
            let test_prefix = format!("test:{}:", uuid::Uuid::new_v4());
            Some(
                RedisStorage::new(&redis_url, Some(&test_prefix))
                    .await
                    .unwrap(),
            )
        }

        fn wallet(n: u8) -> CanonicalAddress {
            format!("0x{}", hex::encode([n; 20])).parse().unwrap()
        }

        fn nonce(wallet: CanonicalAddress, value: &str, created: DateTime<Utc>) -> Nonce {
            let client = ClientInfo::new().with_ip("127.0.0.1");
            Nonce::new(wallet, value, created, chrono::Duration::minutes(5), &client).unwrap()
        }

        #[tokio::test]
        async fn test_redis_storage_default_prefix() {
            let redis_url =
                env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

            let storage = RedisStorage::new(&redis_url, None).await.unwrap();
            assert_eq!(storage.key_prefix(), DEFAULT_KEY_PREFIX);
        }

        #[tokio::test]
        async fn test_redis_storage_rejects_unrepresentable_retention() {
            // Fails before any connection is opened, so no server is needed
            let storage = RedisStorage::new("redis://127.0.0.1:1", None)
                .await
                .unwrap()
                .with_retention(Duration::from_secs(9_000_000_000_000));
            let created = DateTime::from_timestamp(1_714_550_400, 0).unwrap();

            let err = storage
                .upsert(nonce(wallet(9), "abc", created))
                .await
                .unwrap_err();
            assert!(matches!(err, AuthError::Configuration { .. }));
        }

        #[tokio::test]
        async fn test_redis_storage_upsert_and_get() {
            let Some(storage) = test_storage().await else {
                return;
            };
            let now = Utc::now();

            storage.upsert(nonce(wallet(1), "first", now)).await.unwrap();
            storage.upsert(nonce(wallet(1), "second", now)).await.unwrap();

            let stored = storage.get(&wallet(1)).await.unwrap().unwrap();
            assert_eq!(stored.value, "second");
            assert!(!stored.used);
            assert_eq!(stored.client_ip.as_deref(), Some("127.0.0.1"));

            storage.remove(&wallet(1)).await.unwrap();
        }

        #[tokio::test]
        async fn test_redis_storage_claim_once() {
            let Some(storage) = test_storage().await else {
                return;
            };
            let now = Utc::now();
            storage.upsert(nonce(wallet(2), "abc", now)).await.unwrap();

            let claimed = storage.claim(&wallet(2), now).await.unwrap();
            assert_eq!(claimed.value, "abc");
            assert!(claimed.used);

            let err = storage.claim(&wallet(2), now).await.unwrap_err();
            assert!(matches!(err, AuthError::NonceAlreadyUsed { .. }));

            let stored = storage.get(&wallet(2)).await.unwrap().unwrap();
            assert!(stored.used);
            assert!(stored.used_at.is_some());

            storage.remove(&wallet(2)).await.unwrap();
        }

        #[tokio::test]
        async fn test_redis_storage_claim_expired() {
            let Some(storage) = test_storage().await else {
                return;
            };
            let now = Utc::now();
            storage.upsert(nonce(wallet(3), "abc", now)).await.unwrap();

            let err = storage
                .claim(&wallet(3), now + chrono::Duration::minutes(6))
                .await
                .unwrap_err();
            assert!(matches!(err, AuthError::NonceExpired { .. }));
            assert!(storage.get(&wallet(3)).await.unwrap().is_none());

            let err = storage.claim(&wallet(3), now).await.unwrap_err();
            assert!(matches!(err, AuthError::NonceNotFound { .. }));
        }

        #[tokio::test]
        async fn test_redis_storage_ttl() {
            let Some(storage) = test_storage().await else {
                return;
            };
            let storage = storage.with_retention(Duration::from_secs(60));
            storage
                .upsert(nonce(wallet(4), "abc", Utc::now()))
                .await
                .unwrap();

            let mut conn = storage.connection().await.unwrap();
            let ttl: i64 = conn.ttl(storage.make_key(&wallet(4))).await.unwrap();

            // 5 minute nonce + 60 s retention
            assert!(ttl > 0, "Key should have a positive TTL");
            assert!(ttl <= 360);

            storage.remove(&wallet(4)).await.unwrap();
        }

        #[tokio::test]
        async fn test_redis_storage_sweep() {
            let Some(storage) = test_storage().await else {
                return;
            };
            let now = Utc::now();
            storage.upsert(nonce(wallet(5), "old", now)).await.unwrap();
            storage
                .upsert(nonce(wallet(6), "fresh", now + chrono::Duration::hours(1)))
                .await
                .unwrap();

            let removed = storage
                .sweep_expired(now + chrono::Duration::minutes(30))
                .await
                .unwrap();
            assert_eq!(removed, 1);
            assert!(storage.get(&wallet(5)).await.unwrap().is_none());
            assert!(storage.get(&wallet(6)).await.unwrap().is_some());

            storage.remove(&wallet(6)).await.unwrap();
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
        async fn test_redis_storage_concurrent_claims() {
            let Some(storage) = test_storage().await else {
                return;
            };
            let now = Utc::now();
            storage.upsert(nonce(wallet(7), "abc", now)).await.unwrap();

            let mut handles = Vec::new();
            for _ in 0..16 {
                let storage = storage.clone();
                handles.push(tokio::spawn(async move {
                    storage.claim(&wallet(7), now).await
                }));
            }

            let mut successes = 0;
            for handle in handles {
                if handle.await.unwrap().is_ok() {
                    successes += 1;
                }
            }
            assert_eq!(successes, 1);

            storage.remove(&wallet(7)).await.unwrap();
        }
    }
}
