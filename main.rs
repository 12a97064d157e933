//! AudIon nonce sweeper
//!
//! A standalone maintenance process that deletes expired login nonces from
//! the shared Redis store. Request handlers never sweep; run one of these per
//! deployment.
//!
//! ## Environment
//!
//! - `JWT_SECRET` and the other `AuthConfig` variables (validated at startup)
//! - `REDIS_URL` - Redis connection URL (default: redis://localhost:6379)
//! - `REDIS_KEY_PREFIX` - Redis key prefix (default: audion:nonce:)

use std::env;
use std::sync::Arc;

use audion_auth::{
    clock::SystemClock, config::AuthConfig, nonce_storage::redis_storage::RedisStorage,
    random::OsRandom, spawn_nonce_sweeper, NonceStore,
};

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let config = match AuthConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            // Configuration errors are fatal: never fall back to insecure defaults
            tracing::error!(code = e.code(), error = %e, "Refusing to start");
            std::process::exit(1);
        }
    };

    let redis_url = env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
    let key_prefix = env::var("REDIS_KEY_PREFIX").ok();

    let storage = RedisStorage::new(&redis_url, key_prefix.as_deref())
        .await?
        .with_retention(config.sweep_interval);

    let store = NonceStore::new(
        Arc::new(storage),
        Arc::new(SystemClock),
        Arc::new(OsRandom),
        config.nonce_ttl,
    )?;

    tracing::info!(
        redis_url = %redis_url,
        interval_secs = config.sweep_interval.as_secs(),
        "Starting nonce sweeper"
    );
    let sweeper = spawn_nonce_sweeper(store, config.sweep_interval);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    sweeper.shutdown().await;

    Ok(())
}
