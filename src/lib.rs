//! # AudIon wallet authentication
//!
//! Passwordless login by proof of possession of an Ethereum wallet key.
//!
//! ## Features
//!
//! - **Nonce challenges**: one live, single-use, expiring challenge per wallet
//! - **EIP-191 verification**: `personal_sign` hashing and secp256k1 public-key recovery
//! - **Replay protection**: atomic nonce claim, consumed even when the signature fails
//! - **Session tokens**: HS256 JWTs carrying user id and canonical wallet
//! - **Pluggable storage**: in-memory nonces by default, Redis with the `redis` feature
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use audion_auth::{
//!     clock::SystemClock, config::AuthConfig, nonce_storage::InMemoryStorage,
//!     random::OsRandom, types::ClientInfo, users::InMemoryUserDirectory, AuthCoordinator,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // JWT_SECRET and friends come from the environment
//!     let config = AuthConfig::from_env()?;
//!
//!     let auth = AuthCoordinator::new(
//!         config,
//!         Arc::new(InMemoryStorage::new()),
//!         Arc::new(InMemoryUserDirectory::new()),
//!         Arc::new(SystemClock),
//!         Arc::new(OsRandom),
//!     )?;
//!
//!     let client = ClientInfo::new().with_ip("203.0.113.7");
//!     let challenge = auth
//!         .request_challenge("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266", &client)
//!         .await?;
//!
//!     // The wallet signs `challenge.message` and the client posts the signature back
//!     let signature = "0x...";
//!     let login = auth
//!         .login("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266", signature, &client)
//!         .await?;
//!
//!     println!("{} {}", login.token_type, login.token);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The crate is organized into several modules:
//!
//! - **`address`**: Wallet address validation and canonical form
//! - **`crypto`**: EIP-191 signature recovery and session tokens
//! - **`nonce_storage`**: Storage backends for login nonces
//! - **`nonce_store`**: Nonce issuance, claim and sweep policy
//! - **`sweeper`**: Background expiry sweep
//! - **`users`**: User directory
//! - **`coordinator`**: Challenge, login and session flow
//! - **`types`**: Records and response types
//! - **`config`**, **`clock`**, **`random`**, **`error`**: Ambient plumbing
//!
//! ## Optional Features
//!
//! ```toml
//! [dependencies]
//! audion-auth = { version = "0.1.0", features = ["redis"] }
//! ```
//!
//! - **`redis`**: Redis nonce storage and the `audion-auth-sweeper` binary

pub mod address;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod crypto;
pub mod error;
pub mod nonce_storage;
pub mod nonce_store;
pub mod random;
pub mod sweeper;
pub mod types;
pub mod users;

// Re-exports for convenience
pub use address::{normalize, CanonicalAddress};
pub use config::{AuthConfig, TokenConfig};
pub use coordinator::{AuthCoordinator, LoginStage};
pub use crypto::{SessionClaims, TokenService};
pub use error::{AuthError, Result, TokenRejection};
pub use nonce_store::NonceStore;
pub use sweeper::{spawn_nonce_sweeper, NonceSweeperHandle};
pub use types::*;

/// Current version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
