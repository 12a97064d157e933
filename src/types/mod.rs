//! Core data types
//!
//! This module defines the records persisted by the authentication core and
//! the response shapes handed back to the boundary layer.
//!
//! # Architecture
//!
//! - [`nonce`] - Per-wallet login challenge and request provenance
//! - [`user`] - Wallet owner records
//! - [`session`] - Challenge, login and session responses
//!
//! # Examples
//!
//! ```
//! use audion_auth::types::{ClientInfo, Nonce};
//! use chrono::{Duration, Utc};
//!
//! # fn example() -> audion_auth::Result<()> {
//! let wallet = audion_auth::address::normalize("0x70997970C51812dc3A010C7d01b50e0d17dc79C8")?;
//! let client = ClientInfo::new().with_ip("203.0.113.7");
//! let nonce = Nonce::new(wallet, "9f86d081884c7d659a2feaa0c55ad015", Utc::now(), Duration::minutes(5), &client)?;
//!
//! assert!(!nonce.used);
//! # Ok(())
//! # }
//! ```

pub mod nonce;
pub mod session;
pub mod user;

// Re-export commonly used types
pub use nonce::{ClientInfo, Nonce};
pub use session::{ChallengeResponse, LoginResponse, SessionInfo, TOKEN_TYPE_BEARER};
pub use user::User;
