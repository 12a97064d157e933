//! Cryptographic utilities for wallet login
//!
//! This module provides the two cryptographic halves of the login flow:
//! proving wallet ownership from an EIP-191 `personal_sign` signature, and
//! minting the session token that proves it afterwards.
//!
//! # Architecture
//!
//! The crypto module is organized as follows:
//! - [`signature`] - EIP-191 hashing, ECDSA public-key recovery and signing
//! - [`jwt`] - HMAC-SHA256 session token issuance and validation
//!
//! # Examples
//!
//! ## Signature Verification
//!
//! ```
//! use audion_auth::crypto::signature;
//!
//! # fn example() -> audion_auth::Result<()> {
//! let private_key = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
//! let wallet = signature::address_from_private_key(private_key)?;
//!
//! let message = "AudIon Login:\nnonce=9f86d081884c7d659a2feaa0c55ad015";
//! let sig = signature::sign_personal_message(message, private_key)?;
//!
//! assert!(signature::verify(&wallet, &sig, message));
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! ## Session Tokens
//!
//! ```
//! use audion_auth::clock::SystemClock;
//! use audion_auth::config::TokenConfig;
//! use audion_auth::crypto::jwt::TokenService;
//! use audion_auth::random::OsRandom;
//! use std::sync::Arc;
//!
//! # fn example() -> audion_auth::Result<()> {
//! let config = TokenConfig::new("0123456789abcdef0123456789abcdef-prod-secret");
//! let tokens = TokenService::new(config, Arc::new(SystemClock), Arc::new(OsRandom))?;
//!
//! let wallet = audion_auth::address::normalize("0x2c7536E3605D9C16a7a3D7b1898e529396a65c23")?;
//! let issued = tokens.issue_token("user-1", &wallet)?;
//! let claims = tokens.parse_and_validate(&issued.token)?;
//!
//! assert_eq!(claims.user_id(), "user-1");
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

pub mod jwt;
pub mod signature;


// Re-export commonly used items
pub use jwt::{extract_bearer_token, IssuedToken, SessionClaims, TokenService};
pub use signature::{
    keccak256, personal_message_hash, recover_signer, sign_personal_message, signature_from_hex,
    verify,
};
