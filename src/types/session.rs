//! Challenge, login and session response types

use crate::address::CanonicalAddress;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Token type advertised to clients
pub const TOKEN_TYPE_BEARER: &str = "Bearer";

/// Response to a challenge request
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeResponse {
    /// Nonce value embedded in the message
    pub nonce: String,
    /// Exact text the wallet must sign
    pub message: String,
    /// When the nonce stops being claimable
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for ChallengeResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChallengeResponse")
            .field("nonce", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Response to a successful login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// Opaque bearer token
    pub token: String,
    /// Always `"Bearer"`
    pub token_type: String,
    /// Token expiration time
    pub expires_at: DateTime<Utc>,
    /// Authenticated user
    pub user_id: Uuid,
    /// Canonical wallet address
    pub wallet: CanonicalAddress,
}

impl LoginResponse {
    pub fn bearer(
        token: String,
        expires_at: DateTime<Utc>,
        user_id: Uuid,
        wallet: CanonicalAddress,
    ) -> Self {
        Self {
            token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_at,
            user_id,
            wallet,
        }
    }
}

/// Session details recovered from a validated token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub user_id: String,
    pub wallet: String,
    pub remaining_seconds: i64,
}
