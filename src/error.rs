//! Error types for wallet authentication
//!
//! Every per-request failure is recoverable from the caller's point of view:
//! the client simply asks for a fresh challenge and tries again. The only
//! fatal class is [`AuthError::Configuration`], which is raised while building
//! services at startup and must abort the process.

use thiserror::Error;

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, AuthError>;

/// Why a session token was rejected
///
/// Callers only ever see [`AuthError::TokenInvalid`]; the kind is kept for
/// logging and metrics, never surfaced in the error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    /// Not a structurally valid JWT (bad segments, base64 or JSON)
    Malformed,
    /// Signature or algorithm mismatch
    Signature,
    /// `exp` is in the past, beyond the allowed leeway
    Expired,
    /// `nbf` is in the future, beyond the allowed leeway
    NotYetValid,
    /// Missing or unexpected issuer, audience, subject or wallet
    Claims,
}

impl TokenRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenRejection::Malformed => "malformed",
            TokenRejection::Signature => "signature",
            TokenRejection::Expired => "expired",
            TokenRejection::NotYetValid => "not_yet_valid",
            TokenRejection::Claims => "claims",
        }
    }
}

impl std::fmt::Display for TokenRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the authentication core
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid wallet address: {message}")]
    InvalidAddress { message: String },

    #[error("Nonce not found for wallet {wallet}")]
    NonceNotFound { wallet: String },

    #[error("Nonce expired for wallet {wallet}")]
    NonceExpired { wallet: String },

    #[error("Nonce already used for wallet {wallet}")]
    NonceAlreadyUsed { wallet: String },

    #[error("Invalid signature: {message}")]
    SignatureInvalid { message: String },

    #[error("invalid session token")]
    TokenInvalid { kind: TokenRejection },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AuthError {
    /// Create an invalid address error
    pub fn invalid_address(message: impl Into<String>) -> Self {
        Self::InvalidAddress {
            message: message.into(),
        }
    }

    /// Create an invalid signature error
    pub fn invalid_signature(message: impl Into<String>) -> Self {
        Self::SignatureInvalid {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a token error of the given kind
    pub fn token_invalid(kind: TokenRejection) -> Self {
        Self::TokenInvalid { kind }
    }

    /// Stable machine-readable code for the boundary layer
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidAddress { .. } => "invalid_address",
            AuthError::NonceNotFound { .. } => "no_nonce",
            AuthError::NonceExpired { .. } => "expired",
            AuthError::NonceAlreadyUsed { .. } => "already_used",
            AuthError::SignatureInvalid { .. } => "bad_signature",
            AuthError::TokenInvalid { .. } => "token_invalid",
            AuthError::Configuration { .. } => "configuration_error",
            AuthError::Storage { .. } => "storage_error",
            AuthError::Serialization(_) => "serialization_error",
        }
    }

    /// Only configuration errors are fatal; they abort startup.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AuthError::Configuration { .. })
    }

    /// Errors that reject a login attempt (as opposed to infrastructure failures)
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidAddress { .. }
                | AuthError::NonceNotFound { .. }
                | AuthError::NonceExpired { .. }
                | AuthError::NonceAlreadyUsed { .. }
                | AuthError::SignatureInvalid { .. }
                | AuthError::TokenInvalid { .. }
        )
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for AuthError {
    fn from(err: redis::RedisError) -> Self {
        AuthError::storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(AuthError::invalid_address("x").code(), "invalid_address");
        assert_eq!(
            AuthError::NonceNotFound {
                wallet: "0xabc".into()
            }
            .code(),
            "no_nonce"
        );
        assert_eq!(
            AuthError::NonceExpired {
                wallet: "0xabc".into()
            }
            .code(),
            "expired"
        );
        assert_eq!(
            AuthError::NonceAlreadyUsed {
                wallet: "0xabc".into()
            }
            .code(),
            "already_used"
        );
        assert_eq!(AuthError::invalid_signature("x").code(), "bad_signature");
        assert_eq!(AuthError::config("weak key").code(), "configuration_error");
    }

    #[test]
    fn test_only_configuration_is_fatal() {
        assert!(AuthError::config("weak key").is_fatal());
        assert!(!AuthError::storage("down").is_fatal());
        assert!(!AuthError::invalid_signature("bad").is_fatal());
        assert!(!AuthError::token_invalid(TokenRejection::Expired).is_fatal());
    }

    #[test]
    fn test_token_errors_share_one_message() {
        let expired = AuthError::token_invalid(TokenRejection::Expired);
        let forged = AuthError::token_invalid(TokenRejection::Signature);
        assert_eq!(expired.to_string(), forged.to_string());
        assert_eq!(expired.code(), forged.code());
    }

    #[test]
    fn test_rejections() {
        assert!(AuthError::invalid_signature("bad").is_rejection());
        assert!(!AuthError::storage("down").is_rejection());
        assert!(!AuthError::config("weak").is_rejection());
    }
}
