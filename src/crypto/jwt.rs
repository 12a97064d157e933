//! Session token issuance and validation

use crate::address::CanonicalAddress;
use crate::clock::Clock;
use crate::config::TokenConfig;
use crate::error::TokenRejection;
use crate::random::{generate_uuid, RandomSource};
use crate::{AuthError, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Value of the `typ` claim on session tokens
pub const ACCESS_TOKEN_TYPE: &str = "access";

/// Claims carried by a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User id
    pub sub: String,
    /// Canonical wallet address
    pub wallet: String,
    pub iss: String,
    pub aud: String,
    /// Random token id, reserved for revocation
    pub jti: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    #[serde(rename = "typ")]
    pub token_type: String,
}

impl SessionClaims {
    pub fn user_id(&self) -> &str {
        self.sub.trim()
    }

    /// Wallet address, trimmed and lower-cased
    pub fn wallet(&self) -> String {
        self.wallet.trim().to_lowercase()
    }

    pub fn jwt_id(&self) -> &str {
        self.jti.trim()
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.iat, 0).single()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }

    /// Seconds until expiry, never negative
    pub fn remaining_lifetime(&self, now: DateTime<Utc>) -> i64 {
        self.exp.saturating_sub(now.timestamp()).max(0)
    }
}

/// A freshly minted token and its claims
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: SessionClaims,
    pub expires_at: DateTime<Utc>,
}

/// Issues and validates HMAC-signed session tokens
#[derive(Clone)]
pub struct TokenService {
    config: TokenConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    clock: Arc<dyn Clock>,
    random: Arc<dyn RandomSource>,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("config", &self.config)
            .field("keys", &"<redacted>")
            .finish()
    }
}

impl TokenService {
    /// Create a token service, rejecting weak configuration
    pub fn new(
        config: TokenConfig,
        clock: Arc<dyn Clock>,
        random: Arc<dyn RandomSource>,
    ) -> Result<Self> {
        config.validate()?;

        let key_bytes = config.signing_key_bytes();
        let encoding_key = EncodingKey::from_secret(&key_bytes);
        let decoding_key = DecodingKey::from_secret(&key_bytes);

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_audience(&[config.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "aud", "sub"]);
        // Time claims are checked against the injected clock
        validation.validate_exp = false;
        validation.validate_nbf = false;

        tracing::info!(
            issuer = %config.issuer,
            ttl_secs = config.ttl.as_secs(),
            "Token service initialized"
        );

        Ok(Self {
            config,
            encoding_key,
            decoding_key,
            validation,
            clock,
            random,
        })
    }

    /// Get the token configuration
    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Issue a token with the configured lifetime
    pub fn issue_token(&self, user_id: &str, wallet: &CanonicalAddress) -> Result<IssuedToken> {
        let ttl = Duration::from_std(self.config.ttl)
            .map_err(|_| AuthError::config("Token lifetime out of range"))?;
        self.issue_token_with_ttl(user_id, wallet, ttl)
    }

    /// Issue a token with a custom lifetime
    pub fn issue_token_with_ttl(
        &self,
        user_id: &str,
        wallet: &CanonicalAddress,
        ttl: Duration,
    ) -> Result<IssuedToken> {
        if ttl <= Duration::zero() {
            return Err(AuthError::config("Token lifetime must be positive"));
        }

        let now = self.clock.now();
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| AuthError::config("Token lifetime out of range"))?;
        let not_before = Duration::from_std(self.config.not_before_skew)
            .ok()
            .and_then(|skew| now.checked_sub_signed(skew))
            .ok_or_else(|| AuthError::config("Not-before skew out of range"))?;

        let claims = SessionClaims {
            sub: user_id.to_string(),
            wallet: wallet.to_string(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            jti: generate_uuid(self.random.as_ref()).to_string(),
            iat: now.timestamp(),
            nbf: not_before.timestamp(),
            exp: expires_at.timestamp(),
            token_type: ACCESS_TOKEN_TYPE.to_string(),
        };

        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(self.config.key_id.clone());

        let token = jsonwebtoken::encode(&header, &claims, &self.encoding_key).map_err(|e| {
            tracing::error!(user_id = %user_id, error = %e, "Failed to encode session token");
            AuthError::config(format!("JWT encoding failed: {}", e))
        })?;

        Ok(IssuedToken {
            token,
            claims,
            expires_at,
        })
    }

    /// Verify signature, issuer, audience and time claims
    ///
    /// Every failure maps to [`AuthError::TokenInvalid`]; the rejection kind
    /// is logged but not part of the error message.
    pub fn parse_and_validate(&self, token: &str) -> Result<SessionClaims> {
        let data = jsonwebtoken::decode::<SessionClaims>(
            token.trim(),
            &self.decoding_key,
            &self.validation,
        )
        .map_err(|e| {
            let kind = classify(e.kind());
            tracing::debug!(reason = %kind, error = %e, "Rejected session token");
            AuthError::token_invalid(kind)
        })?;

        let claims = data.claims;
        let now = self.clock.now().timestamp();
        let leeway = i64::try_from(self.config.leeway.as_secs()).unwrap_or(i64::MAX);

        if now.saturating_sub(leeway) >= claims.exp {
            tracing::debug!(jti = %claims.jti, "Session token expired");
            return Err(AuthError::token_invalid(TokenRejection::Expired));
        }

        if claims.nbf > now.saturating_add(leeway) {
            tracing::debug!(jti = %claims.jti, "Session token not yet valid");
            return Err(AuthError::token_invalid(TokenRejection::NotYetValid));
        }

        if claims.user_id().is_empty()
            || claims.wallet.trim().is_empty()
            || claims.token_type != ACCESS_TOKEN_TYPE
        {
            tracing::warn!(jti = %claims.jti, "Session token missing required claims");
            return Err(AuthError::token_invalid(TokenRejection::Claims));
        }

        Ok(claims)
    }

    /// Seconds left on validated claims, by the service clock
    pub fn remaining_lifetime(&self, claims: &SessionClaims) -> i64 {
        claims.remaining_lifetime(self.clock.now())
    }
}

fn classify(kind: &ErrorKind) -> TokenRejection {
    match kind {
        ErrorKind::InvalidSignature
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidAlgorithmName
        | ErrorKind::InvalidKeyFormat => TokenRejection::Signature,
        ErrorKind::ExpiredSignature => TokenRejection::Expired,
        ErrorKind::ImmatureSignature => TokenRejection::NotYetValid,
        ErrorKind::InvalidIssuer
        | ErrorKind::InvalidAudience
        | ErrorKind::InvalidSubject
        | ErrorKind::MissingRequiredClaim(_) => TokenRejection::Claims,
        _ => TokenRejection::Malformed,
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn extract_bearer_token(authorization: &str) -> Option<&str> {
    const PREFIX: &str = "Bearer ";
    let header = authorization.trim_start();
    if header.len() <= PREFIX.len() || !header.is_char_boundary(PREFIX.len()) {
        return None;
    }

    let (scheme, rest) = header.split_at(PREFIX.len());
    if !scheme.eq_ignore_ascii_case(PREFIX) {
        return None;
    }

    let token = rest.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
