//! Service configuration
//!
//! Configuration is built and validated once, before any service accepts
//! traffic. A weak or placeholder token-signing key is a fatal
//! [`AuthError::Configuration`], never a runtime failure.

use crate::{AuthError, Result};
use std::time::Duration;

/// Application name used in the login message
pub const DEFAULT_APP_NAME: &str = "AudIon";
/// How long an issued nonce stays claimable
pub const DEFAULT_NONCE_TTL: Duration = Duration::from_secs(5 * 60);
/// How often expired nonces are swept from storage
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);
/// Longest allowed nonce lifetime
pub const MAX_NONCE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
/// Longest allowed sweep interval
pub const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Default token issuer
pub const DEFAULT_ISSUER: &str = "AudIon";
/// Default token audience
pub const DEFAULT_AUDIENCE: &str = "AudIon-App";
/// Default key id placed in the token header
pub const DEFAULT_KEY_ID: &str = "v1";
/// Default session lifetime
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(12 * 60 * 60);
/// Allowed clock skew when validating `exp` / `nbf`
pub const DEFAULT_LEEWAY: Duration = Duration::from_secs(60);
/// How far before `iat` the `nbf` claim is placed
pub const DEFAULT_NOT_BEFORE_SKEW: Duration = Duration::from_secs(5);

/// Minimum signing key length in bytes (256 bits)
pub const MIN_SECRET_BYTES: usize = 32;
/// Shortest allowed session lifetime
pub const MIN_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);
/// Longest allowed session lifetime
pub const MAX_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
/// Upper bound for both the validation leeway and the not-before skew
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(60 * 60);

/// Placeholder secret shipped in sample configuration files
pub const PLACEHOLDER_SECRET: &str = "change-me-change-me-change-me-change-me-32+";

/// Session token configuration
#[derive(Clone)]
pub struct TokenConfig {
    /// HMAC signing secret, raw text or base64
    pub secret: String,
    /// `iss` claim, checked on validation
    pub issuer: String,
    /// `aud` claim, checked on validation
    pub audience: String,
    /// `kid` header value
    pub key_id: String,
    /// Session lifetime
    pub ttl: Duration,
    /// Allowed clock skew on validation
    pub leeway: Duration,
    /// Offset of `nbf` before `iat`
    pub not_before_skew: Duration,
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("key_id", &self.key_id)
            .field("ttl", &self.ttl)
            .field("leeway", &self.leeway)
            .field("not_before_skew", &self.not_before_skew)
            .finish()
    }
}

impl TokenConfig {
    /// Create a token config with default claims and lifetimes
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: DEFAULT_ISSUER.to_string(),
            audience: DEFAULT_AUDIENCE.to_string(),
            key_id: DEFAULT_KEY_ID.to_string(),
            ttl: DEFAULT_TOKEN_TTL,
            leeway: DEFAULT_LEEWAY,
            not_before_skew: DEFAULT_NOT_BEFORE_SKEW,
        }
    }

    /// Set the issuer
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Set the audience
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = audience.into();
        self
    }

    /// Set the key id
    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = key_id.into();
        self
    }

    /// Set the session lifetime
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the validation leeway
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// Validate the token configuration
    pub fn validate(&self) -> Result<()> {
        if self.secret.trim().is_empty() {
            return Err(AuthError::config("JWT secret must be set"));
        }

        if self.secret == PLACEHOLDER_SECRET || self.secret.starts_with("change-me") {
            return Err(AuthError::config(
                "JWT secret must be changed from the placeholder value",
            ));
        }

        if self.signing_key_bytes().len() < MIN_SECRET_BYTES {
            return Err(AuthError::config(format!(
                "JWT secret must be at least {} bytes long",
                MIN_SECRET_BYTES
            )));
        }

        if self.ttl < MIN_TOKEN_TTL || self.ttl > MAX_TOKEN_TTL {
            return Err(AuthError::config(
                "JWT lifetime must be between 1 and 168 hours",
            ));
        }

        if self.leeway > MAX_CLOCK_SKEW || self.not_before_skew > MAX_CLOCK_SKEW {
            return Err(AuthError::config(
                "JWT leeway and not-before skew must not exceed one hour",
            ));
        }

        if self.issuer.trim().is_empty() {
            return Err(AuthError::config("JWT issuer cannot be empty"));
        }

        if self.audience.trim().is_empty() {
            return Err(AuthError::config("JWT audience cannot be empty"));
        }

        Ok(())
    }

    /// Key material used for HMAC signing
    ///
    /// A secret that decodes as base64 to at least [`MIN_SECRET_BYTES`] is used
    /// decoded; anything else is used as its UTF-8 bytes.
    pub fn signing_key_bytes(&self) -> Vec<u8> {
        use base64::{engine::general_purpose, Engine as _};
        match general_purpose::STANDARD.decode(self.secret.trim()) {
            Ok(decoded) if decoded.len() >= MIN_SECRET_BYTES => decoded,
            _ => self.secret.as_bytes().to_vec(),
        }
    }
}

/// Top-level authentication configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Name shown in the login message, e.g. `AudIon Login:`
    pub app_name: String,
    /// Nonce lifetime
    pub nonce_ttl: Duration,
    /// Interval between expired-nonce sweeps
    pub sweep_interval: Duration,
    /// Session token configuration
    pub token: TokenConfig,
}

impl AuthConfig {
    /// Create a new config with default nonce settings
    pub fn new(token: TokenConfig) -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            nonce_ttl: DEFAULT_NONCE_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            token,
        }
    }

    /// Set the application name
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    /// Set the nonce lifetime
    pub fn with_nonce_ttl(mut self, nonce_ttl: Duration) -> Self {
        self.nonce_ttl = nonce_ttl;
        self
    }

    /// Set the sweep interval
    pub fn with_sweep_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }

    /// `"<app> Login:\nnonce="`
    pub fn login_message_prefix(&self) -> String {
        format!("{} Login:\nnonce=", self.app_name)
    }

    /// The exact text a wallet must sign for `nonce`
    pub fn login_message(&self, nonce: &str) -> String {
        format!("{}{}", self.login_message_prefix(), nonce)
    }

    /// Validate the whole configuration
    pub fn validate(&self) -> Result<()> {
        if self.app_name.trim().is_empty() {
            return Err(AuthError::config("Application name cannot be empty"));
        }
        if self.nonce_ttl.is_zero() || self.nonce_ttl > MAX_NONCE_TTL {
            return Err(AuthError::config(
                "Nonce TTL must be between 1 second and 24 hours",
            ));
        }
        if self.sweep_interval.is_zero() || self.sweep_interval > MAX_SWEEP_INTERVAL {
            return Err(AuthError::config(
                "Sweep interval must be between 1 second and 7 days",
            ));
        }
        self.token.validate()
    }

    /// Load configuration from the process environment
    ///
    /// - `JWT_SECRET` (required)
    /// - `JWT_ISSUER`, `JWT_AUDIENCE`, `JWT_KID`, `JWT_EXP_HOURS`
    /// - `AUTH_APP_NAME`, `AUTH_NONCE_TTL_SECS`, `AUTH_SWEEP_INTERVAL_SECS`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup and validate it
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup("JWT_SECRET")
            .ok_or_else(|| AuthError::config("JWT_SECRET environment variable is required"))?;

        let mut token = TokenConfig::new(secret);
        if let Some(issuer) = lookup("JWT_ISSUER") {
            token = token.with_issuer(issuer);
        }
        if let Some(audience) = lookup("JWT_AUDIENCE") {
            token = token.with_audience(audience);
        }
        if let Some(key_id) = lookup("JWT_KID") {
            token = token.with_key_id(key_id);
        }
        if let Some(hours) = lookup("JWT_EXP_HOURS") {
            let secs = parse_u64("JWT_EXP_HOURS", &hours)?
                .checked_mul(3600)
                .ok_or_else(|| AuthError::config("JWT_EXP_HOURS is out of range"))?;
            token = token.with_ttl(Duration::from_secs(secs));
        }

        let mut config = AuthConfig::new(token);
        if let Some(app_name) = lookup("AUTH_APP_NAME") {
            config = config.with_app_name(app_name);
        }
        if let Some(secs) = lookup("AUTH_NONCE_TTL_SECS") {
            config = config.with_nonce_ttl(Duration::from_secs(parse_u64(
                "AUTH_NONCE_TTL_SECS",
                &secs,
            )?));
        }
        if let Some(secs) = lookup("AUTH_SWEEP_INTERVAL_SECS") {
            config = config.with_sweep_interval(Duration::from_secs(parse_u64(
                "AUTH_SWEEP_INTERVAL_SECS",
                &secs,
            )?));
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_u64(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| AuthError::config(format!("{} must be a non-negative integer", key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const STRONG_SECRET: &str = "a-very-long-random-signing-secret-for-tests-0123456789";

    #[test]
    fn test_token_config_defaults() {
        let config = TokenConfig::new(STRONG_SECRET);
        assert_eq!(config.issuer, "AudIon");
        assert_eq!(config.audience, "AudIon-App");
        assert_eq!(config.key_id, "v1");
        assert_eq!(config.ttl, Duration::from_secs(12 * 3600));
        assert_eq!(config.leeway, Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_placeholder_secret_is_fatal() {
        let err = TokenConfig::new(PLACEHOLDER_SECRET).validate().unwrap_err();
        assert!(err.is_fatal());

        let err = TokenConfig::new("change-me-please-this-is-long-enough-to-pass-length")
            .validate()
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_short_secret_is_fatal() {
        let err = TokenConfig::new("too-short").validate().unwrap_err();
        assert!(matches!(err, AuthError::Configuration { .. }));

        let err = TokenConfig::new("   ").validate().unwrap_err();
        assert!(matches!(err, AuthError::Configuration { .. }));
    }

    #[test]
    fn test_base64_secret_is_decoded() {
        // 32 zero bytes, base64 encoded
        let secret = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";
        let config = TokenConfig::new(secret);
        assert_eq!(config.signing_key_bytes(), vec![0u8; 32]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_short_base64_secret_falls_back_to_raw_bytes() {
        let config = TokenConfig::new("c2hvcnQ=");
        assert_eq!(config.signing_key_bytes(), b"c2hvcnQ=".to_vec());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_token_ttl_bounds() {
        let too_short = TokenConfig::new(STRONG_SECRET).with_ttl(Duration::from_secs(60));
        assert!(too_short.validate().is_err());

        let too_long =
            TokenConfig::new(STRONG_SECRET).with_ttl(Duration::from_secs(8 * 24 * 3600));
        assert!(too_long.validate().is_err());

        let one_week = TokenConfig::new(STRONG_SECRET).with_ttl(MAX_TOKEN_TTL);
        assert!(one_week.validate().is_ok());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = TokenConfig::new(STRONG_SECRET);
        let debug = format!("{:?}", config);
        assert!(!debug.contains(STRONG_SECRET));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_login_message() {
        let config = AuthConfig::new(TokenConfig::new(STRONG_SECRET));
        assert_eq!(config.login_message_prefix(), "AudIon Login:\nnonce=");
        assert_eq!(config.login_message("abc"), "AudIon Login:\nnonce=abc");
        assert_eq!(config.nonce_ttl, Duration::from_secs(300));
        assert_eq!(config.sweep_interval, Duration::from_secs(3600));
    }

    #[test]
    fn test_auth_config_rejects_zero_durations() {
        let config = AuthConfig::new(TokenConfig::new(STRONG_SECRET))
            .with_nonce_ttl(Duration::from_secs(0));
        assert!(config.validate().is_err());

        let config = AuthConfig::new(TokenConfig::new(STRONG_SECRET))
            .with_sweep_interval(Duration::from_secs(0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_token_config_bounds_clock_skew() {
        let config = TokenConfig::new(STRONG_SECRET).with_leeway(Duration::from_secs(u64::MAX));
        assert!(matches!(
            config.validate(),
            Err(AuthError::Configuration { .. })
        ));

        let mut config = TokenConfig::new(STRONG_SECRET);
        config.not_before_skew = MAX_CLOCK_SKEW + Duration::from_secs(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_auth_config_rejects_oversized_durations() {
        let config = AuthConfig::new(TokenConfig::new(STRONG_SECRET))
            .with_nonce_ttl(Duration::from_secs(9_000_000_000_000));
        assert!(matches!(
            config.validate(),
            Err(AuthError::Configuration { .. })
        ));

        let config = AuthConfig::new(TokenConfig::new(STRONG_SECRET))
            .with_sweep_interval(Duration::from_secs(u64::MAX));
        assert!(matches!(
            config.validate(),
            Err(AuthError::Configuration { .. })
        ));

        let config = AuthConfig::new(TokenConfig::new(STRONG_SECRET))
            .with_nonce_ttl(MAX_NONCE_TTL)
            .with_sweep_interval(MAX_SWEEP_INTERVAL);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_rejects_overflowing_hours() {
        for hours in ["18446744073709551615", "5124095576030432"] {
            let err = AuthConfig::from_lookup(|k| match k {
                "JWT_SECRET" => Some(STRONG_SECRET.to_string()),
                "JWT_EXP_HOURS" => Some(hours.to_string()),
                _ => None,
            })
            .unwrap_err();
            assert!(matches!(err, AuthError::Configuration { .. }), "{}", hours);
        }
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("JWT_SECRET", STRONG_SECRET),
            ("JWT_ISSUER", "issuer-x"),
            ("JWT_EXP_HOURS", "24"),
            ("AUTH_APP_NAME", "Demo"),
            ("AUTH_NONCE_TTL_SECS", "120"),
        ]
        .into_iter()
        .collect();

        let config = AuthConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.app_name, "Demo");
        assert_eq!(config.nonce_ttl, Duration::from_secs(120));
        assert_eq!(config.token.issuer, "issuer-x");
        assert_eq!(config.token.audience, "AudIon-App");
        assert_eq!(config.token.ttl, Duration::from_secs(24 * 3600));
    }

    #[test]
    fn test_from_lookup_requires_secret() {
        let err = AuthConfig::from_lookup(|_| None).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_from_lookup_rejects_bad_numbers() {
        let err = AuthConfig::from_lookup(|k| match k {
            "JWT_SECRET" => Some(STRONG_SECRET.to_string()),
            "AUTH_NONCE_TTL_SECS" => Some("five".to_string()),
            _ => None,
        })
        .unwrap_err();
        assert!(matches!(err, AuthError::Configuration { .. }));
    }
}
