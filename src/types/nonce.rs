//! Nonce records

use crate::address::CanonicalAddress;
use crate::{AuthError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Maximum stored length of a client user agent
pub const MAX_USER_AGENT_LEN: usize = 500;
/// Maximum stored length of a client IP (fits IPv6)
pub const MAX_CLIENT_IP_LEN: usize = 45;

/// Request provenance recorded with a nonce for auditing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl ClientInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

/// The single live login challenge for a wallet
///
/// `value` is a secret until it has been claimed and is redacted from
/// `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nonce {
    pub wallet_address: CanonicalAddress,
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
}

impl std::fmt::Debug for Nonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Nonce")
            .field("wallet_address", &self.wallet_address)
            .field("value", &"<redacted>")
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .field("used", &self.used)
            .field("used_at", &self.used_at)
            .field("client_ip", &self.client_ip)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl Nonce {
    /// Create a fresh, unused nonce valid for `ttl` from `now`
    ///
    /// Fails with a configuration error when `now + ttl` is not a
    /// representable timestamp.
    pub fn new(
        wallet_address: CanonicalAddress,
        value: impl Into<String>,
        now: DateTime<Utc>,
        ttl: Duration,
        client: &ClientInfo,
    ) -> Result<Self> {
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| AuthError::config("Nonce lifetime out of range"))?;

        Ok(Self {
            wallet_address,
            value: value.into(),
            created_at: now,
            expires_at,
            used: false,
            used_at: None,
            client_ip: client.ip.as_deref().map(|ip| truncate(ip, MAX_CLIENT_IP_LEN)),
            user_agent: client
                .user_agent
                .as_deref()
                .map(|ua| truncate(ua, MAX_USER_AGENT_LEN)),
        })
    }

    /// A nonce is expired from `expires_at` onwards
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Mark the nonce consumed
    pub fn mark_used(&mut self, now: DateTime<Utc>) {
        self.used = true;
        self.used_at = Some(now);
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn wallet() -> CanonicalAddress {
        "0x70997970c51812dc3a010c7d01b50e0d17dc79c8".parse().unwrap()
    }

    #[test]
    fn test_nonce_expiry_boundary() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let nonce = Nonce::new(wallet(), "abc", now, Duration::minutes(5), &ClientInfo::new())
            .unwrap();

        assert_eq!(nonce.expires_at, now + Duration::minutes(5));
        assert!(!nonce.is_expired(now));
        assert!(!nonce.is_expired(now + Duration::seconds(299)));
        assert!(nonce.is_expired(now + Duration::minutes(5)));
    }

    #[test]
    fn test_mark_used() {
        let now = Utc::now();
        let mut nonce = Nonce::new(wallet(), "abc", now, Duration::minutes(5), &ClientInfo::new())
            .unwrap();
        assert!(!nonce.used);
        nonce.mark_used(now);
        assert!(nonce.used);
        assert_eq!(nonce.used_at, Some(now));
    }

    #[test]
    fn test_debug_redacts_value() {
        let nonce = Nonce::new(
            wallet(),
            "super-secret-nonce",
            Utc::now(),
            Duration::minutes(5),
            &ClientInfo::new(),
        )
        .unwrap();
        let debug = format!("{:?}", nonce);
        assert!(!debug.contains("super-secret-nonce"));
    }

    #[test]
    fn test_client_info_is_truncated() {
        let client = ClientInfo::new()
            .with_ip("10.0.0.1")
            .with_user_agent("x".repeat(1000));
        let nonce = Nonce::new(wallet(), "abc", Utc::now(), Duration::minutes(5), &client)
            .unwrap();
        assert_eq!(nonce.client_ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(nonce.user_agent.as_ref().map(|ua| ua.len()), Some(MAX_USER_AGENT_LEN));
    }

    #[test]
    fn test_unrepresentable_expiry_is_rejected() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let err = Nonce::new(
            wallet(),
            "abc",
            now,
            Duration::seconds(9_000_000_000_000),
            &ClientInfo::new(),
        )
        .unwrap_err();
        assert!(matches!(err, AuthError::Configuration { .. }));
    }
}
