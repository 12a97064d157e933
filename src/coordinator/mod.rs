//! Login orchestration
//!
//! [`AuthCoordinator`] drives one login attempt through its stages:
//!
//! ```text
//! NoNonce -> NonceIssued -> Claimed -> Verified -> SessionIssued
//! ```
//!
//! Any failure is terminal for the attempt. A claimed nonce stays consumed
//! whether or not the signature check that follows succeeds, so every retry
//! needs a fresh challenge.
//!
//! # Examples
//!
//! ```
//! use audion_auth::clock::SystemClock;
//! use audion_auth::config::{AuthConfig, TokenConfig};
//! use audion_auth::coordinator::AuthCoordinator;
//! use audion_auth::crypto::signature;
//! use audion_auth::nonce_storage::InMemoryStorage;
//! use audion_auth::random::OsRandom;
//! use audion_auth::types::ClientInfo;
//! use audion_auth::users::InMemoryUserDirectory;
//! use std::sync::Arc;
//!
//! # async fn example() -> audion_auth::Result<()> {
//! let config = AuthConfig::new(TokenConfig::new("0123456789abcdef0123456789abcdef-prod-secret"));
//! let auth = AuthCoordinator::new(
//!     config,
//!     Arc::new(InMemoryStorage::new()),
//!     Arc::new(InMemoryUserDirectory::new()),
//!     Arc::new(SystemClock),
//!     Arc::new(OsRandom),
//! )?;
//!
//! let key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
//! let wallet = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
//!
//! let challenge = auth.request_challenge(wallet, &ClientInfo::new()).await?;
//! let sig = signature::sign_personal_message(&challenge.message, key)?;
//! let login = auth.login(wallet, &hex::encode(sig), &ClientInfo::new()).await?;
//!
//! let session = auth.session(&login.token).await?;
//! assert_eq!(session.wallet, wallet.to_lowercase());
//! # Ok(())
//! # }
//! # tokio::runtime::Runtime::new().unwrap().block_on(example()).unwrap();
//! ```

use crate::address::{self, CanonicalAddress};
use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::crypto::jwt::TokenService;
use crate::crypto::signature;
use crate::nonce_storage::NonceStorage;
use crate::nonce_store::NonceStore;
use crate::random::RandomSource;
use crate::types::{ChallengeResponse, ClientInfo, LoginResponse, Nonce, SessionInfo, User};
use crate::users::UserDirectory;
use crate::{AuthError, Result};
use std::sync::Arc;


/// Progress of a single login attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStage {
    NoNonce,
    NonceIssued,
    Claimed,
    Verified,
    SessionIssued,
}

impl LoginStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginStage::NoNonce => "no_nonce",
            LoginStage::NonceIssued => "nonce_issued",
            LoginStage::Claimed => "claimed",
            LoginStage::Verified => "verified",
            LoginStage::SessionIssued => "session_issued",
        }
    }
}

impl std::fmt::Display for LoginStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wallet login coordinator with pluggable nonce storage and user directory
pub struct AuthCoordinator<S: NonceStorage, U: UserDirectory> {
    config: AuthConfig,
    nonces: NonceStore<S>,
    users: Arc<U>,
    tokens: TokenService,
    clock: Arc<dyn Clock>,
}

impl<S: NonceStorage, U: UserDirectory> Clone for AuthCoordinator<S, U> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            nonces: self.nonces.clone(),
            users: Arc::clone(&self.users),
            tokens: self.tokens.clone(),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S: NonceStorage, U: UserDirectory> std::fmt::Debug for AuthCoordinator<S, U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthCoordinator")
            .field("config", &self.config)
            .field("nonces", &self.nonces)
            .finish_non_exhaustive()
    }
}

impl<S: NonceStorage, U: UserDirectory> AuthCoordinator<S, U> {
    /// Build a coordinator, validating `config` first
    ///
    /// A weak signing key or out-of-range lifetime is a fatal
    /// [`AuthError::Configuration`].
    pub fn new(
        config: AuthConfig,
        storage: Arc<S>,
        users: Arc<U>,
        clock: Arc<dyn Clock>,
        random: Arc<dyn RandomSource>,
    ) -> Result<Self> {
        config.validate()?;

        let tokens = TokenService::new(config.token.clone(), clock.clone(), random.clone())?;
        let nonces = NonceStore::new(storage, clock.clone(), random, config.nonce_ttl)?;

        tracing::info!(
            app_name = %config.app_name,
            nonce_ttl_secs = config.nonce_ttl.as_secs(),
            "Auth coordinator initialized"
        );

        Ok(Self {
            config,
            nonces,
            users,
            tokens,
            clock,
        })
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn nonce_store(&self) -> &NonceStore<S> {
        &self.nonces
    }

    pub fn token_service(&self) -> &TokenService {
        &self.tokens
    }

    /// Issue a login challenge for `wallet_raw`
    pub async fn request_challenge(
        &self,
        wallet_raw: &str,
        client: &ClientInfo,
    ) -> Result<ChallengeResponse> {
        let wallet = address::normalize(wallet_raw)?;
        let nonce = self.nonces.issue(&wallet, client).await?;

        tracing::info!(
            wallet = %wallet,
            stage = %LoginStage::NonceIssued,
            "Login challenge issued"
        );

        Ok(ChallengeResponse {
            message: self.config.login_message(&nonce.value),
            nonce: nonce.value,
            expires_at: nonce.expires_at,
        })
    }

    /// Complete a login with a hex `personal_sign` signature over the challenge
    pub async fn login(
        &self,
        wallet_raw: &str,
        signature_hex: &str,
        client: &ClientInfo,
    ) -> Result<LoginResponse> {
        let wallet = address::normalize(wallet_raw)?;

        let nonce = self.nonces.claim(&wallet).await.map_err(|e| {
            tracing::info!(
                wallet = %wallet,
                stage = %LoginStage::NoNonce,
                reason = e.code(),
                "Login rejected"
            );
            e
        })?;

        // From here on the nonce is consumed whatever the outcome
        self.verify_claimed(&wallet, &nonce, signature_hex, client)?;

        let user = self.record_login(&wallet).await?;
        let issued = self.tokens.issue_token(&user.id.to_string(), &wallet)?;

        tracing::info!(
            wallet = %wallet,
            user_id = %user.id,
            stage = %LoginStage::SessionIssued,
            "Login succeeded"
        );

        Ok(LoginResponse::bearer(
            issued.token,
            issued.expires_at,
            user.id,
            wallet,
        ))
    }

    fn verify_claimed(
        &self,
        wallet: &CanonicalAddress,
        nonce: &Nonce,
        signature_hex: &str,
        client: &ClientInfo,
    ) -> Result<()> {
        let rejected = |message: &str| {
            tracing::warn!(
                wallet = %wallet,
                stage = %LoginStage::Claimed,
                client_ip = client.ip.as_deref().unwrap_or("-"),
                user_agent = client.user_agent.as_deref().unwrap_or("-"),
                reason = message,
                "Signature verification failed"
            );
            AuthError::invalid_signature(message)
        };

        let signature = signature::signature_from_hex(signature_hex)
            .map_err(|_| rejected("signature is not valid hex"))?;

        let message = self.config.login_message(&nonce.value);
        if !signature::verify(wallet, &signature, &message) {
            return Err(rejected("signature does not match wallet"));
        }

        tracing::debug!(wallet = %wallet, stage = %LoginStage::Verified, "Signature verified");
        Ok(())
    }

    async fn record_login(&self, wallet: &CanonicalAddress) -> Result<User> {
        let now = self.clock.now();
        match self.users.find_by_wallet(wallet).await? {
            Some(mut user) => {
                self.users.touch_login(user.id, now).await?;
                user.last_login_at = now;
                Ok(user)
            }
            None => {
                let user = self.users.create(wallet, now).await?;
                tracing::info!(wallet = %wallet, user_id = %user.id, "Created user");
                Ok(user)
            }
        }
    }

    /// Resolve a bearer token into session details
    pub async fn session(&self, token: &str) -> Result<SessionInfo> {
        let claims = self.tokens.parse_and_validate(token)?;
        Ok(SessionInfo {
            user_id: claims.user_id().to_string(),
            wallet: claims.wallet(),
            remaining_seconds: self.tokens.remaining_lifetime(&claims),
        })
    }

    /// The stored challenge record for `wallet_raw`, if any, without claiming it
    ///
    /// The record is returned as stored: it may already be used, or expired
    /// and not yet swept. Check `used` and `is_expired` before relying on it.
    pub async fn current_nonce(&self, wallet_raw: &str) -> Result<Option<Nonce>> {
        let wallet = address::normalize(wallet_raw)?;
        self.nonces.peek(&wallet).await
    }

    /// Drop any outstanding challenge for `wallet_raw`
    pub async fn invalidate_challenge(&self, wallet_raw: &str) -> Result<bool> {
        let wallet = address::normalize(wallet_raw)?;
        self.nonces.invalidate(&wallet).await
    }
}
