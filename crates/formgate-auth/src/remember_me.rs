//! Remember-me tokens.
//!
//! A token lets a returning visitor skip the login form. It follows the
//! persistent-token scheme:
//!
//! - The cookie value is `base64url(series ":" value)`, both parts random
//! - The repository keeps the series, the owner and an HMAC-SHA256 digest of
//!   the value keyed by the secret key; the value itself is never stored
//! - Every successful resolution rotates the value and refreshes `last_used`,
//!   so each cookie works exactly once
//! - Presenting a known series with a stale value means the cookie was
//!   copied: every token of that user is revoked
//!
//! Tokens expire `validity_seconds` after their last use. Rotation is a
//! compare-and-swap on the stored digest, so of two requests racing with the
//! same cookie exactly one rotates it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use formgate_core::error::GateError;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use tokio::sync::RwLock;

use crate::hashers::constant_time_eq;
use crate::store::UserStore;
use crate::user::Identity;

/// Random bytes in each of the series and value parts.
const TOKEN_BYTES: usize = 16;

/// Validities beyond this are clamped (100 years).
const MAX_VALIDITY_SECONDS: i64 = 3_155_760_000;

/// A stored remember-me token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistentToken {
    /// The stable identifier of a token chain.
    pub series: String,
    /// HMAC-SHA256 of the current value, base64url encoded.
    pub token_digest: String,
    /// The owning user.
    pub username: String,
    /// When the token was issued or last rotated.
    pub last_used: DateTime<Utc>,
    /// Seconds after `last_used` the token stays valid.
    pub validity_seconds: u64,
}

impl PersistentToken {
    /// Returns the instant the token stops being valid.
    pub fn expires_at(&self) -> DateTime<Utc> {
        let seconds = i64::try_from(self.validity_seconds)
            .unwrap_or(MAX_VALIDITY_SECONDS)
            .min(MAX_VALIDITY_SECONDS);
        self.last_used + Duration::seconds(seconds)
    }

    /// Returns `true` if the token is no longer valid at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at() < now
    }
}

/// Storage for remember-me tokens, keyed by series.
#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Stores a new token.
    async fn create(&self, token: PersistentToken) -> Result<(), GateError>;

    /// Returns the token for `series`.
    async fn get(&self, series: &str) -> Result<Option<PersistentToken>, GateError>;

    /// Replaces the digest and last-use time of a token whose digest is still
    /// `expected_digest`. Returns `false`, changing nothing, if the token was
    /// rotated or removed in the meantime.
    async fn update(
        &self,
        series: &str,
        expected_digest: &str,
        token_digest: String,
        last_used: DateTime<Utc>,
    ) -> Result<bool, GateError>;

    /// Removes one token.
    async fn remove(&self, series: &str) -> Result<(), GateError>;

    /// Removes every token owned by `username`, returning how many were removed.
    async fn remove_user_tokens(&self, username: &str) -> Result<usize, GateError>;
}

/// A token repository held in memory. Tokens do not survive a restart.
#[derive(Debug, Default, Clone)]
pub struct InMemoryTokenRepository {
    tokens: Arc<RwLock<HashMap<String, PersistentToken>>>,
}

impl InMemoryTokenRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored tokens.
    pub async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }

    /// Returns `true` if no tokens are stored.
    pub async fn is_empty(&self) -> bool {
        self.tokens.read().await.is_empty()
    }

    /// Drops every token expired at `now`, returning how many were dropped.
    /// Runs on every [`create`](TokenRepository::create).
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut tokens = self.tokens.write().await;
        purge(&mut tokens, now)
    }
}

fn purge(tokens: &mut HashMap<String, PersistentToken>, now: DateTime<Utc>) -> usize {
    let before = tokens.len();
    tokens.retain(|_, token| !token.is_expired(now));
    before - tokens.len()
}

#[async_trait]
impl TokenRepository for InMemoryTokenRepository {
    async fn create(&self, token: PersistentToken) -> Result<(), GateError> {
        let mut tokens = self.tokens.write().await;
        let purged = purge(&mut tokens, Utc::now());
        if purged > 0 {
            tracing::debug!(purged, "Expired remember-me tokens dropped");
        }
        if tokens.contains_key(&token.series) {
            return Err(GateError::InternalServerError(
                "Remember-me series collision".to_string(),
            ));
        }
        tokens.insert(token.series.clone(), token);
        Ok(())
    }

    async fn get(&self, series: &str) -> Result<Option<PersistentToken>, GateError> {
        Ok(self.tokens.read().await.get(series).cloned())
    }

    async fn update(
        &self,
        series: &str,
        expected_digest: &str,
        token_digest: String,
        last_used: DateTime<Utc>,
    ) -> Result<bool, GateError> {
        let mut tokens = self.tokens.write().await;
        match tokens.get_mut(series) {
            Some(token) if token.token_digest == expected_digest => {
                token.token_digest = token_digest;
                token.last_used = last_used;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn remove(&self, series: &str) -> Result<(), GateError> {
        self.tokens.write().await.remove(series);
        Ok(())
    }

    async fn remove_user_tokens(&self, username: &str) -> Result<usize, GateError> {
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, token| token.username != username);
        Ok(before - tokens.len())
    }
}

/// The result of resolving a remember-me token.
#[derive(Debug, Clone)]
pub struct ResolvedSession {
    /// The identity rebuilt from the current user record.
    pub identity: Identity,
    /// The rotated token that replaces the presented one.
    pub token: String,
}

/// Issues and resolves remember-me tokens.
#[async_trait]
pub trait SessionIssuer: Send + Sync {
    /// Issues a token for a freshly verified identity.
    async fn issue(&self, identity: &Identity, validity_seconds: u64) -> Result<String, GateError>;

    /// Resolves a presented token. Invalid, expired and stolen tokens yield `None`.
    async fn resolve(&self, token: &str) -> Result<Option<ResolvedSession>, GateError>;

    /// Revokes every token of `username`.
    async fn revoke(&self, username: &str) -> Result<(), GateError>;
}

/// [`SessionIssuer`] backed by a [`TokenRepository`] and a [`UserStore`].
#[derive(Clone)]
pub struct PersistentRememberMe {
    repository: Arc<dyn TokenRepository>,
    store: Arc<dyn UserStore>,
    secret_key: String,
}

impl std::fmt::Debug for PersistentRememberMe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentRememberMe")
            .field("repository", &"<dyn TokenRepository>")
            .field("store", &"<dyn UserStore>")
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

impl PersistentRememberMe {
    /// Creates an issuer. `secret_key` keys the stored digests.
    pub fn new(
        repository: Arc<dyn TokenRepository>,
        store: Arc<dyn UserStore>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            store,
            secret_key: secret_key.into(),
        }
    }

    /// Generates a random secret key for deployments that configure none.
    pub fn generate_secret_key() -> String {
        random_component(32)
    }

    fn digest(&self, value: &str) -> Result<String, GateError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| GateError::InternalServerError(format!("HMAC key: {e}")))?;
        mac.update(value.as_bytes());
        Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
    }
}

fn random_component(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn encode_token(series: &str, value: &str) -> String {
    URL_SAFE_NO_PAD.encode(format!("{series}:{value}"))
}

fn decode_token(token: &str) -> Option<(String, String)> {
    let bytes = URL_SAFE_NO_PAD.decode(token.trim()).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    let (series, value) = text.split_once(':')?;
    if series.is_empty() || value.is_empty() {
        return None;
    }
    Some((series.to_string(), value.to_string()))
}

#[async_trait]
impl SessionIssuer for PersistentRememberMe {
    async fn issue(&self, identity: &Identity, validity_seconds: u64) -> Result<String, GateError> {
        let series = random_component(TOKEN_BYTES);
        let value = random_component(TOKEN_BYTES);
        self.repository
            .create(PersistentToken {
                series: series.clone(),
                token_digest: self.digest(&value)?,
                username: identity.username().to_string(),
                last_used: Utc::now(),
                validity_seconds,
            })
            .await?;
        tracing::info!(username = identity.username(), "Remember-me token issued");
        Ok(encode_token(&series, &value))
    }

    async fn resolve(&self, token: &str) -> Result<Option<ResolvedSession>, GateError> {
        let Some((series, value)) = decode_token(token) else {
            tracing::debug!("Malformed remember-me token");
            return Ok(None);
        };

        let Some(stored) = self.repository.get(&series).await? else {
            tracing::debug!("Unknown remember-me series");
            return Ok(None);
        };

        let now = Utc::now();
        if stored.is_expired(now) {
            tracing::debug!(username = %stored.username, "Remember-me token expired");
            self.repository.remove(&series).await?;
            return Ok(None);
        }

        let presented = self.digest(&value)?;
        if !constant_time_eq(presented.as_bytes(), stored.token_digest.as_bytes()) {
            let removed = self.repository.remove_user_tokens(&stored.username).await?;
            tracing::warn!(
                username = %stored.username,
                removed,
                "Remember-me token replayed; revoking all tokens for user"
            );
            return Ok(None);
        }

        let Some(record) = self.store.find_by_username(&stored.username).await? else {
            tracing::warn!(username = %stored.username, "Remember-me token for missing user");
            self.repository.remove(&series).await?;
            return Ok(None);
        };

        let next_value = random_component(TOKEN_BYTES);
        let rotated = self
            .repository
            .update(&series, &stored.token_digest, self.digest(&next_value)?, now)
            .await?;
        if !rotated {
            tracing::debug!(username = %record.username, "Remember-me token rotated concurrently");
            return Ok(None);
        }

        tracing::info!(username = %record.username, "Remember-me login");
        Ok(Some(ResolvedSession {
            identity: Identity::verified(record),
            token: encode_token(&series, &next_value),
        }))
    }

    async fn revoke(&self, username: &str) -> Result<(), GateError> {
        let removed = self.repository.remove_user_tokens(username).await?;
        tracing::debug!(username, removed, "Remember-me tokens revoked");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryUserStore;
    use crate::user::{Authority, UserRecord};

    struct Fixture {
        issuer: PersistentRememberMe,
        repository: InMemoryTokenRepository,
        store: InMemoryUserStore,
    }

    async fn fixture() -> Fixture {
        let store = InMemoryUserStore::new();
        store
            .insert(UserRecord::new("alice", "h", "xyz").with_authority(Authority::User))
            .await;
        let repository = InMemoryTokenRepository::new();
        let issuer = PersistentRememberMe::new(
            Arc::new(repository.clone()),
            Arc::new(store.clone()),
            "test-secret",
        );
        Fixture {
            issuer,
            repository,
            store,
        }
    }

    fn alice() -> Identity {
        Identity::verified(UserRecord::new("alice", "h", "xyz").with_authority(Authority::User))
    }

    fn series_of(token: &str) -> String {
        decode_token(token).unwrap().0
    }

    async fn backdate(repository: &InMemoryTokenRepository, series: &str, seconds: i64) {
        let stored = repository.get(series).await.unwrap().unwrap();
        repository
            .update(
                series,
                &stored.token_digest,
                stored.token_digest.clone(),
                Utc::now() - Duration::seconds(seconds),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_issue_and_resolve() {
        let f = fixture().await;
        let token = f.issuer.issue(&alice(), 86_400).await.unwrap();
        let session = f.issuer.resolve(&token).await.unwrap().unwrap();
        assert_eq!(session.identity.username(), "alice");
        assert!(session.identity.has_authority("USER"));
        assert_ne!(session.token, token);
        assert_eq!(series_of(&session.token), series_of(&token));
    }

    #[tokio::test]
    async fn test_repository_never_stores_value() {
        let f = fixture().await;
        let token = f.issuer.issue(&alice(), 86_400).await.unwrap();
        let (series, value) = decode_token(&token).unwrap();
        let stored = f.repository.get(&series).await.unwrap().unwrap();
        assert_ne!(stored.token_digest, value);
        assert_eq!(stored.username, "alice");
        assert_eq!(stored.validity_seconds, 86_400);
    }

    #[tokio::test]
    async fn test_rotated_token_keeps_working() {
        let f = fixture().await;
        let mut token = f.issuer.issue(&alice(), 86_400).await.unwrap();
        for _ in 0..3 {
            token = f.issuer.resolve(&token).await.unwrap().unwrap().token;
        }
        assert_eq!(f.repository.len().await, 1);
    }

    #[tokio::test]
    async fn test_replayed_token_revokes_user() {
        let f = fixture().await;
        let other = f.issuer.issue(&alice(), 86_400).await.unwrap();
        let token = f.issuer.issue(&alice(), 86_400).await.unwrap();
        let rotated = f.issuer.resolve(&token).await.unwrap().unwrap().token;

        // The pre-rotation cookie is presented again.
        assert!(f.issuer.resolve(&token).await.unwrap().is_none());
        assert!(f.repository.is_empty().await);
        assert!(f.issuer.resolve(&rotated).await.unwrap().is_none());
        assert!(f.issuer.resolve(&other).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_token() {
        let f = fixture().await;
        let token = f.issuer.issue(&alice(), 60).await.unwrap();
        let series = series_of(&token);
        backdate(&f.repository, &series, 61).await;

        assert!(f.issuer.resolve(&token).await.unwrap().is_none());
        assert!(f.repository.get(&series).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_purges_expired_tokens() {
        let f = fixture().await;
        let stale = f.issuer.issue(&alice(), 60).await.unwrap();
        let fresh = f.issuer.issue(&alice(), 86_400).await.unwrap();
        backdate(&f.repository, &series_of(&stale), 61).await;
        assert_eq!(f.repository.len().await, 2);

        f.issuer.issue(&alice(), 86_400).await.unwrap();
        assert_eq!(f.repository.len().await, 2);
        assert!(f.repository.get(&series_of(&stale)).await.unwrap().is_none());
        assert!(f.repository.get(&series_of(&fresh)).await.unwrap().is_some());
        assert_eq!(f.repository.purge_expired(Utc::now()).await, 0);
    }

    #[tokio::test]
    async fn test_update_requires_expected_digest() {
        let f = fixture().await;
        let token = f.issuer.issue(&alice(), 86_400).await.unwrap();
        let series = series_of(&token);
        let stored = f.repository.get(&series).await.unwrap().unwrap();

        assert!(!f
            .repository
            .update(&series, "stale", "next".to_string(), Utc::now())
            .await
            .unwrap());
        assert_eq!(f.repository.get(&series).await.unwrap().unwrap(), stored);
        assert!(f
            .repository
            .update(&series, &stored.token_digest, "next".to_string(), Utc::now())
            .await
            .unwrap());
        assert!(!f
            .repository
            .update("missing", "next", "again".to_string(), Utc::now())
            .await
            .unwrap());
    }

    /// Rotates every token right after handing it out, as a parallel
    /// request carrying the same cookie would.
    struct RacingRepository {
        inner: InMemoryTokenRepository,
    }

    #[async_trait]
    impl TokenRepository for RacingRepository {
        async fn create(&self, token: PersistentToken) -> Result<(), GateError> {
            self.inner.create(token).await
        }

        async fn get(&self, series: &str) -> Result<Option<PersistentToken>, GateError> {
            let token = self.inner.get(series).await?;
            if let Some(token) = &token {
                self.inner
                    .update(series, &token.token_digest, "elsewhere".to_string(), Utc::now())
                    .await?;
            }
            Ok(token)
        }

        async fn update(
            &self,
            series: &str,
            expected_digest: &str,
            token_digest: String,
            last_used: DateTime<Utc>,
        ) -> Result<bool, GateError> {
            self.inner
                .update(series, expected_digest, token_digest, last_used)
                .await
        }

        async fn remove(&self, series: &str) -> Result<(), GateError> {
            self.inner.remove(series).await
        }

        async fn remove_user_tokens(&self, username: &str) -> Result<usize, GateError> {
            self.inner.remove_user_tokens(username).await
        }
    }

    #[tokio::test]
    async fn test_lost_rotation_race_does_not_revoke() {
        let f = fixture().await;
        let inner = InMemoryTokenRepository::new();
        let issuer = PersistentRememberMe::new(
            Arc::new(RacingRepository {
                inner: inner.clone(),
            }),
            Arc::new(f.store.clone()),
            "test-secret",
        );
        let token = issuer.issue(&alice(), 86_400).await.unwrap();

        assert!(issuer.resolve(&token).await.unwrap().is_none());
        let stored = inner.get(&series_of(&token)).await.unwrap().unwrap();
        assert_eq!(stored.token_digest, "elsewhere");
        assert_eq!(inner.len().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_tokens() {
        let f = fixture().await;
        assert!(f.issuer.resolve("not base64!").await.unwrap().is_none());
        assert!(f
            .issuer
            .resolve(&URL_SAFE_NO_PAD.encode("no-separator"))
            .await
            .unwrap()
            .is_none());
        assert!(f
            .issuer
            .resolve(&encode_token("series", "value"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_deleted_user_does_not_resolve() {
        let f = fixture().await;
        let token = f.issuer.issue(&alice(), 86_400).await.unwrap();
        f.store.remove("alice").await;
        assert!(f.issuer.resolve(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_identity_reflects_current_record() {
        let f = fixture().await;
        let token = f.issuer.issue(&alice(), 86_400).await.unwrap();
        f.store
            .insert(UserRecord::new("alice", "h", "xyz").with_authority(Authority::Admin))
            .await;
        let session = f.issuer.resolve(&token).await.unwrap().unwrap();
        assert!(session.identity.has_authority("ADMIN"));
        assert!(!session.identity.has_authority("USER"));
    }

    #[tokio::test]
    async fn test_other_secret_rejects_token() {
        let f = fixture().await;
        let token = f.issuer.issue(&alice(), 86_400).await.unwrap();
        let impostor = PersistentRememberMe::new(
            Arc::new(f.repository.clone()),
            Arc::new(f.store.clone()),
            "other-secret",
        );
        assert!(impostor.resolve(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_revoke() {
        let f = fixture().await;
        let token = f.issuer.issue(&alice(), 86_400).await.unwrap();
        f.issuer.issue(&alice(), 86_400).await.unwrap();
        f.issuer.revoke("alice").await.unwrap();
        assert!(f.repository.is_empty().await);
        assert!(f.issuer.resolve(&token).await.unwrap().is_none());
    }

    #[test]
    fn test_expiry_clamps_huge_validity() {
        let token = PersistentToken {
            series: "s".to_string(),
            token_digest: "d".to_string(),
            username: "alice".to_string(),
            last_used: Utc::now(),
            validity_seconds: u64::MAX,
        };
        assert!(!token.is_expired(Utc::now()));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let issuer = PersistentRememberMe::new(
            Arc::new(InMemoryTokenRepository::new()),
            Arc::new(InMemoryUserStore::new()),
            "hunter2",
        );
        assert!(!format!("{issuer:?}").contains("hunter2"));
    }

    #[test]
    fn test_generated_secret_is_random() {
        assert_ne!(
            PersistentRememberMe::generate_secret_key(),
            PersistentRememberMe::generate_secret_key()
        );
    }
}
