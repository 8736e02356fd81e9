//! Credential verification.
//!
//! [`Verifier`] is the single seam between a login attempt and the user
//! store. [`StoreVerifier`] is its one implementation:
//!
//! 1. The record is fetched by username; absent → `UnknownUser`
//! 2. The password (with the record's salt suffix) is hashed by the hasher the
//!    stored hash identifies
//! 3. A mismatch → `BadCredentials`
//! 4. A match → an [`Identity`] carrying exactly the stored authorities
//!
//! Verification reads the store and nothing else, and is never retried.

use std::sync::Arc;

use async_trait::async_trait;
use formgate_core::error::GateError;

use crate::hashers::{check_password, identify_hasher};
use crate::store::UserStore;
use crate::user::{Credentials, Identity, UserRecord};

/// Decides whether submitted credentials authenticate a user.
#[async_trait]
pub trait Verifier: Send + Sync {
    /// Verifies the credentials, returning the authenticated identity.
    async fn verify(&self, credentials: &Credentials) -> Result<Identity, GateError>;
}

/// Verifies credentials against a [`UserStore`].
#[derive(Clone)]
pub struct StoreVerifier {
    store: Arc<dyn UserStore>,
}

impl std::fmt::Debug for StoreVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreVerifier")
            .field("store", &"<dyn UserStore>")
            .finish()
    }
}

impl StoreVerifier {
    /// Creates a verifier reading from `store`.
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Returns `true` if the record's hash should be replaced by an Argon2id
    /// hash the next time the plaintext password is available.
    pub fn must_upgrade(record: &UserRecord) -> bool {
        match identify_hasher(&record.password_hash) {
            Some(hasher) => hasher.must_update(&record.password_hash),
            None => true,
        }
    }
}

#[async_trait]
impl Verifier for StoreVerifier {
    async fn verify(&self, credentials: &Credentials) -> Result<Identity, GateError> {
        let Some(user) = self.store.find_by_username(&credentials.username).await? else {
            tracing::warn!(username = %credentials.username, "Login rejected: unknown user");
            return Err(GateError::UnknownUser(credentials.username.clone()));
        };

        if !check_password(&credentials.password, &user.salt_suffix, &user.password_hash).await? {
            tracing::warn!(username = %user.username, "Login rejected: bad credentials");
            return Err(GateError::BadCredentials);
        }

        tracing::debug!(
            username = %user.username,
            authorities = ?user.authorities,
            "Credentials verified"
        );
        Ok(Identity::verified(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashers::{make_password, SaltedMd5Hasher, SaltedSha256Hasher};
    use crate::store::InMemoryUserStore;
    use crate::user::Authority;

    async fn verifier_with(records: Vec<UserRecord>) -> StoreVerifier {
        let store = InMemoryUserStore::new();
        for record in records {
            store.insert(record).await;
        }
        StoreVerifier::new(Arc::new(store))
    }

    fn alice() -> UserRecord {
        UserRecord::new("alice", SaltedMd5Hasher::digest("secret", "xyz"), "xyz")
            .with_authority(Authority::User)
    }

    #[tokio::test]
    async fn test_verify_success() {
        let verifier = verifier_with(vec![alice()]).await;
        let identity = verifier
            .verify(&Credentials::new("alice", "secret"))
            .await
            .unwrap();
        assert_eq!(identity.username(), "alice");
        assert_eq!(identity.authorities(), &alice().authority_names());
    }

    #[tokio::test]
    async fn test_verify_unknown_user_any_password() {
        let verifier = verifier_with(vec![alice()]).await;
        for password in ["secret", "", "wrong"] {
            let err = verifier
                .verify(&Credentials::new("bob", password))
                .await
                .unwrap_err();
            assert!(matches!(err, GateError::UnknownUser(ref name) if name == "bob"));
        }
    }

    #[tokio::test]
    async fn test_verify_bad_password() {
        let verifier = verifier_with(vec![alice()]).await;
        let err = verifier
            .verify(&Credentials::new("alice", "secreT"))
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::BadCredentials));
    }

    #[tokio::test]
    async fn test_verify_stored_md5_record() {
        // md5("secret" + "xyz"), as written by the legacy password encoder.
        let record = UserRecord::new("alice", "fb2aae8670490633ac7e96a43f7b0fd8", "xyz")
            .with_authority(Authority::User);
        let verifier = verifier_with(vec![record.clone()]).await;
        let identity = verifier
            .verify(&Credentials::new("alice", "secret"))
            .await
            .unwrap();
        assert!(identity.has_authority("USER"));
        assert!(StoreVerifier::must_upgrade(&record));
    }

    #[tokio::test]
    async fn test_verify_sha256_record() {
        let record = UserRecord::new("dave", SaltedSha256Hasher::digest("secret", "xyz"), "xyz");
        let verifier = verifier_with(vec![record]).await;
        assert!(verifier.verify(&Credentials::new("dave", "secret")).await.is_ok());
    }

    #[tokio::test]
    async fn test_verify_suffix_is_part_of_hash() {
        // The password alone, without the stored suffix, does not match.
        let record = UserRecord::new("alice", SaltedMd5Hasher::digest("secret", ""), "xyz");
        let verifier = verifier_with(vec![record]).await;
        let err = verifier
            .verify(&Credentials::new("alice", "secret"))
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::BadCredentials));
    }

    #[tokio::test]
    async fn test_verify_argon2_record() {
        let hash = make_password("correct horse").await.unwrap();
        let record = UserRecord::new("carol", hash, "")
            .with_authority(Authority::User)
            .with_authority(Authority::Admin);
        let verifier = verifier_with(vec![record]).await;

        let identity = verifier
            .verify(&Credentials::new("carol", "correct horse"))
            .await
            .unwrap();
        assert!(identity.has_authority("ADMIN"));
        assert!(verifier
            .verify(&Credentials::new("carol", "battery staple"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_verify_unusable_password() {
        let verifier = verifier_with(vec![UserRecord::new("locked", "!", "")]).await;
        let err = verifier
            .verify(&Credentials::new("locked", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::BadCredentials));
    }

    #[tokio::test]
    async fn test_verify_sees_password_change() {
        let store = InMemoryUserStore::new();
        store.insert(alice()).await;
        let verifier = StoreVerifier::new(Arc::new(store.clone()));
        assert!(verifier.verify(&Credentials::new("alice", "secret")).await.is_ok());

        store
            .insert(UserRecord::new("alice", SaltedMd5Hasher::digest("changed", "pqr"), "pqr"))
            .await;
        assert!(verifier.verify(&Credentials::new("alice", "secret")).await.is_err());
        assert!(verifier.verify(&Credentials::new("alice", "changed")).await.is_ok());
    }

    #[tokio::test]
    async fn test_must_upgrade() {
        assert!(StoreVerifier::must_upgrade(&alice()));
        let modern = UserRecord::new("carol", make_password("pw").await.unwrap(), "");
        assert!(!StoreVerifier::must_upgrade(&modern));
        assert!(StoreVerifier::must_upgrade(&UserRecord::new("x", "garbage", "")));
    }
}
