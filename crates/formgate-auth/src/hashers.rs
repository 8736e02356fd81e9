//! Password hashing for formgate.
//!
//! The encoded hash identifies which hasher produced it, so records hashed
//! under different schemes can live side by side.
//!
//! - [`Argon2Hasher`] - Argon2id with a random salt embedded in the PHC string (default)
//! - [`BcryptHasher`] - bcrypt with a configurable cost
//! - [`SaltedMd5Hasher`] - Legacy scheme: hex MD5 of `password + salt_suffix`
//! - [`SaltedSha256Hasher`] - Legacy scheme: hex SHA-256 of `password + salt_suffix`
//!
//! The legacy schemes are fast general-purpose hashes and their suffix is
//! stored next to the hash, so it survives password changes unless rotated.
//! They stay only to verify existing records, and
//! [`StoreVerifier::must_upgrade`](crate::verifier::StoreVerifier::must_upgrade)
//! flags them for rehashing.

use async_trait::async_trait;
use formgate_core::error::GateError;
use md5::Md5;
use sha2::{Digest, Sha256};

/// Marker prefix for unusable passwords (accounts that cannot log in).
const UNUSABLE_PASSWORD_PREFIX: &str = "!";

/// Length of a hex-encoded MD5 digest.
const MD5_HEX_LEN: usize = 32;

/// Length of a hex-encoded SHA-256 digest.
const SHA256_HEX_LEN: usize = 64;

/// Trait for password hashing backends.
///
/// `salt_suffix` is the per-user value stored next to the hash. Hashers that
/// embed their own salt ignore it.
#[async_trait]
pub trait PasswordHasher: Send + Sync {
    /// Returns the algorithm identifier (`argon2`, `bcrypt`, `salted_md5`, `salted_sha256`).
    fn algorithm(&self) -> &str;

    /// Hashes a password and returns the encoded hash string.
    async fn hash(&self, password: &str, salt_suffix: &str) -> Result<String, GateError>;

    /// Returns `true` if `password` (with `salt_suffix`) matches `encoded`.
    async fn verify(
        &self,
        password: &str,
        salt_suffix: &str,
        encoded: &str,
    ) -> Result<bool, GateError>;

    /// Returns `true` if the hash should be re-hashed with the preferred hasher.
    fn must_update(&self, encoded: &str) -> bool;
}

/// Runs a CPU-heavy hashing step off the async executor.
async fn blocking<T, F>(work: F) -> Result<T, GateError>
where
    F: FnOnce() -> Result<T, GateError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| GateError::InternalServerError(format!("Hashing task failed: {e}")))?
}

/// Argon2id password hasher (default).
#[derive(Debug, Clone)]
pub struct Argon2Hasher;

#[async_trait]
impl PasswordHasher for Argon2Hasher {
    fn algorithm(&self) -> &'static str {
        "argon2"
    }

    async fn hash(&self, password: &str, _salt_suffix: &str) -> Result<String, GateError> {
        use argon2::password_hash::{rand_core::OsRng, PasswordHasher as _, SaltString};

        let password = password.to_string();
        blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            argon2::Argon2::default()
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|e| GateError::InternalServerError(format!("Argon2 hash error: {e}")))
        })
        .await
    }

    async fn verify(
        &self,
        password: &str,
        _salt_suffix: &str,
        encoded: &str,
    ) -> Result<bool, GateError> {
        use argon2::password_hash::{PasswordHash, PasswordVerifier};

        let password = password.to_string();
        let encoded = encoded.to_string();
        blocking(move || {
            let parsed = PasswordHash::new(&encoded).map_err(|e| {
                GateError::InternalServerError(format!("Malformed Argon2 hash: {e}"))
            })?;
            Ok(argon2::Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok())
        })
        .await
    }

    fn must_update(&self, encoded: &str) -> bool {
        !encoded.starts_with("$argon2id$")
    }
}

/// Bcrypt password hasher.
#[derive(Debug, Clone)]
pub struct BcryptHasher {
    /// The minimum acceptable cost; lower-cost hashes must be updated.
    pub cost: u32,
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self { cost: 12 }
    }
}

#[async_trait]
impl PasswordHasher for BcryptHasher {
    fn algorithm(&self) -> &'static str {
        "bcrypt"
    }

    async fn hash(&self, password: &str, _salt_suffix: &str) -> Result<String, GateError> {
        let password = password.to_string();
        let cost = self.cost;
        blocking(move || {
            bcrypt::hash(password, cost)
                .map_err(|e| GateError::InternalServerError(format!("Bcrypt hash error: {e}")))
        })
        .await
    }

    async fn verify(
        &self,
        password: &str,
        _salt_suffix: &str,
        encoded: &str,
    ) -> Result<bool, GateError> {
        let password = password.to_string();
        let encoded = encoded.to_string();
        blocking(move || {
            bcrypt::verify(password, &encoded)
                .map_err(|e| GateError::InternalServerError(format!("Bcrypt verify error: {e}")))
        })
        .await
    }

    fn must_update(&self, encoded: &str) -> bool {
        // $2b$<cost>$<salt+hash>
        encoded
            .split('$')
            .nth(2)
            .and_then(|cost| cost.parse::<u32>().ok())
            .is_some_and(|cost| cost < self.cost)
    }
}

/// Legacy salted MD5 hasher.
///
/// Computes the lower-case hex MD5 of the password with the stored suffix
/// appended, the format of records carried over from the first deployment.
#[derive(Debug, Clone)]
pub struct SaltedMd5Hasher;

impl SaltedMd5Hasher {
    /// Computes the legacy digest synchronously.
    pub fn digest(password: &str, salt_suffix: &str) -> String {
        let mut hasher = Md5::new();
        hasher.update(password.as_bytes());
        hasher.update(salt_suffix.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[async_trait]
impl PasswordHasher for SaltedMd5Hasher {
    fn algorithm(&self) -> &'static str {
        "salted_md5"
    }

    async fn hash(&self, password: &str, salt_suffix: &str) -> Result<String, GateError> {
        Ok(Self::digest(password, salt_suffix))
    }

    async fn verify(
        &self,
        password: &str,
        salt_suffix: &str,
        encoded: &str,
    ) -> Result<bool, GateError> {
        let candidate = Self::digest(password, salt_suffix);
        Ok(constant_time_eq(candidate.as_bytes(), encoded.as_bytes()))
    }

    fn must_update(&self, _encoded: &str) -> bool {
        true
    }
}

/// Legacy salted SHA-256 hasher.
///
/// Computes the lower-case hex SHA-256 of the password with the stored
/// suffix appended. Kept for records created before the switch to Argon2.
#[derive(Debug, Clone)]
pub struct SaltedSha256Hasher;

impl SaltedSha256Hasher {
    /// Computes the legacy digest synchronously.
    pub fn digest(password: &str, salt_suffix: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(password.as_bytes());
        hasher.update(salt_suffix.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[async_trait]
impl PasswordHasher for SaltedSha256Hasher {
    fn algorithm(&self) -> &'static str {
        "salted_sha256"
    }

    async fn hash(&self, password: &str, salt_suffix: &str) -> Result<String, GateError> {
        Ok(Self::digest(password, salt_suffix))
    }

    async fn verify(
        &self,
        password: &str,
        salt_suffix: &str,
        encoded: &str,
    ) -> Result<bool, GateError> {
        let candidate = Self::digest(password, salt_suffix);
        Ok(constant_time_eq(candidate.as_bytes(), encoded.as_bytes()))
    }

    fn must_update(&self, _encoded: &str) -> bool {
        true
    }
}

/// Constant-time byte comparison to prevent timing attacks.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Returns the hasher configured by name (`argon2`, `bcrypt`, `salted_md5`, `salted_sha256`).
pub fn hasher_for_name(name: &str) -> Result<Box<dyn PasswordHasher>, GateError> {
    match name {
        "argon2" => Ok(Box::new(Argon2Hasher)),
        "bcrypt" => Ok(Box::new(BcryptHasher::default())),
        "salted_md5" => Ok(Box::new(SaltedMd5Hasher)),
        "salted_sha256" => Ok(Box::new(SaltedSha256Hasher)),
        other => Err(GateError::ConfigurationError(format!(
            "Unknown password hasher '{other}'"
        ))),
    }
}

/// Identifies the hasher for a given encoded hash.
///
/// Legacy digests carry no prefix and are told apart by their hex length.
pub fn identify_hasher(encoded: &str) -> Option<Box<dyn PasswordHasher>> {
    if encoded.starts_with("$argon2") {
        return Some(Box::new(Argon2Hasher));
    }
    if ["$2a$", "$2b$", "$2y$"].iter().any(|p| encoded.starts_with(p)) {
        return Some(Box::new(BcryptHasher::default()));
    }
    if !encoded.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    match encoded.len() {
        MD5_HEX_LEN => Some(Box::new(SaltedMd5Hasher)),
        SHA256_HEX_LEN => Some(Box::new(SaltedSha256Hasher)),
        _ => None,
    }
}

/// Hashes a password with the preferred hasher (Argon2id).
pub async fn make_password(password: &str) -> Result<String, GateError> {
    Argon2Hasher.hash(password, "").await
}

/// Checks a password against an encoded hash.
///
/// The hasher is identified from the hash format. Returns `false` for
/// unusable hashes and for formats no hasher recognises.
pub async fn check_password(
    password: &str,
    salt_suffix: &str,
    encoded: &str,
) -> Result<bool, GateError> {
    if !is_password_usable(encoded) {
        return Ok(false);
    }

    let Some(hasher) = identify_hasher(encoded) else {
        tracing::warn!(
            prefix = %encoded.chars().take(8).collect::<String>(),
            "Unrecognised password hash format"
        );
        return Ok(false);
    };

    hasher.verify(password, salt_suffix, encoded).await
}

/// Returns `true` if the encoded hash represents a usable password.
///
/// Hashes prefixed with `!` (or empty) are unusable.
pub fn is_password_usable(encoded: &str) -> bool {
    !encoded.is_empty() && !encoded.starts_with(UNUSABLE_PASSWORD_PREFIX)
}
