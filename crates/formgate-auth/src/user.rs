//! User records, submitted credentials and authenticated identities.
//!
//! - [`UserRecord`] - What the store holds for one account
//! - [`Credentials`] - One login attempt's username and password
//! - [`Identity`] - An authenticated principal and its granted authorities
//!
//! An [`Identity`] has no public constructor. It can only come out of a
//! successful password comparison in the [verifier](crate::verifier) or a
//! successful [remember-me](crate::remember_me) token resolution.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use formgate_core::error::GateError;
use formgate_core::settings::UserSeed;
use serde::{Deserialize, Serialize};

/// A role granted to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Authority {
    /// A regular signed-in user.
    User,
    /// An administrator.
    Admin,
}

impl Authority {
    /// Returns the textual authority name used in access rules.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Authority {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USER" => Ok(Self::User),
            "ADMIN" => Ok(Self::Admin),
            other => Err(GateError::ConfigurationError(format!(
                "Unknown authority '{other}'"
            ))),
        }
    }
}

/// A user account as held by the [`UserStore`](crate::store::UserStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// The unique username.
    pub username: String,
    /// The encoded password hash.
    pub password_hash: String,
    /// The suffix appended to the password before legacy hashing.
    /// Empty for Argon2 and bcrypt hashes, which embed their own salt.
    pub salt_suffix: String,
    /// The roles granted to this account.
    pub authorities: BTreeSet<Authority>,
}

impl UserRecord {
    /// Creates a record with no authorities.
    pub fn new(
        username: impl Into<String>,
        password_hash: impl Into<String>,
        salt_suffix: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password_hash: password_hash.into(),
            salt_suffix: salt_suffix.into(),
            authorities: BTreeSet::new(),
        }
    }

    /// Adds an authority to the record.
    #[must_use]
    pub fn with_authority(mut self, authority: Authority) -> Self {
        self.authorities.insert(authority);
        self
    }

    /// Builds a record from a configured seed, parsing its authority names.
    pub fn from_seed(seed: &UserSeed) -> Result<Self, GateError> {
        let authorities = seed
            .authorities
            .iter()
            .map(|a| a.parse::<Authority>())
            .collect::<Result<BTreeSet<Authority>, _>>()?;
        Ok(Self {
            username: seed.username.clone(),
            password_hash: seed.password_hash.clone(),
            salt_suffix: seed.salt_suffix.clone(),
            authorities,
        })
    }

    /// Returns the authority names in rule form (`USER`, `ADMIN`).
    pub fn authority_names(&self) -> BTreeSet<String> {
        self.authorities
            .iter()
            .map(|a| a.as_str().to_string())
            .collect()
    }
}

/// The username and password of one login attempt.
#[derive(Clone)]
pub struct Credentials {
    /// The submitted username.
    pub username: String,
    /// The submitted plaintext password.
    pub password: String,
}

impl Credentials {
    /// Creates credentials from a username and password.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// An authenticated principal and its granted authorities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    principal: UserRecord,
    authorities: BTreeSet<String>,
}

impl Identity {
    /// Wraps a record whose credential has just been verified.
    pub(crate) fn verified(principal: UserRecord) -> Self {
        let authorities = principal.authority_names();
        Self {
            principal,
            authorities,
        }
    }

    /// Returns the user record this identity was built from.
    pub const fn principal(&self) -> &UserRecord {
        &self.principal
    }

    /// Returns the principal's username.
    pub fn username(&self) -> &str {
        &self.principal.username
    }

    /// Returns the granted authority names.
    pub const fn authorities(&self) -> &BTreeSet<String> {
        &self.authorities
    }

    /// Returns `true` if the identity holds the named authority.
    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.contains(authority)
    }

    /// Returns `true` if the identity holds at least one of `required`.
    pub fn has_any_authority(&self, required: &BTreeSet<String>) -> bool {
        !self.authorities.is_disjoint(required)
    }
}
