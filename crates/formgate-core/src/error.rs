//! Core error types for formgate.
//!
//! [`GateError`] covers both the user-facing authentication outcomes (unknown
//! user, bad credentials, failed challenge, access denied) and the
//! infrastructure failures (configuration, hashing, I/O) that can occur while
//! producing them.

use thiserror::Error;

/// The message shown for both unknown users and wrong passwords when the two
/// are unified.
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid username or password";

/// The primary error type for formgate.
///
/// The first four variants are recoverable by retrying with correct input;
/// none of them is ever retried automatically. Each variant maps to an HTTP
/// status code via [`GateError::status_code`].
#[derive(Error, Debug)]
pub enum GateError {
    // ── Authentication ───────────────────────────────────────────────

    /// No user record exists for the submitted username.
    #[error("Account does not exist: {0}")]
    UnknownUser(String),

    /// The submitted password does not hash to the stored value.
    #[error("Incorrect password")]
    BadCredentials,

    /// The verification code on a login submission was missing or wrong.
    #[error("Invalid verification code")]
    ChallengeFailed,

    // ── Authorization ────────────────────────────────────────────────

    /// The identity lacks every authority required for the path.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    // ── Configuration ────────────────────────────────────────────────

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    // ── Infrastructure ───────────────────────────────────────────────

    /// An internal failure (hashing backend, task join, store).
    #[error("Internal server error: {0}")]
    InternalServerError(String),

    /// An error occurred during serialization or deserialization.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl GateError {
    /// Returns the HTTP status code associated with this error.
    ///
    /// - `UnknownUser`, `BadCredentials` -> 401
    /// - `ChallengeFailed` -> 400
    /// - `AccessDenied` -> 403
    /// - Everything else -> 500
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::UnknownUser(_) | Self::BadCredentials => 401,
            Self::ChallengeFailed => 400,
            Self::AccessDenied(_) => 403,
            Self::ConfigurationError(_)
            | Self::InternalServerError(_)
            | Self::SerializationError(_)
            | Self::IoError(_) => 500,
        }
    }

    /// Returns `true` for the errors a login attempt can end with.
    pub const fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            Self::UnknownUser(_) | Self::BadCredentials | Self::ChallengeFailed
        )
    }

    /// Returns the message suitable for the presentation layer.
    ///
    /// With `hide_user_not_found` set, `UnknownUser` and `BadCredentials`
    /// produce the same text so the response does not reveal whether the
    /// username exists. Infrastructure errors never expose their details.
    pub fn public_message(&self, hide_user_not_found: bool) -> String {
        match self {
            Self::UnknownUser(_) | Self::BadCredentials if hide_user_not_found => {
                INVALID_CREDENTIALS_MESSAGE.to_string()
            }
            Self::UnknownUser(_)
            | Self::BadCredentials
            | Self::ChallengeFailed
            | Self::AccessDenied(_) => self.to_string(),
            Self::ConfigurationError(_)
            | Self::InternalServerError(_)
            | Self::SerializationError(_)
            | Self::IoError(_) => "Internal error".to_string(),
        }
    }
}

/// A convenience type alias for `Result<T, GateError>`.
pub type GateResult<T> = Result<T, GateError>;
