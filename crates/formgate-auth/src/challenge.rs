//! Verification-code challenge on login submissions.
//!
//! The filter runs before credential verification. A submission to the
//! guarded path must carry the expected code, compared case-insensitively,
//! or it is rejected with `ChallengeFailed` and the verifier never runs.

use formgate_core::error::GateError;
use formgate_core::settings::ChallengeSettings;

use crate::request::AuthRequest;

/// Checks the verification code on one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeFilter {
    path: String,
    parameter: String,
    expected: String,
}

impl ChallengeFilter {
    /// Creates a filter guarding `path`.
    pub fn new(path: &str, parameter: &str, expected: &str) -> Self {
        Self {
            path: path.to_string(),
            parameter: parameter.to_string(),
            expected: expected.to_lowercase(),
        }
    }

    /// Builds the configured filter, or `None` when the challenge is disabled.
    pub fn from_settings(settings: &ChallengeSettings) -> Option<Self> {
        settings
            .enabled
            .then(|| Self::new(&settings.path, &settings.parameter, &settings.expected))
    }

    /// Returns `true` if requests to `path` must pass the challenge.
    pub fn applies_to(&self, path: &str) -> bool {
        self.path == path
    }

    /// Checks the submitted code. Requests to other paths always pass.
    pub fn check(&self, request: &AuthRequest) -> Result<(), GateError> {
        if !self.applies_to(request.path()) {
            return Ok(());
        }
        match request.param(&self.parameter) {
            Some(code) if code.to_lowercase() == self.expected => Ok(()),
            Some(_) => {
                tracing::warn!(path = request.path(), "Verification code mismatch");
                Err(GateError::ChallengeFailed)
            }
            None => {
                tracing::warn!(path = request.path(), "Verification code missing");
                Err(GateError::ChallengeFailed)
            }
        }
    }
}
