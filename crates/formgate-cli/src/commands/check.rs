//! The `check` management command.
//!
//! Runs configuration checks over the settings and reports anything that
//! would misbehave at runtime or weaken the login flow.

use async_trait::async_trait;
use formgate_auth::hashers::hasher_for_name;
use formgate_auth::{AccessPolicy, StoreVerifier, UserRecord};
use formgate_core::{DefaultPolicy, GateError, Settings};

use crate::command::ManagementCommand;

/// Validates the settings.
pub struct CheckCommand;

/// The result of a single check.
#[derive(Debug, Clone)]
pub struct CheckMessage {
    /// The severity level of this check result.
    pub level: CheckLevel,
    /// A human-readable description of the issue.
    pub msg: String,
    /// An optional hint for how to resolve the issue.
    pub hint: Option<String>,
    /// A unique identifier for this check (e.g. "security.W001").
    pub id: String,
}

impl CheckMessage {
    fn new(level: CheckLevel, id: &str, msg: impl Into<String>, hint: Option<&str>) -> Self {
        Self {
            level,
            msg: msg.into(),
            hint: hint.map(ToString::to_string),
            id: id.to_string(),
        }
    }
}

/// Severity levels for check results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CheckLevel {
    /// Informational message.
    Info,
    /// A warning that may indicate a problem.
    Warning,
    /// An error that must be resolved.
    Error,
}

impl std::fmt::Display for CheckLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Runs all checks against the given settings.
pub fn run_checks(settings: &Settings) -> Vec<CheckMessage> {
    let mut messages = Vec::new();

    if settings.secret_key.is_empty() && settings.remember_me.enabled {
        messages.push(CheckMessage::new(
            CheckLevel::Warning,
            "security.W001",
            "secret_key is empty; remember-me tokens will not survive a restart",
            Some("Set a long random secret_key or FORMGATE_SECRET_KEY"),
        ));
    }

    if let Err(e) = hasher_for_name(&settings.password_hasher) {
        messages.push(CheckMessage::new(CheckLevel::Error, "auth.E001", e.to_string(), None));
    } else if settings.password_hasher != "argon2" {
        messages.push(CheckMessage::new(
            CheckLevel::Warning,
            "auth.W001",
            format!("password_hasher is '{}'", settings.password_hasher),
            Some("Use argon2 for new passwords"),
        ));
    }

    if let Err(e) = AccessPolicy::from_settings(&settings.access) {
        messages.push(CheckMessage::new(CheckLevel::Error, "access.E001", e.to_string(), None));
    }

    if settings.access.default_policy == DefaultPolicy::Allow {
        messages.push(CheckMessage::new(
            CheckLevel::Info,
            "access.I001",
            "Paths without a matching rule are open to everyone",
            Some("Set access.default_policy = \"deny\" to close them"),
        ));
    }

    if settings.challenge.enabled {
        if settings.challenge.expected.is_empty() {
            messages.push(CheckMessage::new(
                CheckLevel::Error,
                "challenge.E001",
                "challenge.expected is empty",
                Some("Configure a verification code or disable the challenge"),
            ));
        }
        if settings.challenge.path != settings.login.processing_url {
            messages.push(CheckMessage::new(
                CheckLevel::Warning,
                "challenge.W001",
                format!(
                    "challenge.path '{}' differs from login.processing_url '{}'",
                    settings.challenge.path, settings.login.processing_url
                ),
                Some("Login submissions bypass the verification code"),
            ));
        }
    }

    if settings.remember_me.enabled && settings.remember_me.validity_seconds == 0 {
        messages.push(CheckMessage::new(
            CheckLevel::Error,
            "remember_me.E001",
            "remember_me.validity_seconds is 0",
            Some("Use a positive validity or disable remember-me"),
        ));
    }

    let mut seen = std::collections::HashSet::new();
    for seed in &settings.users {
        if !seen.insert(seed.username.as_str()) {
            messages.push(CheckMessage::new(
                CheckLevel::Error,
                "users.E001",
                format!("Duplicate user '{}'", seed.username),
                None,
            ));
            continue;
        }
        match UserRecord::from_seed(seed) {
            Err(e) => messages.push(CheckMessage::new(
                CheckLevel::Error,
                "users.E002",
                format!("User '{}': {e}", seed.username),
                None,
            )),
            Ok(record) if StoreVerifier::must_upgrade(&record) => {
                messages.push(CheckMessage::new(
                    CheckLevel::Warning,
                    "users.W001",
                    format!("User '{}' has a legacy or unrecognised password hash", seed.username),
                    Some("Rehash with `formgate hashpassword`"),
                ));
            }
            Ok(_) => {}
        }
    }

    messages
}

#[async_trait]
impl ManagementCommand for CheckCommand {
    fn name(&self) -> &'static str {
        "check"
    }

    fn help(&self) -> &'static str {
        "Check the settings for problems"
    }

    async fn handle(
        &self,
        _matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), GateError> {
        let messages = run_checks(settings);

        if messages.is_empty() {
            tracing::info!("Settings check identified no issues");
            return Ok(());
        }

        let errors = messages.iter().filter(|m| m.level >= CheckLevel::Error).count();
        let warnings = messages.iter().filter(|m| m.level == CheckLevel::Warning).count();

        for msg in &messages {
            let hint_text = msg
                .hint
                .as_ref()
                .map_or(String::new(), |h| format!("\n\tHINT: {h}"));
            match msg.level {
                CheckLevel::Info => tracing::info!("{} ({}): {}{}", msg.level, msg.id, msg.msg, hint_text),
                _ => tracing::warn!("{} ({}): {}{}", msg.level, msg.id, msg.msg, hint_text),
            }
        }

        tracing::info!(
            "Settings check identified {} issue(s) ({} error(s), {} warning(s))",
            messages.len(),
            errors,
            warnings
        );

        if errors > 0 {
            return Err(GateError::ConfigurationError(format!(
                "Settings check found {errors} error(s)"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use formgate_auth::hashers::SaltedSha256Hasher;
    use formgate_core::settings::{AccessRuleSettings, UserSeed};

    use super::*;

    fn ids(settings: &Settings) -> Vec<String> {
        run_checks(settings).into_iter().map(|m| m.id).collect()
    }

    fn seed(username: &str, hash: &str) -> UserSeed {
        UserSeed {
            username: username.to_string(),
            password_hash: hash.to_string(),
            salt_suffix: String::new(),
            authorities: vec!["USER".to_string()],
        }
    }

    #[test]
    fn test_defaults_only_warn() {
        let messages = run_checks(&Settings::default());
        assert!(messages.iter().all(|m| m.level < CheckLevel::Error));
        assert!(messages.iter().any(|m| m.id == "security.W001"));
        assert!(messages.iter().any(|m| m.id == "access.I001"));
    }

    #[test]
    fn test_secret_key_not_needed_without_remember_me() {
        let mut settings = Settings::default();
        settings.remember_me.enabled = false;
        assert!(!ids(&settings).contains(&"security.W001".to_string()));
    }

    #[test]
    fn test_bad_hasher_and_rules() {
        let mut settings = Settings::default();
        settings.password_hasher = "rot13".to_string();
        settings.access.rules.push(AccessRuleSettings::new("/ops", &["OPS"]));
        let ids = ids(&settings);
        assert!(ids.contains(&"auth.E001".to_string()));
        assert!(ids.contains(&"access.E001".to_string()));
    }

    #[test]
    fn test_challenge_checks() {
        let mut settings = Settings::default();
        settings.challenge.expected = String::new();
        settings.challenge.path = "/signin".to_string();
        let ids = ids(&settings);
        assert!(ids.contains(&"challenge.E001".to_string()));
        assert!(ids.contains(&"challenge.W001".to_string()));
    }

    #[test]
    fn test_zero_validity() {
        let mut settings = Settings::default();
        settings.remember_me.validity_seconds = 0;
        assert!(ids(&settings).contains(&"remember_me.E001".to_string()));
    }

    #[test]
    fn test_user_checks() {
        let mut settings = Settings::default();
        let legacy = SaltedSha256Hasher::digest("secret", "");
        settings.users = vec![
            seed("alice", &legacy),
            seed("alice", &legacy),
            UserSeed {
                authorities: vec!["GOD".to_string()],
                ..seed("bob", &legacy)
            },
        ];
        let ids = ids(&settings);
        assert!(ids.contains(&"users.W001".to_string()));
        assert!(ids.contains(&"users.E001".to_string()));
        assert!(ids.contains(&"users.E002".to_string()));
    }

    #[tokio::test]
    async fn test_handle_fails_on_errors() {
        let mut settings = Settings::default();
        settings.remember_me.validity_seconds = 0;
        let matches = clap::Command::new("check").get_matches_from(["check"]);
        assert!(CheckCommand.handle(&matches, &settings).await.is_err());
        assert!(CheckCommand.handle(&matches, &Settings::default()).await.is_ok());
    }

    #[test]
    fn test_check_level_ordering() {
        assert!(CheckLevel::Info < CheckLevel::Warning);
        assert!(CheckLevel::Warning < CheckLevel::Error);
        assert_eq!(CheckLevel::Error.to_string(), "ERROR");
    }
}
