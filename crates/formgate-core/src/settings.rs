//! Settings for formgate.
//!
//! [`Settings`] holds the whole configuration: the login flow URLs, the
//! verification-code challenge, remember-me token issuance, the access rules,
//! and optional seed users for the in-memory store. Defaults reproduce a
//! typical form-login deployment: `/letter` for any signed-in user, `/admin`
//! for administrators, and static resources left unprotected.

use serde::{Deserialize, Serialize};

/// URLs and parameter names of the form-login flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginSettings {
    /// The page that renders the login form.
    pub login_page: String,
    /// The path that receives login submissions.
    pub processing_url: String,
    /// Where a successful login redirects.
    pub success_url: String,
    /// The path that triggers logout.
    pub logout_url: String,
    /// Where a logout redirects.
    pub logout_success_url: String,
    /// The page shown when access is denied.
    pub denied_page: String,
    /// The form parameter carrying the username.
    pub username_parameter: String,
    /// The form parameter carrying the password.
    pub password_parameter: String,
    /// The request attribute the failure message is stored under.
    pub error_attribute: String,
    /// Report unknown users and wrong passwords with the same message.
    pub hide_user_not_found: bool,
}

impl Default for LoginSettings {
    fn default() -> Self {
        Self {
            login_page: "/loginpage".to_string(),
            processing_url: "/login".to_string(),
            success_url: "/index".to_string(),
            logout_url: "/logout".to_string(),
            logout_success_url: "/index".to_string(),
            denied_page: "/denied".to_string(),
            username_parameter: "username".to_string(),
            password_parameter: "password".to_string(),
            error_attribute: "error".to_string(),
            hide_user_not_found: true,
        }
    }
}

/// The verification-code check applied before credentials are verified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeSettings {
    /// Whether the challenge is enforced at all.
    pub enabled: bool,
    /// The path the challenge guards (normally the login processing URL).
    pub path: String,
    /// The request parameter holding the submitted code.
    pub parameter: String,
    /// The expected code, compared case-insensitively.
    pub expected: String,
}

impl Default for ChallengeSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/login".to_string(),
            parameter: "verifyCode".to_string(),
            expected: "1234".to_string(),
        }
    }
}

/// Remember-me token issuance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RememberMeSettings {
    /// Whether remember-me tokens are issued and honoured.
    pub enabled: bool,
    /// The login form parameter requesting a token.
    pub parameter: String,
    /// The cookie the token travels in.
    pub cookie_name: String,
    /// How long an issued token stays valid without use.
    pub validity_seconds: u64,
}

impl Default for RememberMeSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            parameter: "remember-me".to_string(),
            cookie_name: "remember-me".to_string(),
            validity_seconds: 86_400, // 24 hours
        }
    }
}

/// The decision for a path that matches no access rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultPolicy {
    /// Unmatched paths are open.
    #[default]
    Allow,
    /// Unmatched paths are closed.
    Deny,
}

/// One configured access rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRuleSettings {
    /// Ant-style path pattern (`/admin`, `/api/**`, `/files/*.txt`).
    pub pattern: String,
    /// Authorities of which the identity needs at least one.
    pub authorities: Vec<String>,
}

impl AccessRuleSettings {
    /// Creates a rule setting from a pattern and authority names.
    pub fn new(pattern: impl Into<String>, authorities: &[&str]) -> Self {
        Self {
            pattern: pattern.into(),
            authorities: authorities.iter().map(|a| (*a).to_string()).collect(),
        }
    }
}

/// Path authorization configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessSettings {
    /// Rules in evaluation order; the first matching rule decides.
    pub rules: Vec<AccessRuleSettings>,
    /// Patterns that bypass the security chain entirely.
    pub ignored: Vec<String>,
    /// The decision for paths no rule matches.
    pub default_policy: DefaultPolicy,
}

impl Default for AccessSettings {
    fn default() -> Self {
        Self {
            rules: vec![
                AccessRuleSettings::new("/letter", &["USER", "ADMIN"]),
                AccessRuleSettings::new("/admin", &["ADMIN"]),
            ],
            ignored: vec!["/resources/**".to_string()],
            default_policy: DefaultPolicy::Allow,
        }
    }
}

/// A user record seeded into the in-memory store at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSeed {
    /// The unique username.
    pub username: String,
    /// The encoded password hash.
    pub password_hash: String,
    /// The salt suffix appended to the password by the legacy hasher.
    #[serde(default)]
    pub salt_suffix: String,
    /// Authority names (`USER`, `ADMIN`).
    #[serde(default)]
    pub authorities: Vec<String>,
}

/// The complete set of formgate settings.
///
/// # Examples
///
/// ```
/// use formgate_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert_eq!(settings.login.processing_url, "/login");
/// assert_eq!(settings.remember_me.validity_seconds, 86_400);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Whether debug mode is enabled (pretty logs instead of JSON).
    pub debug: bool,
    /// The log filter (e.g. "info", "formgate_auth=debug").
    pub log_level: String,
    /// The key remember-me token digests are computed with.
    pub secret_key: String,
    /// The hasher used for new passwords: `argon2`, `bcrypt`, `salted_md5` or
    /// `salted_sha256`.
    pub password_hasher: String,
    /// Form-login URLs and parameters.
    pub login: LoginSettings,
    /// Verification-code challenge.
    pub challenge: ChallengeSettings,
    /// Remember-me tokens.
    pub remember_me: RememberMeSettings,
    /// Access rules.
    pub access: AccessSettings,
    /// Seed users for the in-memory store.
    pub users: Vec<UserSeed>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: true,
            log_level: "info".to_string(),
            secret_key: String::new(),
            password_hasher: "argon2".to_string(),
            login: LoginSettings::default(),
            challenge: ChallengeSettings::default(),
            remember_me: RememberMeSettings::default(),
            access: AccessSettings::default(),
            users: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let s = Settings::default();
        assert!(s.debug);
        assert!(s.secret_key.is_empty());
        assert_eq!(s.log_level, "info");
        assert_eq!(s.password_hasher, "argon2");
        assert!(s.users.is_empty());
    }

    #[test]
    fn test_default_login_flow() {
        let login = LoginSettings::default();
        assert_eq!(login.login_page, "/loginpage");
        assert_eq!(login.processing_url, "/login");
        assert_eq!(login.success_url, "/index");
        assert_eq!(login.logout_url, "/logout");
        assert_eq!(login.denied_page, "/denied");
        assert_eq!(login.error_attribute, "error");
        assert!(login.hide_user_not_found);
    }

    #[test]
    fn test_default_challenge() {
        let c = ChallengeSettings::default();
        assert!(c.enabled);
        assert_eq!(c.path, "/login");
        assert_eq!(c.parameter, "verifyCode");
        assert_eq!(c.expected, "1234");
    }

    #[test]
    fn test_default_access_rules() {
        let access = AccessSettings::default();
        assert_eq!(access.rules.len(), 2);
        assert_eq!(access.rules[0].pattern, "/letter");
        assert_eq!(access.rules[0].authorities, vec!["USER", "ADMIN"]);
        assert_eq!(access.rules[1].pattern, "/admin");
        assert_eq!(access.ignored, vec!["/resources/**"]);
        assert_eq!(access.default_policy, DefaultPolicy::Allow);
    }

    #[test]
    fn test_default_policy_serde() {
        let json = serde_json::to_string(&DefaultPolicy::Deny).unwrap();
        assert_eq!(json, "\"deny\"");
        let parsed: DefaultPolicy = serde_json::from_str("\"allow\"").unwrap();
        assert_eq!(parsed, DefaultPolicy::Allow);
    }
}
