//! Result handlers.
//!
//! The chain does not decide where a request goes after a login, a failure,
//! a logout or a refusal. It asks [`LoginHandlers`], whose strategies are
//! plain function values. The defaults built by
//! [`LoginHandlers::from_settings`] reproduce the form-login flow:
//!
//! | Event | Default outcome |
//! |---|---|
//! | login succeeded | redirect to `success_url` |
//! | login failed | forward to `login_page` with the public error message under `error_attribute` |
//! | logout | redirect to `logout_success_url` |
//! | anonymous caller on a protected path | redirect to `login_page` |
//! | signed-in caller lacking an authority | forward to `denied_page` |

use std::fmt;
use std::sync::Arc;

use formgate_core::error::GateError;
use formgate_core::settings::LoginSettings;

use crate::user::Identity;

/// What the surrounding web layer should do with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Continue to the application.
    Proceed,
    /// Send an HTTP redirect.
    Redirect {
        /// The redirect target.
        location: String,
    },
    /// Render another page in place of the requested one.
    Forward {
        /// The page to render.
        page: String,
        /// A user-facing error for the page, if any.
        error: Option<PageError>,
    },
}

/// An error message and the request attribute the page reads it from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageError {
    /// The request attribute name.
    pub attribute: String,
    /// The user-facing message.
    pub message: String,
}

impl PageError {
    /// Creates a page error.
    pub fn new(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            message: message.into(),
        }
    }
}

/// Decides the outcome of a successful login.
pub type SuccessHandler = Arc<dyn Fn(&Identity) -> Outcome + Send + Sync>;
/// Decides the outcome of a failed login or challenge.
pub type FailureHandler = Arc<dyn Fn(&GateError) -> Outcome + Send + Sync>;
/// Decides the outcome of a logout. Receives the identity that was signed out.
pub type LogoutHandler = Arc<dyn Fn(Option<&Identity>) -> Outcome + Send + Sync>;
/// Decides the outcome of a protected request by an anonymous caller.
/// Receives the requested path.
pub type EntryPointHandler = Arc<dyn Fn(&str) -> Outcome + Send + Sync>;
/// Decides the outcome of a request refused to a signed-in caller.
pub type DeniedHandler = Arc<dyn Fn(&str, &Identity) -> Outcome + Send + Sync>;

/// The result strategies of the security chain.
#[derive(Clone)]
pub struct LoginHandlers {
    /// Called after credentials were verified.
    pub on_success: SuccessHandler,
    /// Called after the challenge or verification failed.
    pub on_failure: FailureHandler,
    /// Called after a logout.
    pub on_logout: LogoutHandler,
    /// Called when an anonymous caller needs to sign in first.
    pub on_unauthenticated: EntryPointHandler,
    /// Called when a signed-in caller lacks the required authority.
    pub on_denied: DeniedHandler,
}

impl fmt::Debug for LoginHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginHandlers").finish_non_exhaustive()
    }
}

impl Default for LoginHandlers {
    fn default() -> Self {
        Self::from_settings(&LoginSettings::default())
    }
}

impl LoginHandlers {
    /// Builds the default handlers for the configured URLs.
    pub fn from_settings(settings: &LoginSettings) -> Self {
        let success_url = settings.success_url.clone();
        let login_page = settings.login_page.clone();
        let entry_point = settings.login_page.clone();
        let error_attribute = settings.error_attribute.clone();
        let hide_user_not_found = settings.hide_user_not_found;
        let logout_url = settings.logout_success_url.clone();
        let denied_page = settings.denied_page.clone();

        Self {
            on_success: Arc::new(move |_: &Identity| Outcome::Redirect {
                location: success_url.clone(),
            }),
            on_failure: Arc::new(move |error: &GateError| Outcome::Forward {
                page: login_page.clone(),
                error: Some(PageError::new(
                    error_attribute.as_str(),
                    error.public_message(hide_user_not_found),
                )),
            }),
            on_logout: Arc::new(move |_: Option<&Identity>| Outcome::Redirect {
                location: logout_url.clone(),
            }),
            on_unauthenticated: Arc::new(move |_: &str| Outcome::Redirect {
                location: entry_point.clone(),
            }),
            on_denied: Arc::new(move |_: &str, _: &Identity| Outcome::Forward {
                page: denied_page.clone(),
                error: None,
            }),
        }
    }

    /// Replaces the success handler.
    #[must_use]
    pub fn with_success(
        mut self,
        handler: impl Fn(&Identity) -> Outcome + Send + Sync + 'static,
    ) -> Self {
        self.on_success = Arc::new(handler);
        self
    }

    /// Replaces the failure handler.
    #[must_use]
    pub fn with_failure(
        mut self,
        handler: impl Fn(&GateError) -> Outcome + Send + Sync + 'static,
    ) -> Self {
        self.on_failure = Arc::new(handler);
        self
    }

    /// Replaces the logout handler.
    #[must_use]
    pub fn with_logout(
        mut self,
        handler: impl Fn(Option<&Identity>) -> Outcome + Send + Sync + 'static,
    ) -> Self {
        self.on_logout = Arc::new(handler);
        self
    }

    /// Replaces the handler for anonymous callers on protected paths.
    #[must_use]
    pub fn with_unauthenticated(
        mut self,
        handler: impl Fn(&str) -> Outcome + Send + Sync + 'static,
    ) -> Self {
        self.on_unauthenticated = Arc::new(handler);
        self
    }

    /// Replaces the denied handler.
    #[must_use]
    pub fn with_denied(
        mut self,
        handler: impl Fn(&str, &Identity) -> Outcome + Send + Sync + 'static,
    ) -> Self {
        self.on_denied = Arc::new(handler);
        self
    }
}

#[cfg(test)]
mod tests {
    use formgate_core::error::INVALID_CREDENTIALS_MESSAGE;

    use super::*;
    use crate::user::UserRecord;

    #[test]
    fn test_default_success_redirects_to_index() {
        let handlers = LoginHandlers::default();
        let identity = Identity::verified(UserRecord::new("alice", "h", ""));
        assert_eq!(
            (handlers.on_success)(&identity),
            Outcome::Redirect {
                location: "/index".to_string()
            }
        );
    }

    #[test]
    fn test_default_failure_hides_unknown_user() {
        let handlers = LoginHandlers::default();
        let unknown = (handlers.on_failure)(&GateError::UnknownUser("bob".to_string()));
        let bad = (handlers.on_failure)(&GateError::BadCredentials);
        assert_eq!(unknown, bad);
        assert_eq!(
            unknown,
            Outcome::Forward {
                page: "/loginpage".to_string(),
                error: Some(PageError::new("error", INVALID_CREDENTIALS_MESSAGE)),
            }
        );
    }

    #[test]
    fn test_failure_uses_configured_error_attribute() {
        let settings = LoginSettings {
            error_attribute: "loginError".to_string(),
            ..LoginSettings::default()
        };
        let handlers = LoginHandlers::from_settings(&settings);
        let Outcome::Forward { error: Some(error), .. } =
            (handlers.on_failure)(&GateError::ChallengeFailed)
        else {
            panic!("expected a forward with an error");
        };
        assert_eq!(error.attribute, "loginError");
        assert_eq!(error.message, GateError::ChallengeFailed.to_string());
    }

    #[test]
    fn test_failure_reveals_unknown_user_when_configured() {
        let settings = LoginSettings {
            hide_user_not_found: false,
            ..LoginSettings::default()
        };
        let handlers = LoginHandlers::from_settings(&settings);
        let Outcome::Forward { error: Some(error), .. } =
            (handlers.on_failure)(&GateError::UnknownUser("bob".to_string()))
        else {
            panic!("expected a forward with an error");
        };
        assert!(error.message.contains("bob"));
    }

    #[test]
    fn test_default_logout_and_denied() {
        let handlers = LoginHandlers::default();
        let identity = Identity::verified(UserRecord::new("alice", "h", ""));
        assert_eq!(
            (handlers.on_logout)(None),
            Outcome::Redirect {
                location: "/index".to_string()
            }
        );
        assert_eq!(
            (handlers.on_denied)("/admin", &identity),
            Outcome::Forward {
                page: "/denied".to_string(),
                error: None
            }
        );
    }

    #[test]
    fn test_default_unauthenticated_redirects_to_login_page() {
        let handlers = LoginHandlers::default();
        assert_eq!(
            (handlers.on_unauthenticated)("/letter"),
            Outcome::Redirect {
                location: "/loginpage".to_string()
            }
        );
    }

    #[test]
    fn test_custom_handler() {
        let handlers = LoginHandlers::default().with_success(|identity| Outcome::Redirect {
            location: format!("/home/{}", identity.username()),
        });
        let identity = Identity::verified(UserRecord::new("alice", "h", ""));
        assert_eq!(
            (handlers.on_success)(&identity),
            Outcome::Redirect {
                location: "/home/alice".to_string()
            }
        );
    }
}
