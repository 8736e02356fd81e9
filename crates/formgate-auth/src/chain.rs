//! The security chain.
//!
//! [`SecurityChain::handle`] runs every request through the same fixed
//! sequence:
//!
//! 1. Ignored paths proceed untouched
//! 2. The verification-code challenge guards the login submission path
//! 3. A login submission is verified; success may issue a remember-me token
//! 4. A logout revokes tokens and clears the context
//! 5. Any other request may be authenticated from a remember-me cookie and
//!    is then authorized against the access policy. The login page and the
//!    denied page are always reachable. A refused anonymous caller is sent to
//!    sign in; a refused signed-in caller is shown the denied page
//!
//! The chain never fails: store and repository errors are logged and handled
//! like a failed login or an invalid cookie.

use std::sync::Arc;

use formgate_core::error::GateError;
use formgate_core::logging::auth_span;
use formgate_core::settings::{LoginSettings, RememberMeSettings, Settings};
use tracing::Instrument;

use crate::access::{AccessPolicy, Decision};
use crate::challenge::ChallengeFilter;
use crate::handlers::{LoginHandlers, Outcome};
use crate::remember_me::{InMemoryTokenRepository, PersistentRememberMe, SessionIssuer};
use crate::request::AuthRequest;
use crate::store::UserStore;
use crate::user::{Credentials, Identity};
use crate::verifier::{StoreVerifier, Verifier};

/// A cookie change the web layer should apply to the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieDirective {
    /// Set a cookie.
    Set {
        /// Cookie name.
        name: String,
        /// Cookie value.
        value: String,
        /// Lifetime in seconds.
        max_age: u64,
    },
    /// Expire a cookie.
    Clear {
        /// Cookie name.
        name: String,
    },
}

/// The chain's verdict on one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainResponse {
    /// Where the request goes next.
    pub outcome: Outcome,
    /// A cookie to set or clear, if any.
    pub cookie: Option<CookieDirective>,
}

impl ChainResponse {
    const fn new(outcome: Outcome) -> Self {
        Self {
            outcome,
            cookie: None,
        }
    }

    /// Returns `true` if the request may continue to the application.
    pub const fn is_proceed(&self) -> bool {
        matches!(self.outcome, Outcome::Proceed)
    }
}

/// Ties the challenge, verifier, remember-me issuer and access policy together.
#[derive(Clone)]
pub struct SecurityChain {
    login: LoginSettings,
    remember_me: RememberMeSettings,
    challenge: Option<ChallengeFilter>,
    verifier: Arc<dyn Verifier>,
    issuer: Option<Arc<dyn SessionIssuer>>,
    policy: AccessPolicy,
    handlers: LoginHandlers,
}

impl std::fmt::Debug for SecurityChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityChain")
            .field("login", &self.login)
            .field("challenge", &self.challenge)
            .field("policy", &self.policy)
            .field("remember_me", &self.issuer.is_some())
            .finish_non_exhaustive()
    }
}

impl SecurityChain {
    /// Builds the chain from settings, verifying against `store`.
    ///
    /// Remember-me tokens are kept in memory. Without a configured
    /// `secret_key` a random one is generated, so tokens do not outlive the
    /// process.
    pub fn from_settings(settings: &Settings, store: Arc<dyn UserStore>) -> Result<Self, GateError> {
        let policy = AccessPolicy::from_settings(&settings.access)?;

        let issuer: Option<Arc<dyn SessionIssuer>> = if settings.remember_me.enabled {
            let secret_key = if settings.secret_key.is_empty() {
                tracing::warn!("No secret_key configured; remember-me tokens use a random key");
                PersistentRememberMe::generate_secret_key()
            } else {
                settings.secret_key.clone()
            };
            Some(Arc::new(PersistentRememberMe::new(
                Arc::new(InMemoryTokenRepository::new()),
                Arc::clone(&store),
                secret_key,
            )))
        } else {
            None
        };

        Ok(Self {
            login: settings.login.clone(),
            remember_me: settings.remember_me.clone(),
            challenge: ChallengeFilter::from_settings(&settings.challenge),
            verifier: Arc::new(StoreVerifier::new(store)),
            issuer,
            policy,
            handlers: LoginHandlers::from_settings(&settings.login),
        })
    }

    /// Replaces the result handlers.
    #[must_use]
    pub fn with_handlers(mut self, handlers: LoginHandlers) -> Self {
        self.handlers = handlers;
        self
    }

    /// Replaces the credential verifier.
    #[must_use]
    pub fn with_verifier(mut self, verifier: Arc<dyn Verifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Replaces the remember-me issuer. Ignored when remember-me is disabled.
    #[must_use]
    pub fn with_session_issuer(mut self, issuer: Arc<dyn SessionIssuer>) -> Self {
        if self.remember_me.enabled {
            self.issuer = Some(issuer);
        }
        self
    }

    /// Returns the access policy.
    pub const fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Returns the result handlers.
    pub const fn handlers(&self) -> &LoginHandlers {
        &self.handlers
    }

    /// Runs `request` through the chain, updating its security context.
    pub async fn handle(&self, request: &mut AuthRequest) -> ChainResponse {
        let span = auth_span(request.path());
        self.dispatch(request).instrument(span).await
    }

    async fn dispatch(&self, request: &mut AuthRequest) -> ChainResponse {
        if self.policy.is_ignored(request.path()) {
            return ChainResponse::new(Outcome::Proceed);
        }

        if let Some(challenge) = &self.challenge {
            if let Err(error) = challenge.check(request) {
                return ChainResponse::new((self.handlers.on_failure)(&error));
            }
        }

        if request.path() == self.login.processing_url {
            self.login(request).await
        } else if request.path() == self.login.logout_url {
            self.logout(request).await
        } else {
            self.authorize(request).await
        }
    }

    async fn login(&self, request: &mut AuthRequest) -> ChainResponse {
        let credentials = Credentials::new(
            request.param(&self.login.username_parameter).unwrap_or_default(),
            request.param(&self.login.password_parameter).unwrap_or_default(),
        );

        let identity = match self.verifier.verify(&credentials).await {
            Ok(identity) => identity,
            Err(error) => {
                if !error.is_authentication_failure() {
                    tracing::error!(%error, "Credential verification failed");
                }
                return ChainResponse::new((self.handlers.on_failure)(&error));
            }
        };

        tracing::info!(username = identity.username(), "Login succeeded");
        let cookie = self.issue_token(request, &identity).await;
        let outcome = (self.handlers.on_success)(&identity);
        request.context_mut().authenticate(identity);
        ChainResponse { outcome, cookie }
    }

    async fn issue_token(&self, request: &AuthRequest, identity: &Identity) -> Option<CookieDirective> {
        let issuer = self.issuer.as_ref()?;
        if !request.param(&self.remember_me.parameter).is_some_and(is_truthy) {
            return None;
        }
        match issuer.issue(identity, self.remember_me.validity_seconds).await {
            Ok(value) => Some(self.set_cookie(value)),
            Err(error) => {
                tracing::error!(%error, "Could not issue remember-me token");
                None
            }
        }
    }

    async fn logout(&self, request: &mut AuthRequest) -> ChainResponse {
        let mut identity = request.context_mut().clear();
        let mut cookie = None;

        if let Some(issuer) = &self.issuer {
            if identity.is_none() {
                if let Some(token) = request.cookie(&self.remember_me.cookie_name) {
                    identity = issuer
                        .resolve(token)
                        .await
                        .ok()
                        .flatten()
                        .map(|session| session.identity);
                }
            }
            if let Some(identity) = &identity {
                if let Err(error) = issuer.revoke(identity.username()).await {
                    tracing::error!(%error, "Could not revoke remember-me tokens");
                }
            }
            cookie = Some(self.clear_cookie());
        }

        tracing::info!(
            username = identity.as_ref().map_or("<anonymous>", Identity::username),
            "Logout"
        );
        ChainResponse {
            outcome: (self.handlers.on_logout)(identity.as_ref()),
            cookie,
        }
    }

    async fn authorize(&self, request: &mut AuthRequest) -> ChainResponse {
        let cookie = self.authenticate_from_cookie(request).await;

        let path = request.path();
        if self.is_public_page(path) {
            return ChainResponse {
                outcome: Outcome::Proceed,
                cookie,
            };
        }

        let identity = request.context().identity();
        let outcome = match (self.policy.authorize(path, identity), identity) {
            (Decision::Allow, _) => Outcome::Proceed,
            (Decision::Deny, None) => {
                tracing::info!(path, "Authentication required");
                (self.handlers.on_unauthenticated)(path)
            }
            (Decision::Deny, Some(identity)) => {
                tracing::info!(path, user = identity.username(), "Access denied");
                (self.handlers.on_denied)(path, identity)
            }
        };
        ChainResponse { outcome, cookie }
    }

    /// Pages the flow itself routes to; no policy may lock them.
    fn is_public_page(&self, path: &str) -> bool {
        path == self.login.login_page || path == self.login.denied_page
    }

    async fn authenticate_from_cookie(&self, request: &mut AuthRequest) -> Option<CookieDirective> {
        if request.context().is_authenticated() {
            return None;
        }
        let issuer = self.issuer.as_ref()?;
        let token = request.cookie(&self.remember_me.cookie_name)?.to_string();

        match issuer.resolve(&token).await {
            Ok(Some(session)) => {
                request.context_mut().authenticate(session.identity);
                Some(self.set_cookie(session.token))
            }
            Ok(None) => Some(self.clear_cookie()),
            Err(error) => {
                tracing::error!(%error, "Could not resolve remember-me token");
                Some(self.clear_cookie())
            }
        }
    }

    fn set_cookie(&self, value: String) -> CookieDirective {
        CookieDirective::Set {
            name: self.remember_me.cookie_name.clone(),
            value,
            max_age: self.remember_me.validity_seconds,
        }
    }

    fn clear_cookie(&self) -> CookieDirective {
        CookieDirective::Clear {
            name: self.remember_me.cookie_name.clone(),
        }
    }
}

/// Checkbox values that request a remember-me token.
fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "on" | "yes" | "1"
    )
}
