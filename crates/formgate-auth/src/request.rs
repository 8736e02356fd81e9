//! The framework-neutral request handled by the security chain.
//!
//! An [`AuthRequest`] carries only what authentication needs: the path, the
//! submitted form or query parameters, the incoming cookies, and the
//! [`SecurityContext`]. Adapters for a concrete web framework fill one in
//! per request. Tests build them with [`AuthRequest::builder`].

use std::collections::HashMap;

use crate::context::SecurityContext;

/// A request as seen by the security chain.
#[derive(Debug, Clone, Default)]
pub struct AuthRequest {
    path: String,
    params: HashMap<String, String>,
    cookies: HashMap<String, String>,
    context: SecurityContext,
}

impl AuthRequest {
    /// Creates a builder for a request.
    pub fn builder() -> AuthRequestBuilder {
        AuthRequestBuilder::default()
    }

    /// Creates an anonymous request for `path` with no parameters.
    pub fn new(path: &str) -> Self {
        Self::builder().path(path).build()
    }

    /// Returns the request path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns a submitted parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Returns all submitted parameters.
    pub const fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// Returns an incoming cookie value.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Returns the security context.
    pub const fn context(&self) -> &SecurityContext {
        &self.context
    }

    /// Returns the security context mutably.
    pub fn context_mut(&mut self) -> &mut SecurityContext {
        &mut self.context
    }
}

/// Builder for [`AuthRequest`].
#[derive(Debug)]
pub struct AuthRequestBuilder {
    path: String,
    params: HashMap<String, String>,
    cookies: HashMap<String, String>,
    context: SecurityContext,
}

impl Default for AuthRequestBuilder {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            params: HashMap::new(),
            cookies: HashMap::new(),
            context: SecurityContext::anonymous(),
        }
    }
}

impl AuthRequestBuilder {
    /// Sets the request path.
    #[must_use]
    pub fn path(mut self, path: &str) -> Self {
        self.path = path.to_string();
        self
    }

    /// Adds a form or query parameter.
    #[must_use]
    pub fn param(mut self, name: &str, value: &str) -> Self {
        self.params.insert(name.to_string(), value.to_string());
        self
    }

    /// Adds an incoming cookie.
    #[must_use]
    pub fn cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.insert(name.to_string(), value.to_string());
        self
    }

    /// Sets the security context, e.g. one restored from a session.
    #[must_use]
    pub fn context(mut self, context: SecurityContext) -> Self {
        self.context = context;
        self
    }

    /// Builds the [`AuthRequest`].
    pub fn build(self) -> AuthRequest {
        AuthRequest {
            path: self.path,
            params: self.params,
            cookies: self.cookies,
            context: self.context,
        }
    }
}
