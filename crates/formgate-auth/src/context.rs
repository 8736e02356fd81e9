//! The per-request security context.

use crate::user::Identity;

/// Holds the identity authenticated for one request, if any.
///
/// The context travels with its [`AuthRequest`](crate::request::AuthRequest).
/// Nothing in this crate reads the current identity from anywhere else.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityContext {
    identity: Option<Identity>,
}

impl SecurityContext {
    /// Creates an anonymous context.
    pub const fn anonymous() -> Self {
        Self { identity: None }
    }

    /// Creates a context already holding `identity`.
    pub const fn authenticated(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
        }
    }

    /// Attaches `identity`, replacing any previous one.
    pub fn authenticate(&mut self, identity: Identity) {
        self.identity = Some(identity);
    }

    /// Returns the authenticated identity, if any.
    pub const fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Returns `true` if an identity is attached.
    pub const fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    /// Removes the identity, returning it.
    pub fn clear(&mut self) -> Option<Identity> {
        self.identity.take()
    }
}
