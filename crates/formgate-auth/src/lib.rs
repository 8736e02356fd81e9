//! # formgate-auth
//!
//! Form-login authentication and path authorization, independent of any web
//! framework.
//!
//! - **User records and identities** (`user`)
//! - **User record store** behind a trait, with an in-memory implementation (`store`)
//! - **Password hashing** with Argon2, bcrypt and the legacy salted SHA-256 scheme (`hashers`)
//! - **Credential verification** (`verifier`)
//! - **Path authorization** with ordered Ant-style rules (`access`)
//! - **Verification-code challenge** on login submissions (`challenge`)
//! - **Remember-me tokens** with series rotation and theft detection (`remember_me`)
//! - **Request model and explicit security context** (`request`, `context`)
//! - **Result handlers and the security chain** tying it together (`handlers`, `chain`)
//!
//! ## Design Principles
//!
//! CPU-bound hashing runs via `tokio::task::spawn_blocking`. No decision reads
//! global state: the current identity travels on the request's
//! [`SecurityContext`], and every trait is `Send + Sync`.

pub mod access;
pub mod chain;
pub mod challenge;
pub mod context;
pub mod handlers;
pub mod hashers;
pub mod remember_me;
pub mod request;
pub mod store;
pub mod user;
pub mod verifier;

// Re-exports for convenience
pub use access::{AccessPolicy, AccessRule, Decision, PathPattern};
pub use chain::{ChainResponse, CookieDirective, SecurityChain};
pub use challenge::ChallengeFilter;
pub use context::SecurityContext;
pub use handlers::{LoginHandlers, Outcome, PageError};
pub use hashers::{check_password, make_password, PasswordHasher};
pub use remember_me::{
    InMemoryTokenRepository, PersistentRememberMe, ResolvedSession, SessionIssuer,
    TokenRepository,
};
pub use request::AuthRequest;
pub use store::{InMemoryUserStore, UserStore};
pub use user::{Authority, Credentials, Identity, UserRecord};
pub use verifier::{StoreVerifier, Verifier};
