//! # formgate
//!
//! Form-login authentication and path authorization for Rust services.
//!
//! This is the meta-crate that re-exports the sub-crates. Depend on
//! `formgate` to get everything, or on individual crates for finer-grained
//! control.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use formgate::auth::{AuthRequest, InMemoryUserStore, SecurityChain};
//! use formgate::core::Settings;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let chain = SecurityChain::from_settings(
//!     &Settings::default(),
//!     Arc::new(InMemoryUserStore::new()),
//! )
//! .unwrap();
//!
//! let mut request = AuthRequest::new("/admin");
//! let response = chain.handle(&mut request).await;
//! assert!(!response.is_proceed());
//! # }
//! ```

/// Error types, settings and logging.
pub use formgate_core as core;

/// Verification, remember-me tokens, access rules and the security chain.
#[cfg(feature = "auth")]
pub use formgate_auth as auth;

/// Management commands (CLI).
#[cfg(feature = "cli")]
pub use formgate_cli as cli;

/// Commonly used items in one import.
pub mod prelude {
    pub use formgate_core::{DefaultPolicy, GateError, GateResult, Settings};

    #[cfg(feature = "auth")]
    pub use formgate_auth::{
        AccessPolicy, AuthRequest, Authority, ChainResponse, CookieDirective, Credentials,
        Decision, Identity, InMemoryUserStore, LoginHandlers, Outcome, PageError, SecurityChain,
        SecurityContext, UserRecord, UserStore, Verifier,
    };

    pub use async_trait::async_trait;
}

// Third-party crates the public API is built on.
pub use async_trait;
pub use serde;
pub use tokio;
pub use tracing;
