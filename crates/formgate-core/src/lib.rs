//! # formgate-core
//!
//! Core types shared by every formgate crate. This crate has no dependency on
//! the authentication machinery and provides the foundation for it.
//!
//! ## Modules
//!
//! - [`error`] - Error types and result aliases
//! - [`settings`] - Login, challenge, remember-me and access configuration
//! - [`settings_loader`] - Loading settings from TOML/JSON and the environment
//! - [`logging`] - Tracing-based logging integration

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;

// Re-export the most commonly used types at the crate root.
pub use error::{GateError, GateResult};
pub use settings::{DefaultPolicy, Settings};
