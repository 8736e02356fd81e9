//! # formgate-cli
//!
//! Management commands for formgate deployments.
//!
//! - **Management commands** - A framework for defining and registering CLI
//!   commands (`command`)
//! - **Built-in commands** - `hashpassword`, `verify`, `authorize` and `check`
//!   (`commands`)
//!
//! ## Quick Start
//!
//! ```rust
//! use formgate_cli::command::CommandRegistry;
//! use formgate_cli::commands::register_builtin_commands;
//!
//! let mut registry = CommandRegistry::new();
//! register_builtin_commands(&mut registry);
//!
//! let names = registry.list_commands();
//! assert!(names.contains(&"hashpassword"));
//! assert!(names.contains(&"check"));
//! ```

// These clippy lints are intentionally allowed:
// - print_stdout: command output is the product of the binary
// - unused_async: command handlers keep one async signature
#![allow(clippy::print_stdout)]
#![allow(clippy::unused_async)]

pub mod command;
pub mod commands;

use std::path::Path;

pub use command::{CommandRegistry, ManagementCommand, SETTINGS_ARG};

use formgate_core::{settings_loader, GateError, Settings};

/// Loads settings from `path` (TOML or JSON) or, without a path, from the
/// defaults. `FORMGATE_*` environment overrides apply either way.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, GateError> {
    match path {
        Some(path) => settings_loader::from_file_with_env(path),
        None => settings_loader::from_env(),
    }
}
