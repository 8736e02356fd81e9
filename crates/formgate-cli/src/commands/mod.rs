//! Built-in management commands.
//!
//! Each command implements the
//! [`ManagementCommand`](crate::command::ManagementCommand) trait.

pub mod authorize;
pub mod check;
pub mod hashpassword;
pub mod verify;

pub use authorize::AuthorizeCommand;
pub use check::CheckCommand;
pub use hashpassword::HashpasswordCommand;
pub use verify::VerifyCommand;

use crate::command::CommandRegistry;

/// Registers all built-in management commands into the given registry.
pub fn register_builtin_commands(registry: &mut CommandRegistry) {
    registry.register(Box::new(HashpasswordCommand));
    registry.register(Box::new(VerifyCommand));
    registry.register(Box::new(AuthorizeCommand));
    registry.register(Box::new(CheckCommand));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_builtin_commands() {
        let mut registry = CommandRegistry::new();
        register_builtin_commands(&mut registry);
        assert_eq!(
            registry.list_commands(),
            vec!["authorize", "check", "hashpassword", "verify"]
        );
    }
}
