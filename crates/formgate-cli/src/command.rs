//! Management command framework for formgate.
//!
//! [`ManagementCommand`] defines one CLI subcommand and [`CommandRegistry`]
//! collects them into the `formgate` binary.
//!
//! ## Defining a Custom Command
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use formgate_cli::command::ManagementCommand;
//! use formgate_core::{GateError, Settings};
//!
//! struct UsersCommand;
//!
//! #[async_trait]
//! impl ManagementCommand for UsersCommand {
//!     fn name(&self) -> &str { "users" }
//!     fn help(&self) -> &str { "List seeded users" }
//!
//!     async fn handle(
//!         &self,
//!         _matches: &clap::ArgMatches,
//!         settings: &Settings,
//!     ) -> Result<(), GateError> {
//!         for user in &settings.users {
//!             println!("{}", user.username);
//!         }
//!         Ok(())
//!     }
//! }
//! ```

use std::collections::BTreeMap;

use async_trait::async_trait;
use formgate_core::{GateError, Settings};

/// The global option naming the settings file.
pub const SETTINGS_ARG: &str = "settings";

/// One `formgate` subcommand.
#[async_trait]
pub trait ManagementCommand: Send + Sync {
    /// The subcommand name typed on the command line.
    fn name(&self) -> &str;

    /// One line shown in `formgate --help`.
    fn help(&self) -> &str;

    /// Declares the subcommand's own arguments. Defaults to none.
    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd
    }

    /// Runs the subcommand against the loaded settings.
    async fn handle(&self, matches: &clap::ArgMatches, settings: &Settings)
        -> Result<(), GateError>;
}

/// The subcommands of the `formgate` binary, kept in name order.
#[derive(Default)]
pub struct CommandRegistry {
    commands: BTreeMap<&'static str, Box<dyn ManagementCommand>>,
}

impl CommandRegistry {
    /// Creates a registry with no commands.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `command`. A later command with the same name wins.
    pub fn register(&mut self, command: Box<dyn ManagementCommand>) {
        // clap subcommand names are &'static str; each distinct name leaks once.
        let name: &'static str = match self.commands.get_key_value(command.name()) {
            Some((&name, _)) => name,
            None => Box::leak(command.name().to_string().into_boxed_str()),
        };
        self.commands.insert(name, command);
    }

    /// Looks a command up by name.
    pub fn get(&self, name: &str) -> Option<&dyn ManagementCommand> {
        self.commands.get(name).map(AsRef::as_ref)
    }

    /// The registered names in alphabetical order.
    pub fn list_commands(&self) -> Vec<&str> {
        self.commands.keys().copied().collect()
    }

    /// How many commands are registered.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// `true` when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Assembles the `formgate` clap command: the global `--settings` option
    /// plus one subcommand per registered command.
    pub fn build_cli(&self) -> clap::Command {
        let app = clap::Command::new("formgate")
            .about("formgate management utility")
            .subcommand_required(true)
            .arg(
                clap::Arg::new(SETTINGS_ARG)
                    .long(SETTINGS_ARG)
                    .short('s')
                    .global(true)
                    .value_name("FILE")
                    .help("Settings file (.toml or .json); FORMGATE_* variables still apply"),
            );

        self.commands.iter().fold(app, |app, (name, cmd)| {
            let subcmd = clap::Command::new(*name).about(cmd.help().to_string());
            app.subcommand(cmd.add_arguments(subcmd))
        })
    }

    /// Dispatches to the subcommand selected in `matches`.
    pub async fn execute(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), GateError> {
        let Some((name, sub_matches)) = matches.subcommand() else {
            return Err(GateError::ConfigurationError(
                "No subcommand specified".to_string(),
            ));
        };
        let Some(cmd) = self.get(name) else {
            return Err(GateError::ConfigurationError(format!(
                "Unknown command: {name}"
            )));
        };
        cmd.handle(sub_matches, settings).await
    }
}
