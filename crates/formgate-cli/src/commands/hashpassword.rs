//! The `hashpassword` management command.
//!
//! Prints the encoded hash of a password, ready to paste into a `[[users]]`
//! entry of the settings file.

use async_trait::async_trait;
use formgate_auth::hashers::hasher_for_name;
use formgate_core::{GateError, Settings};

use crate::command::ManagementCommand;

/// Hashes a password with the configured (or a chosen) hasher.
pub struct HashpasswordCommand;

/// Hashes `password` with the named hasher, falling back to the configured one.
pub async fn hash_password(
    settings: &Settings,
    password: &str,
    hasher: Option<&str>,
    salt_suffix: &str,
) -> Result<String, GateError> {
    let name = hasher.unwrap_or(&settings.password_hasher);
    let hasher = hasher_for_name(name)?;
    if name != "argon2" {
        tracing::warn!(hasher = name, "Hashing with a scheme weaker than Argon2id");
    }
    hasher.hash(password, salt_suffix).await
}

#[async_trait]
impl ManagementCommand for HashpasswordCommand {
    fn name(&self) -> &'static str {
        "hashpassword"
    }

    fn help(&self) -> &'static str {
        "Hash a password for a seeded user"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(
            clap::Arg::new("password")
                .required(true)
                .help("The plaintext password"),
        )
        .arg(
            clap::Arg::new("hasher")
                .long("hasher")
                .value_parser(["argon2", "bcrypt", "salted_md5", "salted_sha256"])
                .help("Override the configured password_hasher"),
        )
        .arg(
            clap::Arg::new("salt-suffix")
                .long("salt-suffix")
                .default_value("")
                .help("Suffix appended before hashing (legacy hashers only)"),
        )
    }

    async fn handle(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), GateError> {
        let password = matches
            .get_one::<String>("password")
            .ok_or_else(|| GateError::ConfigurationError("password is required".to_string()))?;
        let hasher = matches.get_one::<String>("hasher").map(String::as_str);
        let salt_suffix = matches
            .get_one::<String>("salt-suffix")
            .map_or("", String::as_str);

        let encoded = hash_password(settings, password, hasher, salt_suffix).await?;
        println!("{encoded}");
        Ok(())
    }
}
