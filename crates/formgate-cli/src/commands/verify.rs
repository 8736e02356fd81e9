//! The `verify` management command.
//!
//! Checks a username and password against the users seeded in the settings,
//! exactly as a login submission would (minus the verification code).

use std::sync::Arc;

use async_trait::async_trait;
use formgate_auth::{Credentials, Identity, InMemoryUserStore, StoreVerifier, Verifier};
use formgate_core::{GateError, Settings};

use crate::command::ManagementCommand;

/// Verifies credentials against the seeded users.
pub struct VerifyCommand;

/// The outcome of a successful `verify`.
#[derive(Debug)]
pub struct Verification {
    /// The authenticated identity.
    pub identity: Identity,
    /// Whether the stored hash should be replaced by an Argon2id hash.
    pub must_upgrade: bool,
}

/// Verifies `username` and `password` against `settings.users`.
pub async fn verify_credentials(
    settings: &Settings,
    username: &str,
    password: &str,
) -> Result<Verification, GateError> {
    let store = InMemoryUserStore::from_seeds(&settings.users)?;
    let verifier = StoreVerifier::new(Arc::new(store));
    let identity = verifier
        .verify(&Credentials::new(username, password))
        .await?;
    let must_upgrade = StoreVerifier::must_upgrade(identity.principal());
    Ok(Verification {
        identity,
        must_upgrade,
    })
}

#[async_trait]
impl ManagementCommand for VerifyCommand {
    fn name(&self) -> &'static str {
        "verify"
    }

    fn help(&self) -> &'static str {
        "Verify a username and password against the seeded users"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(clap::Arg::new("username").required(true))
            .arg(clap::Arg::new("password").required(true))
    }

    async fn handle(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), GateError> {
        let username = matches.get_one::<String>("username").map_or("", String::as_str);
        let password = matches.get_one::<String>("password").map_or("", String::as_str);

        let verification = verify_credentials(settings, username, password).await?;
        let authorities: Vec<&str> = verification
            .identity
            .authorities()
            .iter()
            .map(String::as_str)
            .collect();
        println!(
            "Verified {} [{}]",
            verification.identity.username(),
            authorities.join(", ")
        );
        if verification.must_upgrade {
            println!("Note: stored hash uses a legacy scheme; rehash with `formgate hashpassword`");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use formgate_auth::hashers::SaltedSha256Hasher;
    use formgate_core::settings::UserSeed;

    use super::*;

    fn settings() -> Settings {
        Settings {
            users: vec![UserSeed {
                username: "alice".to_string(),
                password_hash: SaltedSha256Hasher::digest("secret", "xyz"),
                salt_suffix: "xyz".to_string(),
                authorities: vec!["USER".to_string()],
            }],
            ..Settings::default()
        }
    }

    #[tokio::test]
    async fn test_verify_success() {
        let verification = verify_credentials(&settings(), "alice", "secret")
            .await
            .unwrap();
        assert_eq!(verification.identity.username(), "alice");
        assert!(verification.identity.has_authority("USER"));
        assert!(verification.must_upgrade);
    }

    #[tokio::test]
    async fn test_verify_failures() {
        assert!(matches!(
            verify_credentials(&settings(), "alice", "nope").await,
            Err(GateError::BadCredentials)
        ));
        assert!(matches!(
            verify_credentials(&settings(), "bob", "secret").await,
            Err(GateError::UnknownUser(_))
        ));
    }

    #[tokio::test]
    async fn test_verify_rejects_bad_seed() {
        let mut settings = settings();
        settings.users[0].authorities = vec!["WIZARD".to_string()];
        assert!(matches!(
            verify_credentials(&settings, "alice", "secret").await,
            Err(GateError::ConfigurationError(_))
        ));
    }
}
