//! The `authorize` management command.
//!
//! Dry-runs the access policy: which decision would a caller holding the
//! given authorities get for a path, and which rule makes it.

use std::collections::BTreeSet;

use async_trait::async_trait;
use formgate_auth::{AccessPolicy, Authority, Decision};
use formgate_core::{GateError, Settings};
use serde::Serialize;

use crate::command::ManagementCommand;

/// Evaluates the configured access rules for one path.
pub struct AuthorizeCommand;

/// The result of a dry run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizeReport {
    /// The evaluated path.
    pub path: String,
    /// `true` if the request would be allowed.
    pub allowed: bool,
    /// Why the decision was reached.
    pub reason: String,
}

/// Evaluates `path` for a caller holding `authorities`.
/// An empty list is evaluated as an anonymous caller.
pub fn dry_run(
    settings: &Settings,
    path: &str,
    authorities: &[String],
) -> Result<AuthorizeReport, GateError> {
    let policy = AccessPolicy::from_settings(&settings.access)?;
    let granted = authorities
        .iter()
        .map(|a| a.parse::<Authority>().map(|a| a.as_str().to_string()))
        .collect::<Result<BTreeSet<String>, _>>()?;
    let granted = (!granted.is_empty()).then_some(&granted);

    let flow_page = path == settings.login.login_page || path == settings.login.denied_page;

    let decision = policy.evaluate(path, granted);
    let reason = if policy.is_ignored(path) {
        "ignored path".to_string()
    } else if flow_page {
        "login flow page".to_string()
    } else if let Some(rule) = policy.matching_rule(path) {
        let required: Vec<&str> = rule
            .required_authorities()
            .iter()
            .map(String::as_str)
            .collect();
        if required.is_empty() {
            format!("rule {} permits everyone", rule.pattern().as_str())
        } else {
            format!(
                "rule {} requires any of [{}]",
                rule.pattern().as_str(),
                required.join(", ")
            )
        }
    } else {
        format!("no rule matched; default policy {:?}", policy.default_policy()).to_lowercase()
    };

    Ok(AuthorizeReport {
        path: path.to_string(),
        allowed: flow_page || decision == Decision::Allow,
        reason,
    })
}

#[async_trait]
impl ManagementCommand for AuthorizeCommand {
    fn name(&self) -> &'static str {
        "authorize"
    }

    fn help(&self) -> &'static str {
        "Show the access decision for a path"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(clap::Arg::new("path").required(true).help("Request path, e.g. /admin"))
            .arg(
                clap::Arg::new("authority")
                    .long("authority")
                    .short('a')
                    .action(clap::ArgAction::Append)
                    .help("An authority the caller holds (repeatable); none means anonymous"),
            )
            .arg(
                clap::Arg::new("json")
                    .long("json")
                    .action(clap::ArgAction::SetTrue)
                    .help("Print the report as JSON"),
            )
    }

    async fn handle(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), GateError> {
        let path = matches.get_one::<String>("path").map_or("/", String::as_str);
        let authorities: Vec<String> = matches
            .get_many::<String>("authority")
            .map(|values| values.cloned().collect())
            .unwrap_or_default();

        let report = dry_run(settings, path, &authorities)?;
        if matches.get_flag("json") {
            let json = serde_json::to_string_pretty(&report)
                .map_err(|e| GateError::SerializationError(e.to_string()))?;
            println!("{json}");
        } else {
            let verdict = if report.allowed { "ALLOW" } else { "DENY" };
            println!("{verdict} {} ({})", report.path, report.reason);
        }
        Ok(())
    }
}
