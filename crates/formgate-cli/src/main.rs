//! The `formgate` management binary.

use std::path::Path;

use formgate_cli::commands::register_builtin_commands;
use formgate_cli::{load_settings, CommandRegistry, SETTINGS_ARG};
use formgate_core::logging::setup_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut registry = CommandRegistry::new();
    register_builtin_commands(&mut registry);

    let matches = registry.build_cli().get_matches();
    let settings = load_settings(matches.get_one::<String>(SETTINGS_ARG).map(Path::new))?;
    setup_logging(&settings);

    registry.execute(&matches, &settings).await?;
    Ok(())
}
