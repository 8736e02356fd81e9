//! Settings loading from configuration files.
//!
//! ## Loading Order
//!
//! 1. Start with default settings.
//! 2. Load from a TOML or JSON file (deep-merged over the defaults).
//! 3. Apply environment variable overrides (highest priority).
//!
//! ## Environment Variable Mapping
//!
//! | Env Var | Setting |
//! |---|---|
//! | `FORMGATE_SECRET_KEY` | `secret_key` |
//! | `FORMGATE_DEBUG` | `debug` |
//! | `FORMGATE_LOG_LEVEL` | `log_level` |
//! | `FORMGATE_PASSWORD_HASHER` | `password_hasher` |
//! | `FORMGATE_CHALLENGE_CODE` | `challenge.expected` |
//! | `FORMGATE_REMEMBER_ME_VALIDITY` | `remember_me.validity_seconds` |
//! | `FORMGATE_DEFAULT_POLICY` | `access.default_policy` (`allow`/`deny`) |
//!
//! ## Examples
//!
//! ```rust,no_run
//! use formgate_core::settings_loader;
//!
//! let settings = settings_loader::from_toml_file_with_env("formgate.toml").unwrap();
//! ```

use std::path::Path;

use crate::error::GateError;
use crate::settings::{DefaultPolicy, Settings};

/// Loads settings from a TOML string.
///
/// Any fields not present in the TOML keep their default values. Arrays
/// (such as `access.rules`) replace the default array as a whole.
pub fn from_toml_str(toml_str: &str) -> Result<Settings, GateError> {
    let toml_value: toml::Value = toml::from_str(toml_str)
        .map_err(|e| GateError::ConfigurationError(format!("Failed to parse TOML: {e}")))?;
    merge_over_defaults(toml_to_json(toml_value), "TOML")
}

/// Loads settings from a TOML file.
pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Settings, GateError> {
    let content = read_config(path.as_ref(), "TOML")?;
    from_toml_str(&content)
}

/// Loads settings from a TOML file and then applies environment variable overrides.
pub fn from_toml_file_with_env(path: impl AsRef<Path>) -> Result<Settings, GateError> {
    let mut settings = from_toml_file(path)?;
    apply_env_overrides(&mut settings)?;
    Ok(settings)
}

/// Loads settings from a JSON string.
pub fn from_json_str(json_str: &str) -> Result<Settings, GateError> {
    let json_value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| GateError::ConfigurationError(format!("Failed to parse JSON: {e}")))?;
    merge_over_defaults(json_value, "JSON")
}

/// Loads settings from a JSON file.
pub fn from_json_file(path: impl AsRef<Path>) -> Result<Settings, GateError> {
    let content = read_config(path.as_ref(), "JSON")?;
    from_json_str(&content)
}

/// Loads settings from a file, choosing the format from its extension
/// (`.json` is JSON, anything else TOML), then applies environment overrides.
pub fn from_file_with_env(path: impl AsRef<Path>) -> Result<Settings, GateError> {
    let path = path.as_ref();
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let mut settings = if is_json {
        from_json_file(path)?
    } else {
        from_toml_file(path)?
    };
    apply_env_overrides(&mut settings)?;
    Ok(settings)
}

/// Loads settings from just environment variables (starting from defaults).
pub fn from_env() -> Result<Settings, GateError> {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings)?;
    Ok(settings)
}

/// Applies `FORMGATE_*` environment variable overrides to a settings struct.
///
/// Numeric and enum values that do not parse are reported as
/// configuration errors rather than silently ignored.
pub fn apply_env_overrides(settings: &mut Settings) -> Result<(), GateError> {
    apply_overrides(settings, |key| std::env::var(key).ok())
}

fn apply_overrides(
    settings: &mut Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), GateError> {
    if let Some(val) = lookup("FORMGATE_SECRET_KEY") {
        settings.secret_key = val;
    }

    if let Some(val) = lookup("FORMGATE_DEBUG") {
        settings.debug = matches!(val.to_lowercase().as_str(), "true" | "1" | "yes");
    }

    if let Some(val) = lookup("FORMGATE_LOG_LEVEL") {
        settings.log_level = val;
    }

    if let Some(val) = lookup("FORMGATE_PASSWORD_HASHER") {
        settings.password_hasher = val;
    }

    if let Some(val) = lookup("FORMGATE_CHALLENGE_CODE") {
        settings.challenge.expected = val;
    }

    if let Some(val) = lookup("FORMGATE_REMEMBER_ME_VALIDITY") {
        settings.remember_me.validity_seconds = val.trim().parse().map_err(|_| {
            GateError::ConfigurationError(format!(
                "FORMGATE_REMEMBER_ME_VALIDITY must be a number of seconds, got '{val}'"
            ))
        })?;
    }

    if let Some(val) = lookup("FORMGATE_DEFAULT_POLICY") {
        settings.access.default_policy = match val.trim().to_lowercase().as_str() {
            "allow" => DefaultPolicy::Allow,
            "deny" => DefaultPolicy::Deny,
            other => {
                return Err(GateError::ConfigurationError(format!(
                    "FORMGATE_DEFAULT_POLICY must be 'allow' or 'deny', got '{other}'"
                )))
            }
        };
    }

    Ok(())
}

// ============================================================
// Helpers
// ============================================================

fn read_config(path: &Path, format: &str) -> Result<String, GateError> {
    std::fs::read_to_string(path).map_err(|e| {
        GateError::ConfigurationError(format!(
            "Failed to read {format} file '{}': {e}",
            path.display()
        ))
    })
}

fn merge_over_defaults(value: serde_json::Value, format: &str) -> Result<Settings, GateError> {
    let default_json = serde_json::to_value(Settings::default()).map_err(|e| {
        GateError::ConfigurationError(format!("Failed to serialize default settings: {e}"))
    })?;

    let merged = merge_json(default_json, value);
    serde_json::from_value(merged).map_err(|e| {
        GateError::ConfigurationError(format!("Failed to deserialize settings from {format}: {e}"))
    })
}

/// Converts a TOML value to a `serde_json::Value`.
fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::json!(i),
        toml::Value::Float(f) => serde_json::json!(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => {
            let map: serde_json::Map<String, serde_json::Value> = table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect();
            serde_json::Value::Object(map)
        }
    }
}

/// Deep-merges two JSON values. The `override_val` takes precedence.
fn merge_json(base: serde_json::Value, override_val: serde_json::Value) -> serde_json::Value {
    match (base, override_val) {
        (serde_json::Value::Object(mut base_map), serde_json::Value::Object(override_map)) => {
            for (key, override_v) in override_map {
                let merged = if let Some(base_v) = base_map.remove(&key) {
                    merge_json(base_v, override_v)
                } else {
                    override_v
                };
                base_map.insert(key, merged);
            }
            serde_json::Value::Object(base_map)
        }
        (_, override_val) => override_val,
    }
}
