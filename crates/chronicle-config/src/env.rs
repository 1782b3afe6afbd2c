//! Environment variable fallbacks.
//!
//! `CHRONICLE_*` variables only fill in values that no config file set, so
//! an explicit file always wins over the environment.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// Prefix of every variable this crate reads.
pub const ENV_PREFIX: &str = "CHRONICLE_";

#[derive(Debug, Clone, Copy)]
enum EnvKind {
    Bool,
    Text,
}

/// Variable name, dotted config path, value kind.
const ENV_FIELDS: &[(&str, &str, EnvKind)] = &[
    (
        "CHRONICLE_RECORD_EXCEPTIONS",
        "audit.record_exceptions",
        EnvKind::Bool,
    ),
    (
        "CHRONICLE_SKIP_INSERT_DATA",
        "audit.skip_insert_data",
        EnvKind::Bool,
    ),
    ("CHRONICLE_LOG_LEVEL", "logging.level", EnvKind::Text),
    ("CHRONICLE_LOG_FORMAT", "logging.format", EnvKind::Text),
];

/// Snapshot every `CHRONICLE_*` variable of the current process.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(key, _)| key.starts_with(ENV_PREFIX))
        .collect()
}

/// Fill unset fields of `merged` from `env`. A field counts as set when the
/// file `overlay` provides it. Returns how many fields were filled.
///
/// # Errors
///
/// Returns [`ConfigError::ValidationError`] if a boolean variable holds
/// something other than a recognised boolean.
pub fn apply_env_fallbacks(
    merged: &mut toml::Value,
    overlay: Option<&toml::Value>,
    env: &HashMap<String, String>,
) -> ConfigResult<usize> {
    let mut applied = 0_usize;

    for (var, path, kind) in ENV_FIELDS {
        let Some(raw) = env.get(*var) else {
            continue;
        };
        if overlay.is_some_and(|o| lookup(o, path).is_some()) {
            debug!(var, path, "config file sets this field, ignoring environment");
            continue;
        }

        let value = match kind {
            EnvKind::Bool => toml::Value::Boolean(parse_bool(var, raw)?),
            EnvKind::Text => toml::Value::String(raw.trim().to_owned()),
        };
        if assign(merged, path, value) {
            applied = applied.saturating_add(1);
        }
    }

    Ok(applied)
}

fn parse_bool(var: &str, raw: &str) -> ConfigResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::ValidationError {
            field: var.to_owned(),
            message: format!("'{raw}' is not a boolean"),
        }),
    }
}

fn lookup<'a>(value: &'a toml::Value, path: &str) -> Option<&'a toml::Value> {
    path.split('.').try_fold(value, |node, key| node.get(key))
}

/// Set `path` inside `root`, creating intermediate tables. Returns `false`
/// if a non-table value sits on the way.
fn assign(root: &mut toml::Value, path: &str, value: toml::Value) -> bool {
    let mut node = root;
    let mut keys = path.split('.').peekable();
    while let Some(key) = keys.next() {
        let Some(table) = node.as_table_mut() else {
            return false;
        };
        if keys.peek().is_none() {
            table.insert(key.to_owned(), value);
            return true;
        }
        node = table
            .entry(key)
            .or_insert(toml::Value::Table(toml::map::Map::new()));
    }
    false
}
