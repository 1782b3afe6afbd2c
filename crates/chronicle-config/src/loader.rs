//! Configuration loading.
//!
//! Layers, lowest to highest priority:
//!
//! 1. Embedded defaults (`defaults.toml`)
//! 2. `CHRONICLE_*` environment variables, for fields the file leaves unset
//! 3. The config file, when one is given

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

use crate::env::{apply_env_fallbacks, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::merge::deep_merge;
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

const MERGED_SOURCE: &str = "<merged config>";

/// Load configuration from the defaults, the process environment and an
/// optional file.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read or parsed, or the
/// merged configuration fails validation.
pub fn load(path: Option<&Path>) -> ConfigResult<Config> {
    load_with_env(path, &collect_env_vars())
}

/// Like [`load`], with an explicit environment snapshot.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read or parsed, or the
/// merged configuration fails validation.
pub fn load_with_env(path: Option<&Path>, env: &HashMap<String, String>) -> ConfigResult<Config> {
    let mut merged = parse_defaults()?;

    let overlay = match path {
        Some(path) => {
            let value = read_file(path)?;
            info!(path = %path.display(), "loaded config file");
            Some(value)
        },
        None => None,
    };
    if let Some(overlay) = &overlay {
        deep_merge(&mut merged, overlay);
    }

    let applied = apply_env_fallbacks(&mut merged, overlay.as_ref(), env)?;
    if applied > 0 {
        debug!(applied, "applied environment fallbacks");
    }

    finish(merged)
}

/// Parse configuration from an in-memory TOML document layered over the
/// defaults. The environment is not consulted.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the document is malformed or fails
/// validation.
pub fn load_str(content: &str) -> ConfigResult<Config> {
    let overlay: toml::Value = toml::from_str(content).map_err(|e| ConfigError::ParseError {
        path: "<string>".to_owned(),
        source: e,
    })?;
    let mut merged = parse_defaults()?;
    deep_merge(&mut merged, &overlay);
    finish(merged)
}

fn parse_defaults() -> ConfigResult<toml::Value> {
    toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
        path: "<embedded defaults>".to_owned(),
        source: e,
    })
}

fn finish(merged: toml::Value) -> ConfigResult<Config> {
    let config: Config = merged.try_into().map_err(|e| ConfigError::ParseError {
        path: MERGED_SOURCE.to_owned(),
        source: e,
    })?;
    validate::validate(&config)?;
    Ok(config)
}

fn oversized(path: &Path, len: u64) -> ConfigError {
    ConfigError::ValidationError {
        field: path.display().to_string(),
        message: format!(
            "config file is {len} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit"
        ),
    }
}

/// Read and parse a config file.
fn read_file(path: &Path) -> ConfigResult<toml::Value> {
    // Check file size before reading to prevent OOM.
    let metadata = std::fs::metadata(path).map_err(|e| ConfigError::ReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    if metadata.len() > MAX_CONFIG_FILE_SIZE {
        return Err(oversized(path, metadata.len()));
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    // The file may have grown between stat and read.
    if content.len() as u64 > MAX_CONFIG_FILE_SIZE {
        return Err(oversized(path, content.len() as u64));
    }

    toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env() -> HashMap<String, String> {
        HashMap::new()
    }

    fn write(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("chronicle.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_defaults_deserialize_to_config() {
        let value = parse_defaults().unwrap();
        let config: Config = value.try_into().unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_without_file() {
        let config = load_with_env(None, &no_env()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            r#"
            [audit]
            skip_insert_data = false
            excluded_types = ["auth.SessionToken"]
            excluded_fields = ["crm.Customer.password_hash"]

            [logging]
            format = "json"
        "#,
        );

        let config = load_with_env(Some(&path), &no_env()).unwrap();

        assert!(!config.audit.skip_insert_data);
        assert!(config.audit.record_exceptions);
        assert_eq!(config.audit.excluded_types, vec!["auth.SessionToken"]);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let err = load_with_env(Some(&path), &no_env()).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn test_file_beats_environment() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "[logging]\nlevel = \"warn\"\n");
        let env: HashMap<String, String> = [
            ("CHRONICLE_LOG_LEVEL".to_owned(), "trace".to_owned()),
            ("CHRONICLE_RECORD_EXCEPTIONS".to_owned(), "false".to_owned()),
        ]
        .into_iter()
        .collect();

        let config = load_with_env(Some(&path), &env).unwrap();

        assert_eq!(config.logging.level, "warn");
        assert!(!config.audit.record_exceptions);
    }

    #[test]
    fn test_invalid_environment_value_fails_validation() {
        let env: HashMap<String, String> = [("CHRONICLE_LOG_FORMAT".to_owned(), "xml".to_owned())]
            .into_iter()
            .collect();
        let err = load_with_env(None, &env).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { ref field, .. } if field == "logging.format"));
    }

    #[test]
    fn test_wrong_value_type_is_a_parse_error() {
        let err = load_str("[audit]\nrecord_exceptions = \"maybe\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { ref path, .. } if path == MERGED_SOURCE));
    }

    #[test]
    fn test_malformed_toml_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "[audit\n");
        let err = load_with_env(Some(&path), &no_env()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_oversized_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let data = "x = \"".to_owned() + &"a".repeat(1_100_000) + "\"";
        let path = write(&dir, &data);

        let result = read_file(&path);
        assert!(
            matches!(result, Err(ConfigError::ValidationError { .. })),
            "Expected ValidationError for oversized config, got: {result:?}"
        );
    }

    #[test]
    fn test_oversized_config_rejected_before_reading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sparse.toml");
        // Sparse file: past the limit, but all NUL bytes if it were read.
        let oversize = MAX_CONFIG_FILE_SIZE.saturating_add(1);
        let file = std::fs::File::create(&path).unwrap();
        file.set_len(oversize).unwrap();

        let err = load_with_env(Some(&path), &no_env()).unwrap_err();
        match err {
            ConfigError::ValidationError { field, message } => {
                assert_eq!(field, path.display().to_string());
                assert!(message.contains(&oversize.to_string()));
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_file_at_limit_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let mut body = "[logging]\nlevel = \"debug\"\n".to_owned();
        let padding = usize::try_from(MAX_CONFIG_FILE_SIZE)
            .unwrap()
            .saturating_sub(body.len())
            .saturating_sub(2);
        body.push('#');
        body.push_str(&"x".repeat(padding));
        body.push('\n');
        assert_eq!(body.len() as u64, MAX_CONFIG_FILE_SIZE);
        let path = write(&dir, &body);

        let config = load_with_env(Some(&path), &no_env()).unwrap();
        assert_eq!(config.logging.level, "debug");
    }
}
