//! Post-merge configuration validation.
//!
//! Validates that deserialized [`Config`](crate::Config) values are
//! recognised and well-formed.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Accepted `logging.level` values.
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Accepted `logging.format` values.
pub const LOG_FORMATS: [&str; 3] = ["pretty", "compact", "json"];

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_audit(config)?;
    validate_logging(config)?;
    Ok(())
}

fn validate_audit(config: &Config) -> ConfigResult<()> {
    let audit = &config.audit;

    if let Some(blank) = audit.excluded_types.iter().find(|t| t.trim().is_empty()) {
        return Err(ConfigError::ValidationError {
            field: "audit.excluded_types".to_owned(),
            message: format!("type name '{blank}' is empty"),
        });
    }

    for entry in &audit.excluded_fields {
        let well_formed = entry
            .rsplit_once('.')
            .is_some_and(|(ty, field)| !ty.trim().is_empty() && !field.trim().is_empty());
        if !well_formed {
            return Err(ConfigError::ValidationError {
                field: "audit.excluded_fields".to_owned(),
                message: format!("'{entry}' is not of the form Type.field"),
            });
        }
    }

    if let Some(blank) = audit
        .suppressed_error_kinds
        .iter()
        .find(|k| k.trim().is_empty())
    {
        return Err(ConfigError::ValidationError {
            field: "audit.suppressed_error_kinds".to_owned(),
            message: format!("error kind '{blank}' is empty"),
        });
    }

    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    if !LOG_LEVELS.contains(&config.logging.level.as_str()) {
        return Err(ConfigError::ValidationError {
            field: "logging.level".to_owned(),
            message: format!(
                "unsupported log level '{}'; expected one of: {}",
                config.logging.level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if !LOG_FORMATS.contains(&config.logging.format.as_str()) {
        return Err(ConfigError::ValidationError {
            field: "logging.format".to_owned(),
            message: format!(
                "unsupported log format '{}'; expected one of: {}",
                config.logging.format,
                LOG_FORMATS.join(", ")
            ),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_owned();
        let err = validate(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { ref field, .. } if field == "logging.level"));
    }

    #[test]
    fn test_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "full".to_owned();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_malformed_excluded_fields() {
        for entry in ["password", ".password", "Customer.", "  .x"] {
            let mut config = Config::default();
            config.audit.excluded_fields = vec![entry.to_owned()];
            assert!(validate(&config).is_err(), "accepted {entry:?}");
        }

        let mut config = Config::default();
        config.audit.excluded_fields = vec!["crm.Customer.password_hash".to_owned()];
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_blank_list_entries() {
        let mut config = Config::default();
        config.audit.excluded_types = vec![" ".to_owned()];
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.audit.suppressed_error_kinds = vec![String::new()];
        assert!(validate(&config).is_err());
    }
}
