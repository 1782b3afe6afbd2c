//! Configuration types.
//!
//! Every struct implements [`Default`] with the same values as the embedded
//! `defaults.toml`, so a bare `[section]` header produces a working
//! configuration.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Recording switches and eligibility lists.
    pub audit: AuditSection,
    /// Logging level, format, and per-crate directives.
    pub logging: LoggingSection,
}

// ---------------------------------------------------------------------------
// AuditSection
// ---------------------------------------------------------------------------

/// Recording behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditSection {
    /// Record exceptions as events.
    pub record_exceptions: bool,
    /// Leave insert records without a data payload.
    pub skip_insert_data: bool,
    /// Entity types that are never audited.
    pub excluded_types: Vec<String>,
    /// Fields that are never audited, each written `Type.field`.
    pub excluded_fields: Vec<String>,
    /// Error kinds discarded by the exception recorder.
    pub suppressed_error_kinds: Vec<String>,
}

impl Default for AuditSection {
    fn default() -> Self {
        Self {
            record_exceptions: true,
            skip_insert_data: true,
            excluded_types: Vec::new(),
            excluded_fields: Vec::new(),
            suppressed_error_kinds: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging and tracing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"` or `"json"`.
    pub format: String,
    /// Per-crate tracing directives (e.g. `["chronicle_audit=debug"]`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_sections_use_defaults() {
        let config: Config = toml::from_str("[audit]\n[logging]\n").unwrap();
        assert_eq!(config, Config::default());
    }
}
