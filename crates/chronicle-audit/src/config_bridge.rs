//! Bridge from `chronicle_config::Config` to recorder types.
//!
//! The config crate has no dependencies on other chronicle crates, so the
//! conversion lives here and only compiles with the `config` feature.

use chronicle_config::{AuditSection, Config};

use crate::error::AuditResult;
use crate::policy::ConfigPolicy;
use crate::recorder::RecorderOptions;

/// Convert the `[audit]` section to [`RecorderOptions`].
#[must_use]
pub fn to_recorder_options(section: &AuditSection) -> RecorderOptions {
    RecorderOptions {
        record_exceptions: section.record_exceptions,
        skip_insert_data: section.skip_insert_data,
        suppressed_error_kinds: section.suppressed_error_kinds.clone(),
    }
}

/// Convert the `[audit]` exclusion lists to a [`ConfigPolicy`].
///
/// # Errors
///
/// Returns [`AuditError::InvalidArgument`](crate::AuditError::InvalidArgument)
/// for a malformed `Type.field` entry. Validated configs never contain one.
pub fn to_policy(section: &AuditSection) -> AuditResult<ConfigPolicy> {
    ConfigPolicy::from_lists(
        section.excluded_types.iter().cloned(),
        section.excluded_fields.iter(),
    )
}

/// Convert a whole config into recorder options and an eligibility policy.
///
/// # Errors
///
/// See [`to_policy`].
pub fn from_config(cfg: &Config) -> AuditResult<(RecorderOptions, ConfigPolicy)> {
    Ok((to_recorder_options(&cfg.audit), to_policy(&cfg.audit)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::EligibilityPolicy;

    #[test]
    fn test_defaults_match() {
        let options = to_recorder_options(&AuditSection::default());
        assert_eq!(options, RecorderOptions::default());
    }

    #[test]
    fn test_from_config() {
        let cfg = Config::from_toml_str(
            r#"
            [audit]
            record_exceptions = false
            excluded_types = ["auth.SessionToken"]
            suppressed_error_kinds = ["Timeout"]
        "#,
        )
        .unwrap();

        let (options, policy) = from_config(&cfg).unwrap();

        assert!(!options.record_exceptions);
        assert_eq!(options.suppressed_error_kinds, vec!["Timeout"]);
        assert!(!policy.should_log_type("auth.SessionToken"));
        assert!(policy.should_log_type("crm.Customer"));
    }

    #[test]
    fn test_malformed_field_entry() {
        let section = AuditSection {
            excluded_fields: vec!["nodot".to_owned()],
            ..AuditSection::default()
        };
        assert!(to_policy(&section).is_err());
    }
}
