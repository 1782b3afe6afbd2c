//! Eligibility policy: which types and fields take part in auditing.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::trace;

use crate::error::{AuditError, AuditResult};
use crate::schema::{EntitySchema, FieldDescriptor};

/// Decides whether a type, or one of its fields, is audited.
///
/// Both predicates must be pure: the same input always yields the same answer.
pub trait EligibilityPolicy: Send + Sync {
    /// Whether records are produced for `type_name` at all. Also consulted
    /// with synthetic categories such as `ScheduledTask`.
    fn should_log_type(&self, type_name: &str) -> bool;

    /// Whether `field` of `type_name` may appear in payloads.
    fn should_log_field(&self, type_name: &str, field: &FieldDescriptor) -> bool;
}

/// Policy driven by explicit exclusion lists. Everything else is audited.
#[derive(Debug, Clone, Default)]
pub struct ConfigPolicy {
    excluded_types: HashSet<String>,
    excluded_fields: HashSet<(String, String)>,
}

impl ConfigPolicy {
    /// A policy that audits every type and field.
    #[must_use]
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Build a policy from type names and `Type.field` entries.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::InvalidArgument`] for a field entry that is not
    /// of the form `Type.field`.
    pub fn from_lists<T, F>(excluded_types: T, excluded_fields: F) -> AuditResult<Self>
    where
        T: IntoIterator,
        T::Item: Into<String>,
        F: IntoIterator,
        F::Item: AsRef<str>,
    {
        let mut policy = Self::default();
        for type_name in excluded_types {
            policy = policy.exclude_type(type_name);
        }
        for entry in excluded_fields {
            let entry = entry.as_ref();
            let (type_name, field) = entry
                .rsplit_once('.')
                .filter(|(t, f)| !t.is_empty() && !f.is_empty())
                .ok_or_else(|| {
                    AuditError::invalid_argument(format!(
                        "excluded field '{entry}' must look like Type.field"
                    ))
                })?;
            policy = policy.exclude_field(type_name, field);
        }
        Ok(policy)
    }

    /// Stop auditing `type_name`.
    #[must_use]
    pub fn exclude_type(mut self, type_name: impl Into<String>) -> Self {
        self.excluded_types.insert(type_name.into());
        self
    }

    /// Stop auditing `field` of `type_name`.
    #[must_use]
    pub fn exclude_field(mut self, type_name: impl Into<String>, field: impl Into<String>) -> Self {
        self.excluded_fields.insert((type_name.into(), field.into()));
        self
    }
}

impl EligibilityPolicy for ConfigPolicy {
    fn should_log_type(&self, type_name: &str) -> bool {
        !self.excluded_types.contains(type_name)
    }

    fn should_log_field(&self, type_name: &str, field: &FieldDescriptor) -> bool {
        !self
            .excluded_fields
            .contains(&(type_name.to_owned(), field.name.to_owned()))
    }
}

/// Memoizes type-level answers of an inner policy.
///
/// Safe to populate from concurrent recordings; since the policy is pure,
/// racing writers store the same value.
pub struct EligibilityCache {
    policy: Arc<dyn EligibilityPolicy>,
    types: DashMap<String, bool>,
}

impl EligibilityCache {
    /// Wrap `policy`.
    #[must_use]
    pub fn new(policy: Arc<dyn EligibilityPolicy>) -> Self {
        Self {
            policy,
            types: DashMap::new(),
        }
    }

    /// Whether entities of `schema` are audited: the schema must opt in and
    /// the policy must accept its type name.
    #[must_use]
    pub fn allows(&self, schema: &EntitySchema) -> bool {
        schema.is_audited() && self.should_log_type(schema.type_name())
    }

    /// Number of cached type decisions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether no decision has been cached yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl EligibilityPolicy for EligibilityCache {
    fn should_log_type(&self, type_name: &str) -> bool {
        if let Some(cached) = self.types.get(type_name) {
            return *cached;
        }
        let decision = self.policy.should_log_type(type_name);
        trace!(type_name, decision, "caching eligibility decision");
        self.types.insert(type_name.to_owned(), decision);
        decision
    }

    fn should_log_field(&self, type_name: &str, field: &FieldDescriptor) -> bool {
        self.policy.should_log_field(type_name, field)
    }
}

impl std::fmt::Debug for EligibilityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EligibilityCache")
            .field("cached_types", &self.types.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldKind, FieldRole};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn descriptor(name: &'static str) -> FieldDescriptor {
        FieldDescriptor {
            name,
            kind: FieldKind::Text,
            role: FieldRole::Data,
            loggable: true,
            declared_on: "crm.Customer",
        }
    }

    #[test]
    fn test_config_policy_exclusions() {
        let policy = ConfigPolicy::from_lists(["crm.Session"], ["crm.Customer.password"]).unwrap();

        assert!(!policy.should_log_type("crm.Session"));
        assert!(policy.should_log_type("crm.Customer"));
        assert!(!policy.should_log_field("crm.Customer", &descriptor("password")));
        assert!(policy.should_log_field("crm.Customer", &descriptor("name")));
        assert!(policy.should_log_field("crm.Other", &descriptor("password")));
    }

    #[test]
    fn test_config_policy_rejects_malformed_field() {
        let err = ConfigPolicy::from_lists(Vec::<String>::new(), ["password"]).unwrap_err();
        assert!(matches!(err, AuditError::InvalidArgument(_)));

        assert!(ConfigPolicy::from_lists(Vec::<String>::new(), ["Type."]).is_err());
    }

    struct CountingPolicy(AtomicUsize);

    impl EligibilityPolicy for CountingPolicy {
        fn should_log_type(&self, type_name: &str) -> bool {
            self.0.fetch_add(1, Ordering::SeqCst);
            type_name != "skip"
        }

        fn should_log_field(&self, _: &str, _: &FieldDescriptor) -> bool {
            true
        }
    }

    #[test]
    fn test_cache_consults_policy_once_per_type() {
        let inner = Arc::new(CountingPolicy(AtomicUsize::new(0)));
        let cache = EligibilityCache::new(Arc::clone(&inner) as Arc<dyn EligibilityPolicy>);

        assert!(cache.should_log_type("keep"));
        assert!(cache.should_log_type("keep"));
        assert!(!cache.should_log_type("skip"));
        assert!(!cache.should_log_type("skip"));

        assert_eq!(inner.0.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_cache_concurrent_population() {
        let cache = Arc::new(EligibilityCache::new(Arc::new(ConfigPolicy::allow_all())));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.should_log_type(&format!("type{}", i % 3)))
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(cache.len(), 3);
    }
}
