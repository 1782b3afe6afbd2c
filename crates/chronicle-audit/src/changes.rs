//! Field-level change detection.

use std::sync::Arc;

use tracing::debug;

use crate::error::{AuditError, AuditResult};
use crate::policy::EligibilityPolicy;
use crate::schema::{Entity, EntitySchema, FieldDescriptor};

/// Old and new textual values of one changed field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    /// Field name.
    pub field: String,
    /// Value before the change, `None` when absent.
    pub old: Option<String>,
    /// Value after the change, `None` when absent.
    pub new: Option<String>,
}

/// Ordered mapping of changed field name to its old and new values.
///
/// Field names are unique; iteration follows insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    changes: Vec<FieldChange>,
}

impl ChangeSet {
    /// Create an empty change set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a change. Returns `false`, leaving the set untouched, when
    /// `field` is already present.
    ///
    /// Empty values are stored as absent; the payload encoding cannot tell
    /// them apart.
    pub fn insert(
        &mut self,
        field: impl Into<String>,
        old: Option<String>,
        new: Option<String>,
    ) -> bool {
        let field = field.into();
        if self.get(&field).is_some() {
            return false;
        }
        self.changes.push(FieldChange {
            field,
            old: non_empty(old),
            new: non_empty(new),
        });
        true
    }

    /// The change recorded for `field`, if any.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldChange> {
        self.changes.iter().find(|c| c.field == field)
    }

    /// Changed field names, in order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.changes.iter().map(|c| c.field.as_str())
    }

    /// Iterate over the changes, in order.
    pub fn iter(&self) -> std::slice::Iter<'_, FieldChange> {
        self.changes.iter()
    }

    /// Number of changed fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Whether nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a FieldChange;
    type IntoIter = std::slice::Iter<'a, FieldChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

/// Compares entity snapshots field by field.
///
/// Only auditable fields accepted by the eligibility policy are compared.
/// A field whose accessor fails is skipped; auditing is best-effort for
/// such fields.
#[derive(Clone)]
pub struct Differ {
    policy: Arc<dyn EligibilityPolicy>,
}

impl Differ {
    /// Create a differ consulting `policy` for field eligibility.
    #[must_use]
    pub fn new(policy: Arc<dyn EligibilityPolicy>) -> Self {
        Self { policy }
    }

    /// Fields of `schema` that take part in diffs, in enumeration order.
    #[must_use]
    pub fn loggable_fields<'s>(&self, schema: &'s EntitySchema) -> Vec<&'s FieldDescriptor> {
        schema
            .auditable_fields()
            .into_iter()
            .filter(|field| self.policy.should_log_field(schema.type_name(), field))
            .collect()
    }

    /// Fields whose rendered value differs between `original` and `updated`.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::InvalidArgument`] when the two entities are not
    /// of the same type.
    pub fn diff(&self, original: &dyn Entity, updated: &dyn Entity) -> AuditResult<ChangeSet> {
        if original.type_name() != updated.type_name() {
            return Err(AuditError::invalid_argument(format!(
                "diff expects two instances of the same type, while {} is not the same as {}",
                original.type_name(),
                updated.type_name()
            )));
        }
        Ok(self.compare(original.schema(), Some(original), Some(updated)))
    }

    /// One-sided diff of an entity about to be deleted: every non-empty
    /// field, with the new value absent.
    #[must_use]
    pub fn snapshot(&self, entity: &dyn Entity) -> ChangeSet {
        self.compare(entity.schema(), Some(entity), None)
    }

    /// One-sided diff of an entity with no prior state: every non-empty
    /// field, with the old value absent.
    #[must_use]
    pub fn creation(&self, entity: &dyn Entity) -> ChangeSet {
        self.compare(entity.schema(), None, Some(entity))
    }

    fn compare(
        &self,
        schema: &EntitySchema,
        original: Option<&dyn Entity>,
        updated: Option<&dyn Entity>,
    ) -> ChangeSet {
        let mut changes = ChangeSet::new();

        for field in self.loggable_fields(schema) {
            let Some(old) = read(original, field) else {
                continue;
            };
            let Some(new) = read(updated, field) else {
                continue;
            };

            let include = match (original.is_some(), updated.is_some()) {
                (true, true) => old != new,
                (true, false) => old.is_some(),
                _ => new.is_some(),
            };

            if include {
                changes.insert(field.name, old, new);
            }
        }

        changes
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Rendered value of `field`, `Some(None)` for a missing side or an empty
/// value, and `None` when the accessor failed.
fn read(entity: Option<&dyn Entity>, field: &FieldDescriptor) -> Option<Option<String>> {
    let Some(entity) = entity else {
        return Some(None);
    };
    match entity.read_field(field.name) {
        Ok(value) => Some(non_empty(value.render())),
        Err(e) => {
            debug!(
                subject_type = entity.type_name(),
                field = field.name,
                error = %e,
                "skipping unreadable field"
            );
            None
        },
    }
}

impl std::fmt::Debug for Differ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Differ").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ConfigPolicy;
    use crate::schema::{FieldError, FieldKind, FieldValue};
    use std::any::Any;
    use std::sync::LazyLock;

    #[derive(Debug, Clone, Default)]
    struct Note {
        id: i64,
        title: String,
        body: Option<String>,
        pinned: bool,
        broken: bool,
    }

    static NOTE: LazyLock<EntitySchema> = LazyLock::new(|| {
        EntitySchema::builder("test.Note", || Box::new(Note::default()))
            .field("title", FieldKind::Text)
            .field("body", FieldKind::Text)
            .field("pinned", FieldKind::Bool)
            .field("broken", FieldKind::Text)
            .computed("length", FieldKind::Integer)
            .build()
            .unwrap()
    });

    static OTHER: LazyLock<EntitySchema> = LazyLock::new(|| {
        EntitySchema::builder("test.Other", || Box::new(Note::default()))
            .build()
            .unwrap()
    });

    impl Entity for Note {
        fn schema(&self) -> &'static EntitySchema {
            if self.id < 0 { &*OTHER } else { &*NOTE }
        }
        fn key(&self) -> String {
            self.id.to_string()
        }
        fn set_key(&mut self, key: &str) -> Result<(), FieldError> {
            self.id = key.parse().map_err(|_| FieldError::InvalidKey(key.to_owned()))?;
            Ok(())
        }
        fn read_field(&self, name: &str) -> Result<FieldValue, FieldError> {
            Ok(match name {
                "title" => self.title.clone().into(),
                "body" => self.body.clone().into(),
                "pinned" => self.pinned.into(),
                "broken" if self.broken => {
                    return Err(FieldError::Unreadable {
                        field: name.to_owned(),
                        reason: "boom".to_owned(),
                    });
                },
                "broken" => FieldValue::Null,
                "length" => i64::try_from(self.title.len()).unwrap_or_default().into(),
                _ => return Err(FieldError::Unknown(name.to_owned())),
            })
        }
        fn write_field(&mut self, name: &str, value: FieldValue) -> Result<(), FieldError> {
            Err(FieldError::rejected(name, &value))
        }
        fn clone_entity(&self) -> Box<dyn Entity> {
            Box::new(self.clone())
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn differ() -> Differ {
        Differ::new(Arc::new(ConfigPolicy::allow_all()))
    }

    fn note(title: &str) -> Note {
        Note {
            id: 1,
            title: title.to_owned(),
            ..Note::default()
        }
    }

    #[test]
    fn test_single_field_difference() {
        let before = note("draft");
        let after = note("final");

        let changes = differ().diff(&before, &after).unwrap();
        assert_eq!(changes.fields().collect::<Vec<_>>(), vec!["title"]);
        let change = changes.get("title").unwrap();
        assert_eq!(change.old.as_deref(), Some("draft"));
        assert_eq!(change.new.as_deref(), Some("final"));
    }

    #[test]
    fn test_identical_snapshots_yield_empty() {
        let a = note("same");
        assert!(differ().diff(&a, &a.clone()).unwrap().is_empty());
    }

    #[test]
    fn test_null_to_value_is_a_change() {
        let before = note("t");
        let after = Note {
            body: Some("text".into()),
            ..note("t")
        };

        let changes = differ().diff(&before, &after).unwrap();
        let change = changes.get("body").unwrap();
        assert_eq!(change.old, None);
        assert_eq!(change.new.as_deref(), Some("text"));
    }

    #[test]
    fn test_null_and_empty_are_the_same_value() {
        let before = note("t");
        let after = Note {
            body: Some(String::new()),
            ..note("t")
        };

        assert!(differ().diff(&before, &after).unwrap().is_empty());
        assert!(differ().diff(&after, &before).unwrap().is_empty());
    }

    #[test]
    fn test_order_follows_declaration() {
        let before = note("a");
        let after = Note {
            pinned: true,
            body: Some("b".into()),
            ..note("z")
        };

        let changes = differ().diff(&before, &after).unwrap();
        assert_eq!(
            changes.fields().collect::<Vec<_>>(),
            vec!["title", "body", "pinned"]
        );
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let other = Note { id: -1, ..Note::default() };
        let err = differ().diff(&note("a"), &other).unwrap_err();
        assert!(matches!(err, AuditError::InvalidArgument(_)));
    }

    #[test]
    fn test_unreadable_field_skipped() {
        let before = Note { broken: true, ..note("a") };
        let after = Note { broken: true, ..note("b") };

        let changes = differ().diff(&before, &after).unwrap();
        assert_eq!(changes.len(), 1);
        assert!(changes.get("broken").is_none());
    }

    #[test]
    fn test_snapshot_captures_non_empty_old_values() {
        let entity = Note {
            pinned: false,
            ..note("keep me")
        };

        let changes = differ().snapshot(&entity);
        assert_eq!(changes.fields().collect::<Vec<_>>(), vec!["title", "pinned"]);
        assert!(changes.iter().all(|c| c.new.is_none()));
        assert_eq!(changes.get("pinned").unwrap().old.as_deref(), Some("false"));
    }

    #[test]
    fn test_creation_captures_non_empty_new_values() {
        let changes = differ().creation(&note("fresh"));
        let title = changes.get("title").unwrap();
        assert_eq!(title.old, None);
        assert_eq!(title.new.as_deref(), Some("fresh"));
        assert!(changes.get("body").is_none());
    }

    #[test]
    fn test_policy_excluded_field() {
        let differ = Differ::new(Arc::new(ConfigPolicy::allow_all().exclude_field("test.Note", "title")));
        let changes = differ.diff(&note("a"), &note("b")).unwrap();
        assert!(changes.is_empty());
    }

    #[test]
    fn test_change_set_stores_empty_as_absent() {
        let mut changes = ChangeSet::new();
        changes.insert("tier", Some(String::new()), Some("gold".into()));
        let change = changes.get("tier").unwrap();
        assert_eq!(change.old, None);
        assert_eq!(change.new.as_deref(), Some("gold"));
    }

    #[test]
    fn test_change_set_rejects_duplicates() {
        let mut changes = ChangeSet::new();
        assert!(changes.insert("a", None, Some("1".into())));
        assert!(!changes.insert("a", None, Some("2".into())));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes.get("a").unwrap().new.as_deref(), Some("1"));
    }
}
