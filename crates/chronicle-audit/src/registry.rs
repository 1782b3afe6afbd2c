//! Type-name to schema registry used for reconstruction.

use dashmap::DashMap;
use tracing::debug;

use crate::error::{AuditError, AuditResult};
use crate::schema::EntitySchema;

/// Registry of every entity schema known to the process.
///
/// Populated once at startup; lookups are lock-free reads.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    schemas: DashMap<&'static str, &'static EntitySchema>,
}

impl TypeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `schema` under its type name, replacing any earlier entry.
    pub fn register(&self, schema: &'static EntitySchema) {
        if self.schemas.insert(schema.type_name(), schema).is_some() {
            debug!(type_name = schema.type_name(), "replaced registered schema");
        }
    }

    /// Look up a schema by type name.
    #[must_use]
    pub fn resolve(&self, type_name: &str) -> Option<&'static EntitySchema> {
        self.schemas.get(type_name).map(|entry| *entry.value())
    }

    /// Like [`resolve`](Self::resolve), failing with
    /// [`AuditError::TypeNotFound`].
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::TypeNotFound`] if `type_name` is not registered.
    pub fn require(&self, type_name: &str) -> AuditResult<&'static EntitySchema> {
        self.resolve(type_name)
            .ok_or_else(|| AuditError::TypeNotFound {
                type_name: type_name.to_owned(),
            })
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Entity, FieldError, FieldValue};
    use std::any::Any;
    use std::sync::LazyLock;

    #[derive(Debug, Clone, Default)]
    struct Widget;

    static WIDGET: LazyLock<EntitySchema> = LazyLock::new(|| {
        EntitySchema::builder("shop.Widget", || Box::new(Widget))
            .build()
            .unwrap()
    });

    impl Entity for Widget {
        fn schema(&self) -> &'static EntitySchema {
            &WIDGET
        }
        fn key(&self) -> String {
            String::new()
        }
        fn set_key(&mut self, _: &str) -> Result<(), FieldError> {
            Ok(())
        }
        fn read_field(&self, name: &str) -> Result<FieldValue, FieldError> {
            Err(FieldError::Unknown(name.to_owned()))
        }
        fn write_field(&mut self, name: &str, _: FieldValue) -> Result<(), FieldError> {
            Err(FieldError::Unknown(name.to_owned()))
        }
        fn clone_entity(&self) -> Box<dyn Entity> {
            Box::new(self.clone())
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_register_and_resolve() {
        let registry = TypeRegistry::new();
        assert!(registry.is_empty());

        registry.register(&WIDGET);
        registry.register(&WIDGET);

        assert_eq!(registry.len(), 1);
        let schema = registry.resolve("shop.Widget").unwrap();
        assert_eq!(schema.type_name(), "shop.Widget");
        assert!(registry.resolve("shop.Gadget").is_none());
    }

    #[test]
    fn test_require_unknown_type() {
        let registry = TypeRegistry::new();
        let err = registry.require("shop.Gadget").unwrap_err();
        assert!(matches!(err, AuditError::TypeNotFound { ref type_name } if type_name == "shop.Gadget"));
        assert_eq!(err.to_string(), "could not load the type shop.Gadget");
    }
}
