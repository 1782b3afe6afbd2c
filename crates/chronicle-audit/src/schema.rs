//! Declarative entity schemas and the type-erased [`Entity`] trait.
//!
//! Each audited type declares its fields once, at startup, through
//! [`EntitySchema::builder`]. The differ, encoder and reconstructor only ever
//! see an entity through this schema and the [`Entity`] accessors, so no
//! runtime introspection is involved.

use std::any::Any;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::error::{AuditError, AuditResult};

/// Separator used when rendering identifier lists.
pub const ID_LIST_SEPARATOR: &str = ",";

/// Separator used when rendering text lists.
pub const TEXT_LIST_SEPARATOR: &str = ", ";

/// Prefixed to every `\` and `,` inside a rendered text list item.
const LIST_ESCAPE: char = '\\';

fn escape_list_item(item: &str) -> String {
    let mut out = String::with_capacity(item.len());
    for c in item.chars() {
        if c == LIST_ESCAPE || c == ',' {
            out.push(LIST_ESCAPE);
        }
        out.push(c);
    }
    out
}

/// Inverse of joining [`escape_list_item`] outputs with
/// [`TEXT_LIST_SEPARATOR`].
fn split_text_list(text: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            LIST_ESCAPE => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            },
            ',' => {
                items.push(std::mem::take(&mut current));
                chars.next_if_eq(&' ');
            },
            other => current.push(other),
        }
    }
    items.push(current);
    items
}

/// Declared type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Free text.
    Text,
    /// `true` / `false`.
    Bool,
    /// Signed 64-bit integer.
    Integer,
    /// Floating-point decimal.
    Decimal,
    /// UTC timestamp, rendered as RFC 3339.
    DateTime,
    /// UUID identifier.
    Id,
    /// List of UUID identifiers.
    IdList,
    /// List of text items. Items are joined with [`TEXT_LIST_SEPARATOR`]
    /// after escaping `\` and `,`. A list holding one empty item renders
    /// like an empty list.
    TextList,
}

impl FieldKind {
    /// Parse the textual form produced by [`FieldValue::render`] back into a
    /// value of this kind.
    ///
    /// An empty string parses to [`FieldValue::Null`] for scalar kinds (other
    /// than [`FieldKind::Text`]) and to an empty list for list kinds.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when `text` is not a valid rendering.
    pub fn parse(self, text: &str) -> Result<FieldValue, String> {
        match self {
            Self::Text => Ok(FieldValue::Text(text.to_owned())),
            Self::IdList => {
                if text.is_empty() {
                    return Ok(FieldValue::IdList(Vec::new()));
                }
                text.split(ID_LIST_SEPARATOR)
                    .map(|part| Uuid::parse_str(part.trim()).map_err(|e| e.to_string()))
                    .collect::<Result<Vec<_>, _>>()
                    .map(FieldValue::IdList)
            },
            Self::TextList => {
                if text.is_empty() {
                    return Ok(FieldValue::TextList(Vec::new()));
                }
                Ok(FieldValue::TextList(split_text_list(text)))
            },
            _ if text.is_empty() => Ok(FieldValue::Null),
            Self::Bool => match text.to_ascii_lowercase().as_str() {
                "true" => Ok(FieldValue::Bool(true)),
                "false" => Ok(FieldValue::Bool(false)),
                _ => Err(format!("'{text}' is not a boolean")),
            },
            Self::Integer => text
                .parse::<i64>()
                .map(FieldValue::Integer)
                .map_err(|e| e.to_string()),
            Self::Decimal => text
                .parse::<f64>()
                .map(FieldValue::Decimal)
                .map_err(|e| e.to_string()),
            Self::DateTime => DateTime::parse_from_rfc3339(text)
                .map(|dt| FieldValue::DateTime(dt.with_timezone(&Utc)))
                .map_err(|e| e.to_string()),
            Self::Id => Uuid::parse_str(text)
                .map(FieldValue::Id)
                .map_err(|e| e.to_string()),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Text => "text",
            Self::Bool => "bool",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::DateTime => "datetime",
            Self::Id => "id",
            Self::IdList => "id_list",
            Self::TextList => "text_list",
        };
        f.write_str(name)
    }
}

/// A field value read from, or written to, an entity.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// No value.
    Null,
    /// Free text.
    Text(String),
    /// Boolean.
    Bool(bool),
    /// Integer.
    Integer(i64),
    /// Decimal.
    Decimal(f64),
    /// UTC timestamp.
    DateTime(DateTime<Utc>),
    /// Identifier.
    Id(Uuid),
    /// Identifier list.
    IdList(Vec<Uuid>),
    /// Text list.
    TextList(Vec<String>),
}

impl FieldValue {
    /// Textual form used in change sets. `None` for [`FieldValue::Null`].
    #[must_use]
    pub fn render(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Text(s) => Some(s.clone()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Integer(i) => Some(i.to_string()),
            Self::Decimal(d) => Some(d.to_string()),
            Self::DateTime(dt) => Some(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::Id(id) => Some(id.to_string()),
            Self::IdList(ids) => Some(
                ids.iter()
                    .map(Uuid::to_string)
                    .collect::<Vec<_>>()
                    .join(ID_LIST_SEPARATOR),
            ),
            Self::TextList(items) => Some(
                items
                    .iter()
                    .map(|item| escape_list_item(item))
                    .collect::<Vec<_>>()
                    .join(TEXT_LIST_SEPARATOR),
            ),
        }
    }

    /// The kind of this value, or `None` for [`FieldValue::Null`].
    #[must_use]
    pub fn kind(&self) -> Option<FieldKind> {
        match self {
            Self::Null => None,
            Self::Text(_) => Some(FieldKind::Text),
            Self::Bool(_) => Some(FieldKind::Bool),
            Self::Integer(_) => Some(FieldKind::Integer),
            Self::Decimal(_) => Some(FieldKind::Decimal),
            Self::DateTime(_) => Some(FieldKind::DateTime),
            Self::Id(_) => Some(FieldKind::Id),
            Self::IdList(_) => Some(FieldKind::IdList),
            Self::TextList(_) => Some(FieldKind::TextList),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Decimal(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::DateTime(value)
    }
}

impl From<Uuid> for FieldValue {
    fn from(value: Uuid) -> Self {
        Self::Id(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Errors raised by entity field accessors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FieldError {
    /// The entity has no field with this name.
    #[error("unknown field: {0}")]
    Unknown(String),

    /// The value does not fit the field.
    #[error("field {field} rejects a {found} value")]
    Rejected {
        /// Field name.
        field: String,
        /// Kind of the rejected value (`null` for nulls).
        found: String,
    },

    /// The field exists but its value cannot be read right now.
    #[error("field {field} is unreadable: {reason}")]
    Unreadable {
        /// Field name.
        field: String,
        /// Why the read failed.
        reason: String,
    },

    /// The identity value is not a valid key for this type.
    #[error("invalid key '{0}'")]
    InvalidKey(String),
}

impl FieldError {
    /// Build a [`FieldError::Rejected`] for `value` written to `field`.
    #[must_use]
    pub fn rejected(field: &str, value: &FieldValue) -> Self {
        Self::Rejected {
            field: field.to_owned(),
            found: value
                .kind()
                .map_or_else(|| "null".to_owned(), |k| k.to_string()),
        }
    }
}

/// Role a field plays in its entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    /// Regular stored data.
    Data,
    /// The identity key. Never part of a change set.
    Identity,
    /// Derived from other fields. Never part of a change set.
    Computed,
}

/// Declaration of a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Field name, also used as the payload element name.
    pub name: &'static str,
    /// Declared type.
    pub kind: FieldKind,
    /// Role in the entity.
    pub role: FieldRole,
    /// Whether the field may appear in audit payloads at all.
    pub loggable: bool,
    /// The type that declared this field (differs from the schema's own type
    /// for inherited fields).
    pub declared_on: &'static str,
}

impl FieldDescriptor {
    /// Whether the field is stored data that may be audited.
    #[must_use]
    pub fn is_auditable(&self) -> bool {
        self.role == FieldRole::Data && self.loggable
    }
}

/// Factory producing a blank, transient instance of an entity type.
pub type EntityFactory = fn() -> Box<dyn Entity>;

/// Field declarations for one entity type.
#[derive(Debug, Clone)]
pub struct EntitySchema {
    type_name: &'static str,
    identity: &'static str,
    audited: bool,
    fields: Vec<FieldDescriptor>,
    factory: EntityFactory,
}

impl EntitySchema {
    /// Start declaring the schema of `type_name`.
    #[must_use]
    pub fn builder(type_name: &'static str, factory: EntityFactory) -> EntitySchemaBuilder {
        EntitySchemaBuilder {
            schema: Self {
                type_name,
                identity: "id",
                audited: true,
                fields: Vec::new(),
                factory,
            },
        }
    }

    /// Fully qualified type name.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Name of the identity field.
    #[must_use]
    pub fn identity(&self) -> &'static str {
        self.identity
    }

    /// Whether the type opts into auditing at all.
    #[must_use]
    pub fn is_audited(&self) -> bool {
        self.audited
    }

    /// Every declared field, inherited ones included, in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Look up a field by name, preferring the one declared on this exact
    /// type when an inherited field is shadowed.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        let mut found = None;
        for field in self.fields.iter().filter(|f| f.name == name) {
            if field.declared_on == self.type_name {
                return Some(field);
            }
            if found.is_none() {
                found = Some(field);
            }
        }
        found
    }

    /// Auditable data fields, one per name, in first-appearance order.
    ///
    /// Identity and computed fields are excluded, as are fields declared
    /// non-loggable.
    #[must_use]
    pub fn auditable_fields(&self) -> Vec<&FieldDescriptor> {
        let mut names: Vec<&'static str> = Vec::new();
        for field in &self.fields {
            if !names.contains(&field.name) {
                names.push(field.name);
            }
        }

        names
            .into_iter()
            .filter_map(|name| self.field(name))
            .filter(|field| field.is_auditable())
            .collect()
    }

    /// Create a blank transient instance of this type.
    #[must_use]
    pub fn instantiate(&self) -> Box<dyn Entity> {
        (self.factory)()
    }
}

/// Builder returned by [`EntitySchema::builder`].
#[derive(Debug)]
#[must_use]
pub struct EntitySchemaBuilder {
    schema: EntitySchema,
}

impl EntitySchemaBuilder {
    /// Copy every field of `base` into this schema, keeping its declaring type.
    pub fn inherit(mut self, base: &EntitySchema) -> Self {
        self.schema.fields.extend(base.fields.iter().cloned());
        self.schema.identity = base.identity;
        self
    }

    /// Name the identity field (defaults to `id`).
    pub fn identity(mut self, name: &'static str) -> Self {
        self.schema.identity = name;
        self
    }

    /// Opt the whole type out of auditing.
    pub fn not_audited(mut self) -> Self {
        self.schema.audited = false;
        self
    }

    /// Declare an auditable data field.
    pub fn field(self, name: &'static str, kind: FieldKind) -> Self {
        self.push(name, kind, FieldRole::Data, true)
    }

    /// Declare a data field that must never appear in audit payloads.
    pub fn unlogged(self, name: &'static str, kind: FieldKind) -> Self {
        self.push(name, kind, FieldRole::Data, false)
    }

    /// Declare a computed field.
    pub fn computed(self, name: &'static str, kind: FieldKind) -> Self {
        self.push(name, kind, FieldRole::Computed, false)
    }

    fn push(mut self, name: &'static str, kind: FieldKind, role: FieldRole, loggable: bool) -> Self {
        self.schema.fields.push(FieldDescriptor {
            name,
            kind,
            role,
            loggable,
            declared_on: self.schema.type_name,
        });
        self
    }

    /// Validate and finish the schema.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Schema`] when the type name is empty, a field
    /// name is not a valid markup element name, a field reuses the identity
    /// name, or the same type declares a field twice.
    pub fn build(self) -> AuditResult<EntitySchema> {
        let schema = self.schema;
        let type_name = schema.type_name;
        let fail = |reason: String| AuditError::Schema {
            type_name: type_name.to_owned(),
            reason,
        };

        if schema.type_name.trim().is_empty() {
            return Err(fail("type name is empty".to_owned()));
        }

        for (i, field) in schema.fields.iter().enumerate() {
            if !is_element_name(field.name) {
                return Err(fail(format!("'{}' is not a valid field name", field.name)));
            }
            if field.name == schema.identity {
                return Err(fail(format!(
                    "'{}' is the identity and cannot be declared as a field",
                    field.name
                )));
            }
            let duplicate = schema.fields[..i]
                .iter()
                .any(|f| f.name == field.name && f.declared_on == field.declared_on);
            if duplicate {
                return Err(fail(format!(
                    "{} declares '{}' twice",
                    field.declared_on, field.name
                )));
            }
        }

        Ok(schema)
    }
}

/// Whether `name` can be used verbatim as a payload element name.
fn is_element_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// An auditable domain object.
///
/// Implementations map field names onto their own struct members; the
/// schema returned by [`Entity::schema`] lists which names exist.
pub trait Entity: fmt::Debug + Send + Sync {
    /// The declared schema of this entity's type.
    fn schema(&self) -> &'static EntitySchema;

    /// Identity key, rendered as text.
    fn key(&self) -> String;

    /// Set the identity from its textual form.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::InvalidKey`] when `key` cannot be parsed.
    fn set_key(&mut self, key: &str) -> Result<(), FieldError>;

    /// Read a field by name.
    ///
    /// # Errors
    ///
    /// Returns a [`FieldError`] when the field is unknown or unreadable.
    fn read_field(&self, name: &str) -> Result<FieldValue, FieldError>;

    /// Write a field by name.
    ///
    /// # Errors
    ///
    /// Returns a [`FieldError`] when the field is unknown or rejects the value.
    fn write_field(&mut self, name: &str, value: FieldValue) -> Result<(), FieldError>;

    /// Clone into a new box.
    fn clone_entity(&self) -> Box<dyn Entity>;

    /// Access the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Shorthand for `self.schema().type_name()`.
    fn type_name(&self) -> &'static str {
        self.schema().type_name()
    }
}

impl Clone for Box<dyn Entity> {
    fn clone(&self) -> Self {
        self.clone_entity()
    }
}
