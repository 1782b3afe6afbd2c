//! Payload decoding and snapshot reconstruction.
//!
//! [`Reconstructor::load_item`] turns a persisted [`EventRecord`] back into
//! an entity. Insert and update records resolve to the live entity; delete
//! records are rebuilt from the old values captured in their payload.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::debug;

use crate::changes::ChangeSet;
use crate::encode::CHANGE_ROOT;
use crate::entry::{EventKind, EventRecord};
use crate::error::{AuditError, AuditResult};
use crate::registry::TypeRegistry;
use crate::schema::{Entity, EntitySchema, FieldRole};
use crate::store::EntityStore;

static SECTIONS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?s)^<{CHANGE_ROOT}><old>(.*)</old><new>(.*)</new></{CHANGE_ROOT}>$"
    ))
    .expect("invalid regex")
});

static ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<([A-Za-z_][\w.-]*)>([^<]*)</([A-Za-z_][\w.-]*)>").expect("invalid regex")
});

/// Reverse of [`crate::encode::escape`].
#[must_use]
pub fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Split one section into `(field, value)` pairs. Every byte of the section
/// must belong to a well-formed element.
fn parse_section(section: &str) -> AuditResult<Vec<(String, Option<String>)>> {
    let mut pairs = Vec::new();
    let mut cursor = 0;

    for caps in ELEMENT.captures_iter(section) {
        let (Some(whole), Some(open), Some(value), Some(close)) =
            (caps.get(0), caps.get(1), caps.get(2), caps.get(3))
        else {
            continue;
        };
        if whole.start() != cursor {
            return Err(AuditError::InvalidPayload(format!(
                "unexpected content at offset {cursor}"
            )));
        }
        if open.as_str() != close.as_str() {
            return Err(AuditError::InvalidPayload(format!(
                "element <{}> closed by </{}>",
                open.as_str(),
                close.as_str()
            )));
        }
        let value = value.as_str();
        pairs.push((
            open.as_str().to_owned(),
            (!value.is_empty()).then(|| unescape(value)),
        ));
        cursor = whole.end();
    }

    if cursor != section.len() {
        return Err(AuditError::InvalidPayload(format!(
            "unexpected content at offset {cursor}"
        )));
    }
    Ok(pairs)
}

/// Decode a change payload into a [`ChangeSet`].
///
/// Empty elements decode to absent values.
///
/// # Errors
///
/// Returns [`AuditError::InvalidPayload`] if the payload is not a
/// well-formed change block or its two sections list different fields.
pub fn decode_changes(payload: &str) -> AuditResult<ChangeSet> {
    let caps = SECTIONS.captures(payload).ok_or_else(|| {
        AuditError::InvalidPayload(format!("expected a <{CHANGE_ROOT}> block"))
    })?;
    let old = parse_section(caps.get(1).map_or("", |m| m.as_str()))?;
    let new = parse_section(caps.get(2).map_or("", |m| m.as_str()))?;

    if old.len() != new.len() {
        return Err(AuditError::InvalidPayload(
            "old and new sections differ in length".to_owned(),
        ));
    }

    let mut changes = ChangeSet::new();
    for ((field, old_value), (new_field, new_value)) in old.into_iter().zip(new) {
        if field != new_field {
            return Err(AuditError::InvalidPayload(format!(
                "field {field} paired with {new_field}"
            )));
        }
        if !changes.insert(field.clone(), old_value, new_value) {
            return Err(AuditError::InvalidPayload(format!(
                "field {field} appears twice"
            )));
        }
    }
    Ok(changes)
}

/// Decode only the old side of a change payload, in payload order.
///
/// # Errors
///
/// Same as [`decode_changes`].
pub fn decode_old_values(payload: &str) -> AuditResult<Vec<(String, Option<String>)>> {
    Ok(decode_changes(payload)?
        .iter()
        .map(|change| (change.field.clone(), change.old.clone()))
        .collect())
}

/// Rebuilds entities from persisted records.
#[derive(Clone)]
pub struct Reconstructor {
    registry: Arc<TypeRegistry>,
    entities: Arc<dyn EntityStore>,
}

impl Reconstructor {
    /// Create a reconstructor resolving types through `registry` and live
    /// entities through `entities`.
    #[must_use]
    pub fn new(registry: Arc<TypeRegistry>, entities: Arc<dyn EntityStore>) -> Self {
        Self { registry, entities }
    }

    /// Load the entity a record describes.
    ///
    /// Insert and update records return the entity's current persisted state.
    /// Delete records return a transient instance carrying the recorded key
    /// and old values.
    ///
    /// # Errors
    ///
    /// - [`AuditError::TypeNotFound`] if the subject type is not registered
    /// - [`AuditError::EntityNotFound`] if an insert/update subject no longer exists
    /// - [`AuditError::Conversion`] if a recorded value does not parse into its field
    /// - [`AuditError::InvalidPayload`] if a delete payload is malformed
    /// - [`AuditError::UnsupportedOperation`] for any other record kind
    pub fn load_item(&self, record: &EventRecord) -> AuditResult<Box<dyn Entity>> {
        let type_name = record
            .subject_type
            .as_deref()
            .ok_or_else(|| AuditError::invalid_argument("record has no subject type"))?;
        let schema = self.registry.require(type_name)?;
        let key = record.subject_key.as_deref().unwrap_or_default();

        match record.kind {
            EventKind::Insert | EventKind::Update => self
                .entities
                .get(type_name, key)?
                .ok_or_else(|| AuditError::EntityNotFound {
                    type_name: type_name.to_owned(),
                    key: key.to_owned(),
                }),
            EventKind::Delete => rebuild(schema, key, record.payload.as_deref()),
            other => Err(AuditError::UnsupportedOperation(format!(
                "cannot load an item from a {other} record"
            ))),
        }
    }
}

fn rebuild(schema: &EntitySchema, key: &str, payload: Option<&str>) -> AuditResult<Box<dyn Entity>> {
    let mut entity = schema.instantiate();
    entity.set_key(key).map_err(|e| AuditError::Conversion {
        field: schema.identity().to_owned(),
        value: key.to_owned(),
        reason: e.to_string(),
    })?;

    let values = match payload.filter(|p| !p.is_empty()) {
        Some(payload) => decode_old_values(payload)?,
        None => Vec::new(),
    };

    for (name, text) in values {
        let Some(field) = schema.field(&name).filter(|f| f.role == FieldRole::Data) else {
            debug!(type_name = schema.type_name(), field = %name, "skipping field missing from schema");
            continue;
        };
        let text = text.unwrap_or_default();
        let conversion = |reason: String| AuditError::Conversion {
            field: name.clone(),
            value: text.clone(),
            reason,
        };
        let value = field.kind.parse(&text).map_err(conversion)?;
        entity
            .write_field(field.name, value)
            .map_err(|e| conversion(e.to_string()))?;
    }

    Ok(entity)
}

impl std::fmt::Debug for Reconstructor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconstructor")
            .field("types", &self.registry.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::{encode_changes, escape};

    #[test]
    fn test_decode_inverts_encode() {
        let mut changes = ChangeSet::new();
        changes.insert("name", Some("<Ada & \"Bob\">".into()), Some("Ada's".into()));
        changes.insert("age", None, Some("36".into()));
        changes.insert("ids", Some("a,b".into()), None);
        changes.insert("tier", Some(String::new()), Some("gold".into()));

        let decoded = decode_changes(&encode_changes(&changes).unwrap()).unwrap();
        assert_eq!(decoded, changes);
    }

    #[test]
    fn test_unescape_amp_last() {
        assert_eq!(unescape("&amp;lt;"), "&lt;");
        assert_eq!(unescape(&escape("&lt; <x> 'q'")), "&lt; <x> 'q'");
    }

    #[test]
    fn test_decode_old_values_order() {
        let payload = "<DataChange><old><b>2</b><a>1</a></old><new><b></b><a></a></new></DataChange>";
        let values = decode_old_values(payload).unwrap();
        assert_eq!(
            values,
            vec![("b".into(), Some("2".into())), ("a".into(), Some("1".into()))]
        );
    }

    #[test]
    fn test_decode_rejects_malformed() {
        for payload in [
            "",
            "<Data><a>1</a></Data>",
            "<DataChange><old><a>1</b></old><new><a></a></new></DataChange>",
            "<DataChange><old>junk<a>1</a></old><new><a></a></new></DataChange>",
            "<DataChange><old><a>1</a></old><new></new></DataChange>",
            "<DataChange><old><a>1</a></old><new><b></b></new></DataChange>",
            "<DataChange><old><a>1</a><a>2</a></old><new><a></a><a></a></new></DataChange>",
        ] {
            assert!(
                matches!(decode_changes(payload), Err(AuditError::InvalidPayload(_))),
                "accepted {payload:?}"
            );
        }
    }

    #[test]
    fn test_decode_empty_sections() {
        let decoded = decode_changes("<DataChange><old></old><new></new></DataChange>").unwrap();
        assert!(decoded.is_empty());
    }
}
