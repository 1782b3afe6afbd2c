//! Change-set payload encoding.
//!
//! Payloads are compact markup blocks:
//!
//! ```text
//! <DataChange><old><name>Ada</name></old><new><name>Ada L.</name></new></DataChange>
//! <Data><name>Ada</name><age>36</age></Data>
//! ```
//!
//! Element names are schema field names, which [`EntitySchema`] validation
//! restricts to markup-safe identifiers. Values are escaped. Decoding lives in
//! [`crate::reconstruct`].
//!
//! [`EntitySchema`]: crate::schema::EntitySchema

use std::fmt::Write;

use crate::changes::ChangeSet;

/// Root element of a change payload.
pub const CHANGE_ROOT: &str = "DataChange";

/// Root element of an insert data payload.
pub const DATA_ROOT: &str = "Data";

/// Escape text for safe inclusion in a payload element.
///
/// Escapes `&`, `<`, `>`, `"`, and `'`.
#[must_use]
pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn push_element(out: &mut String, name: &str, value: Option<&str>) {
    let value = value.map(escape).unwrap_or_default();
    // Writing to a String cannot fail.
    let _ = write!(out, "<{name}>{value}</{name}>");
}

/// Encode a change set as a `<DataChange>` block with `<old>` and `<new>`
/// sections. Returns `None` for an empty change set.
#[must_use]
pub fn encode_changes(changes: &ChangeSet) -> Option<String> {
    if changes.is_empty() {
        return None;
    }

    let mut out = format!("<{CHANGE_ROOT}><old>");
    for change in changes {
        push_element(&mut out, &change.field, change.old.as_deref());
    }
    out.push_str("</old><new>");
    for change in changes {
        push_element(&mut out, &change.field, change.new.as_deref());
    }
    let _ = write!(out, "</new></{CHANGE_ROOT}>");
    Some(out)
}

/// Encode the current values of a change set (its `new` side) as a
/// `<Data>` block. Used for insert payloads.
#[must_use]
pub fn encode_data(values: &ChangeSet) -> String {
    let mut out = format!("<{DATA_ROOT}>");
    for change in values {
        push_element(&mut out, &change.field, change.new.as_deref());
    }
    let _ = write!(out, "</{DATA_ROOT}>");
    out
}
