//! Event record types.
//!
//! An [`EventRecord`] is one durable audit fact: a save, a delete, a
//! free-form log line, an exception or a scheduled-task outcome. Records are
//! built fresh per occurrence, may be adjusted by pre-persist hooks, and are
//! immutable once persisted.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier of an event record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub Uuid);

impl EventId {
    /// Generate a fresh identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What kind of occurrence a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// An entity was created.
    Insert,
    /// An entity was modified.
    Update,
    /// An entity was removed.
    Delete,
    /// An error was raised.
    Exception,
    /// A free-form application log entry.
    Log,
    /// A scheduled task finished.
    ScheduledTask,
}

impl EventKind {
    /// Stable display name, also used as the eligibility category for
    /// records that have no entity type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "Insert",
            Self::Update => "Update",
            Self::Delete => "Delete",
            Self::Exception => "Exception",
            Self::Log => "Log",
            Self::ScheduledTask => "ScheduledTask",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a save created or modified the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveMode {
    /// The entity is new.
    Insert,
    /// The entity existed before.
    Update,
}

impl From<SaveMode> for EventKind {
    fn from(mode: SaveMode) -> Self {
        match mode {
            SaveMode::Insert => Self::Insert,
            SaveMode::Update => Self::Update,
        }
    }
}

impl fmt::Display for SaveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        EventKind::from(*self).fmt(f)
    }
}

/// One recorded occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Unique record identifier.
    pub id: EventId,
    /// What happened.
    pub kind: EventKind,
    /// Caller-supplied title (log entries only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Affected entity type, task name, or exception kind.
    #[serde(default)]
    pub subject_type: Option<String>,
    /// Affected entity key, or task outcome.
    #[serde(default)]
    pub subject_key: Option<String>,
    /// When the occurrence was recorded.
    pub occurred_at: DateTime<Utc>,
    /// Who caused it.
    #[serde(default)]
    pub actor_id: Option<String>,
    /// From where.
    #[serde(default)]
    pub actor_ip: Option<String>,
    /// Kind-specific content.
    #[serde(default)]
    pub payload: Option<String>,
}

impl EventRecord {
    /// Create a record of `kind`, stamped with the current time.
    #[must_use]
    pub fn new(kind: EventKind) -> Self {
        Self {
            id: EventId::new(),
            kind,
            title: None,
            subject_type: None,
            subject_key: None,
            occurred_at: Utc::now(),
            actor_id: None,
            actor_ip: None,
            payload: None,
        }
    }

    /// Set the subject type and key.
    #[must_use]
    pub fn with_subject(mut self, subject_type: impl Into<String>, subject_key: impl Into<String>) -> Self {
        self.subject_type = Some(subject_type.into());
        self.subject_key = Some(subject_key.into());
        self
    }

    /// Set the payload.
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Override the recording time.
    #[must_use]
    pub fn with_occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_defaults() {
        let before = Utc::now();
        let record = EventRecord::new(EventKind::Log);

        assert_eq!(record.kind, EventKind::Log);
        assert!(record.subject_type.is_none());
        assert!(record.subject_key.is_none());
        assert!(record.payload.is_none());
        assert!(record.occurred_at >= before);
    }

    #[test]
    fn test_distinct_ids() {
        assert_ne!(EventRecord::new(EventKind::Log).id, EventRecord::new(EventKind::Log).id);
    }

    #[test]
    fn test_save_mode_maps_to_kind() {
        assert_eq!(EventKind::from(SaveMode::Insert), EventKind::Insert);
        assert_eq!(EventKind::from(SaveMode::Update), EventKind::Update);
        assert_eq!(SaveMode::Update.to_string(), "Update");
    }

    #[test]
    fn test_serde_shape() {
        let record = EventRecord::new(EventKind::ScheduledTask)
            .with_subject("Nightly", "Successful")
            .with_payload("<Execution />");

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "scheduled_task");
        assert_eq!(json["subject_key"], "Successful");
        assert!(json.get("title").is_none());

        let back: EventRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
