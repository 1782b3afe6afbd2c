//! Prelude module - commonly used types for convenient import.
//!
//! Use `use chronicle_audit::prelude::*;` to import all essential types.

// Errors
pub use crate::{AuditError, AuditResult};

// Schemas and entities
pub use crate::{Entity, EntitySchema, FieldError, FieldKind, FieldValue, TypeRegistry};

// Records
pub use crate::{EventKind, EventRecord, SaveMode};

// Recording
pub use crate::{ErrorReport, EventRecorder, RecorderOptions, UndoLedger, UndoScope};

// Hooks
pub use crate::{DeleteHookArgs, SaveHookArgs};

// Collaborators
pub use crate::{ActorContext, EligibilityPolicy, EntityStore, EventStore};

// Reconstruction
pub use crate::Reconstructor;
