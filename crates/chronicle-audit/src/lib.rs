//! Chronicle Audit - entity change auditing and application event recording.
//!
//! This crate provides:
//! - Declarative entity schemas ([`EntitySchema`]) and the [`Entity`] trait
//! - Field-level diffs between entity snapshots ([`Differ`], [`ChangeSet`])
//! - A compact, escape-safe change payload ([`encode_changes`])
//! - The recording pipeline ([`EventRecorder`]) with cancellable pre-save and
//!   pre-delete hooks and a per-operation undo ledger
//! - Exception, scheduled task and free-form log recording
//! - Reconstruction of deleted entities from their recorded payload
//!   ([`Reconstructor`])
//!
//! # Recording
//!
//! Every save or delete passes through the same stages: eligibility check,
//! payload construction, hooks, persistence, ledger append. An update that
//! changes nothing records nothing, and a hook can veto any record before it
//! reaches storage.
//!
//! # Example
//!
//! ```
//! use chronicle_audit::{ChangeSet, decode_changes, encode_changes};
//!
//! let mut changes = ChangeSet::new();
//! changes.insert("name", Some("Ada".to_owned()), Some("Ada L.".to_owned()));
//!
//! let payload = encode_changes(&changes).unwrap();
//! assert_eq!(
//!     payload,
//!     "<DataChange><old><name>Ada</name></old><new><name>Ada L.</name></new></DataChange>"
//! );
//! assert_eq!(decode_changes(&payload).unwrap(), changes);
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

#[cfg(feature = "config")]
pub mod config_bridge;

mod changes;
mod context;
mod encode;
mod entry;
mod error;
mod exception;
mod hooks;
mod policy;
mod reconstruct;
mod recorder;
mod registry;
mod schema;
mod store;
mod undo;

pub use changes::{ChangeSet, Differ, FieldChange};
pub use context::{ActorContext, ContextError, NoActor};
pub use encode::{CHANGE_ROOT, DATA_ROOT, encode_changes, encode_data, escape};
pub use entry::{EventId, EventKind, EventRecord, SaveMode};
pub use error::{AuditError, AuditResult};
pub use exception::{ACTOR_SEPARATOR, CAUSE_SEPARATOR, ErrorCause, ErrorReport};
pub use hooks::{DeleteHook, DeleteHookArgs, HookId, HookRegistry, SaveHook, SaveHookArgs};
pub use policy::{ConfigPolicy, EligibilityCache, EligibilityPolicy};
pub use reconstruct::{Reconstructor, decode_changes, decode_old_values, unescape};
pub use recorder::{
    EventRecorder, EventRecorderBuilder, RecorderOptions, SCHEDULED_TASK_CATEGORY,
    TASK_ERROR_KIND, TASK_FAILED, TASK_SUCCEEDED,
};
pub use registry::TypeRegistry;
pub use schema::{
    Entity, EntityFactory, EntitySchema, EntitySchemaBuilder, FieldDescriptor, FieldError,
    FieldKind, FieldRole, FieldValue, ID_LIST_SEPARATOR, TEXT_LIST_SEPARATOR,
};
pub use store::{EntityStore, EventStore, KvEventStore};
pub use undo::{UndoEntry, UndoLedger, UndoScope};

// Re-export the storage error surfaced by the store traits
pub use chronicle_storage::{StorageError, StorageResult};
