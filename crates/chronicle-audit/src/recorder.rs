//! The recording pipeline.
//!
//! [`EventRecorder`] turns entity saves and deletes, exceptions, scheduled
//! task runs and free-form messages into [`EventRecord`]s. Save and delete
//! recordings run in a fixed order:
//!
//! 1. eligibility check
//! 2. payload construction (diff or snapshot)
//! 3. cancellable hook
//! 4. persistence
//! 5. undo ledger append
//!
//! A failure to resolve the current actor never fails a recording.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, trace, warn};

use crate::changes::Differ;
use crate::context::ActorContext;
use crate::encode::{encode_changes, encode_data};
use crate::entry::{EventKind, EventRecord, SaveMode};
use crate::error::{AuditError, AuditResult};
use crate::exception::{ACTOR_SEPARATOR, ErrorReport};
use crate::hooks::{DeleteHook, DeleteHookArgs, HookRegistry, SaveHook, SaveHookArgs};
use crate::policy::{ConfigPolicy, EligibilityCache, EligibilityPolicy};
use crate::schema::Entity;
use crate::store::{EntityStore, EventStore};
use crate::undo::UndoLedger;

/// Eligibility category consulted before recording scheduled task runs.
pub const SCHEDULED_TASK_CATEGORY: &str = "ScheduledTask";

/// Subject key of a scheduled task run that completed.
pub const TASK_SUCCEEDED: &str = "Successful";

/// Subject key of a scheduled task run that failed.
pub const TASK_FAILED: &str = "Failed";

/// Kind label of the error wrapping a failed scheduled task.
pub const TASK_ERROR_KIND: &str = "ScheduledTaskError";

/// Recorder switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderOptions {
    /// Record exceptions at all.
    pub record_exceptions: bool,
    /// Leave insert records without a data payload.
    pub skip_insert_data: bool,
    /// Error kinds discarded by the exception recorder, in addition to
    /// storage connectivity failures. Matched against every kind in
    /// [`ErrorReport::kinds`].
    ///
    /// The outer error of [`ErrorReport::capture`] is labelled with its type
    /// name. Causes, and errors captured as trait objects, are labelled with
    /// their type name only for common std and dependency errors (for
    /// example `io::Error` or `StorageError`); any other enum cause is
    /// labelled with its variant name.
    pub suppressed_error_kinds: Vec<String>,
}

impl Default for RecorderOptions {
    fn default() -> Self {
        Self {
            record_exceptions: true,
            skip_insert_data: true,
            suppressed_error_kinds: Vec::new(),
        }
    }
}

/// Records entity changes and application events.
pub struct EventRecorder {
    events: Arc<dyn EventStore>,
    entities: Arc<dyn EntityStore>,
    actors: Arc<dyn ActorContext>,
    eligibility: Arc<EligibilityCache>,
    differ: Differ,
    save_hooks: HookRegistry<dyn SaveHook>,
    delete_hooks: HookRegistry<dyn DeleteHook>,
    options: RecorderOptions,
}

impl EventRecorder {
    /// Start building a recorder persisting into `events` and reading prior
    /// state from `entities`.
    #[must_use]
    pub fn builder(events: Arc<dyn EventStore>, entities: Arc<dyn EntityStore>) -> EventRecorderBuilder {
        EventRecorderBuilder {
            events,
            entities,
            actors: None,
            policy: None,
            options: RecorderOptions::default(),
        }
    }

    /// Pre-save subscribers.
    #[must_use]
    pub fn save_hooks(&self) -> &HookRegistry<dyn SaveHook> {
        &self.save_hooks
    }

    /// Pre-delete subscribers.
    #[must_use]
    pub fn delete_hooks(&self) -> &HookRegistry<dyn DeleteHook> {
        &self.delete_hooks
    }

    /// The differ used for update and delete payloads.
    #[must_use]
    pub fn differ(&self) -> &Differ {
        &self.differ
    }

    /// Active switches.
    #[must_use]
    pub fn options(&self) -> &RecorderOptions {
        &self.options
    }

    /// Record an insert or update of `entity`.
    ///
    /// Updates are diffed against the entity's persisted state; an update
    /// that changes no loggable field records nothing. The persisted record
    /// is appended to `ledger` when one is given.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Persistence`] if the prior state cannot be read
    /// or the record cannot be saved.
    pub fn record_save(
        &self,
        entity: &dyn Entity,
        mode: SaveMode,
        ledger: Option<&UndoLedger>,
    ) -> AuditResult<()> {
        if !self.eligibility.allows(entity.schema()) {
            trace!(subject_type = entity.type_name(), "type not audited");
            return Ok(());
        }

        let mut record = self.stub(mode.into(), entity);

        match mode {
            SaveMode::Update => {
                let changes = match self.entities.get(entity.type_name(), &entity.key())? {
                    Some(previous) => self.differ.diff(previous.as_ref(), entity)?,
                    None => {
                        warn!(
                            subject_type = entity.type_name(),
                            subject_key = %entity.key(),
                            "no persisted state to diff against, recording all values"
                        );
                        self.differ.creation(entity)
                    },
                };
                let Some(payload) = encode_changes(&changes) else {
                    trace!(
                        subject_type = entity.type_name(),
                        subject_key = %entity.key(),
                        "update changed nothing"
                    );
                    return Ok(());
                };
                record.payload = Some(payload);
            },
            SaveMode::Insert => {
                if !self.options.skip_insert_data {
                    record.payload = Some(encode_data(&self.differ.creation(entity)));
                }
            },
        }

        let mut args = SaveHookArgs::new(mode, &mut record, entity);
        if self.save_hooks.fire(&mut args) {
            debug!(
                subject_type = entity.type_name(),
                subject_key = %entity.key(),
                kind = %mode,
                "save recording cancelled by hook"
            );
            return Ok(());
        }

        self.persist(record, entity, ledger)
    }

    /// Record the deletion of `entity`, capturing every non-empty loggable
    /// field as its old value.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Persistence`] if the record cannot be saved.
    pub fn record_delete(&self, entity: &dyn Entity, ledger: Option<&UndoLedger>) -> AuditResult<()> {
        if !self.eligibility.allows(entity.schema()) {
            trace!(subject_type = entity.type_name(), "type not audited");
            return Ok(());
        }

        let mut record = self.stub(EventKind::Delete, entity);
        record.payload = encode_changes(&self.differ.snapshot(entity));

        let mut args = DeleteHookArgs::new(&mut record, entity);
        if self.delete_hooks.fire(&mut args) {
            debug!(
                subject_type = entity.type_name(),
                subject_key = %entity.key(),
                "delete recording cancelled by hook"
            );
            return Ok(());
        }

        self.persist(record, entity, ledger)
    }

    /// Record an exception. Never fails: every internal failure is logged and
    /// reduced to `None`.
    ///
    /// Returns `None` when exception recording is switched off, when the
    /// error is a storage connectivity failure or a suppressed kind, or when
    /// the record could not be saved.
    pub fn record_exception(&self, description: Option<&str>, error: &ErrorReport) -> Option<EventRecord> {
        if !self.options.record_exceptions {
            return None;
        }
        if error.is_connectivity_failure() {
            debug!(error = error.message(), "audit store unreachable, not recording exception");
            return None;
        }
        if let Some(kind) = error
            .kinds()
            .find(|kind| self.options.suppressed_error_kinds.iter().any(|s| s == kind))
        {
            debug!(kind, "suppressed error kind, not recording exception");
            return None;
        }

        let mut payload = error.render(description);
        let actor_id = self.actor_id();
        if let Some(actor) = &actor_id {
            payload.push_str(ACTOR_SEPARATOR);
            payload.push('\n');
            payload.push_str("User:");
            payload.push_str(actor);
        }

        let mut record = EventRecord::new(EventKind::Exception)
            .with_payload(payload)
            .with_occurred_at(Utc::now());
        record.subject_type = Some(error.kind().to_owned());
        record.actor_id = actor_id;
        record.actor_ip = self.actor_ip();

        match self.events.save(&record) {
            Ok(()) => Some(record),
            Err(e) => {
                warn!(error = %e, "failed to record exception");
                None
            },
        }
    }

    /// Like [`record_exception`](Self::record_exception), but rejects a
    /// missing error.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::InvalidArgument`] if exception recording is on
    /// and `error` is `None`.
    pub fn try_record_exception(
        &self,
        description: Option<&str>,
        error: Option<&ErrorReport>,
    ) -> AuditResult<Option<EventRecord>> {
        if !self.options.record_exceptions {
            return Ok(None);
        }
        let error = error.ok_or_else(|| AuditError::invalid_argument("exception is required"))?;
        Ok(self.record_exception(description, error))
    }

    /// Record a scheduled task run that started at `started_at` and ends now.
    ///
    /// A failed run is also recorded as an exception naming the task.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Persistence`] if the task record cannot be saved.
    pub fn record_scheduled_task(
        &self,
        task: &str,
        started_at: DateTime<Utc>,
        error: Option<&ErrorReport>,
    ) -> AuditResult<()> {
        if !self.eligibility.should_log_type(SCHEDULED_TASK_CATEGORY) {
            trace!(task, "scheduled tasks not audited");
            return Ok(());
        }

        let elapsed = Utc::now()
            .signed_duration_since(started_at)
            .num_milliseconds()
            .max(0);
        let outcome = if error.is_some() { TASK_FAILED } else { TASK_SUCCEEDED };

        let mut record = EventRecord::new(EventKind::ScheduledTask)
            .with_subject(task, outcome)
            .with_payload(format!(
                "<Execution><Duration unit=\"msec\">{elapsed}</Duration></Execution>"
            ));
        record.actor_id = self.actor_id();
        record.actor_ip = self.actor_ip();
        self.events.save(&record)?;
        debug!(task, outcome, elapsed_ms = elapsed, "recorded scheduled task");

        if let Some(error) = error {
            let wrapped = error.clone().wrap(
                TASK_ERROR_KIND,
                format!("Error in executing the automated schedule work '{task}'."),
            );
            self.record_exception(None, &wrapped);
        }
        Ok(())
    }

    /// Record a free-form message, optionally about `owner`.
    ///
    /// `actor_id` and `actor_ip` default to the current actor.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::InvalidArgument`] if `title` is empty, or
    /// [`AuditError::Persistence`] if the record cannot be saved.
    pub fn log(
        &self,
        title: &str,
        details: &str,
        owner: Option<&dyn Entity>,
        actor_id: Option<&str>,
        actor_ip: Option<&str>,
    ) -> AuditResult<EventRecord> {
        if title.trim().is_empty() {
            return Err(AuditError::invalid_argument("log title is required"));
        }

        let mut record = EventRecord::new(EventKind::Log).with_payload(details);
        record.title = Some(title.to_owned());
        if let Some(owner) = owner {
            record = record.with_subject(owner.type_name(), owner.key());
        }
        record.actor_id = actor_id.map(str::to_owned).or_else(|| self.actor_id());
        record.actor_ip = actor_ip.map(str::to_owned).or_else(|| self.actor_ip());

        self.events.save(&record)?;
        Ok(record)
    }

    fn stub(&self, kind: EventKind, entity: &dyn Entity) -> EventRecord {
        let mut record = EventRecord::new(kind).with_subject(entity.type_name(), entity.key());
        record.actor_id = self.actor_id();
        record.actor_ip = self.actor_ip();
        record
    }

    fn persist(&self, record: EventRecord, entity: &dyn Entity, ledger: Option<&UndoLedger>) -> AuditResult<()> {
        self.events.save(&record)?;
        debug!(
            id = %record.id,
            kind = %record.kind,
            subject_type = entity.type_name(),
            subject_key = record.subject_key.as_deref().unwrap_or_default(),
            "recorded event"
        );
        if let Some(ledger) = ledger {
            ledger.append(record, entity);
        }
        Ok(())
    }

    fn actor_id(&self) -> Option<String> {
        self.actors.current_actor_id().unwrap_or_else(|e| {
            debug!(error = %e, "cannot resolve current actor id");
            None
        })
    }

    fn actor_ip(&self) -> Option<String> {
        self.actors.current_actor_ip().unwrap_or_else(|e| {
            debug!(error = %e, "cannot resolve current actor ip");
            None
        })
    }
}

impl std::fmt::Debug for EventRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRecorder")
            .field("save_hooks", &self.save_hooks)
            .field("delete_hooks", &self.delete_hooks)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Builder for [`EventRecorder`].
pub struct EventRecorderBuilder {
    events: Arc<dyn EventStore>,
    entities: Arc<dyn EntityStore>,
    actors: Option<Arc<dyn ActorContext>>,
    policy: Option<Arc<dyn EligibilityPolicy>>,
    options: RecorderOptions,
}

impl EventRecorderBuilder {
    /// Resolve actors through `actors` (default: no actor).
    #[must_use]
    pub fn actors(mut self, actors: Arc<dyn ActorContext>) -> Self {
        self.actors = Some(actors);
        self
    }

    /// Consult `policy` for type and field eligibility (default: everything).
    #[must_use]
    pub fn policy(mut self, policy: Arc<dyn EligibilityPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Use `options`.
    #[must_use]
    pub fn options(mut self, options: RecorderOptions) -> Self {
        self.options = options;
        self
    }

    /// Build the recorder.
    #[must_use]
    pub fn build(self) -> EventRecorder {
        let policy = self
            .policy
            .unwrap_or_else(|| Arc::new(ConfigPolicy::allow_all()));
        let eligibility = Arc::new(EligibilityCache::new(policy));
        let differ = Differ::new(Arc::clone(&eligibility) as Arc<dyn EligibilityPolicy>);

        EventRecorder {
            events: self.events,
            entities: self.entities,
            actors: self.actors.unwrap_or_else(|| Arc::new(crate::context::NoActor)),
            eligibility,
            differ,
            save_hooks: HookRegistry::new(),
            delete_hooks: HookRegistry::new(),
            options: self.options,
        }
    }
}

impl std::fmt::Debug for EventRecorderBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRecorderBuilder")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
