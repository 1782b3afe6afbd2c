//! Actor identity resolution.

use thiserror::Error;

/// Failure while resolving the current actor. Always swallowed by recorders.
#[derive(Debug, Error)]
#[error("actor context unavailable: {0}")]
pub struct ContextError(pub String);

/// Supplies the identity and address of whoever triggered the current
/// operation (typically read from a request context).
pub trait ActorContext: Send + Sync {
    /// Current actor identifier, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError`] when the ambient context cannot be read.
    fn current_actor_id(&self) -> Result<Option<String>, ContextError>;

    /// Current actor network address, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError`] when the ambient context cannot be read.
    fn current_actor_ip(&self) -> Result<Option<String>, ContextError>;
}

/// Context for background work: no actor at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoActor;

impl ActorContext for NoActor {
    fn current_actor_id(&self) -> Result<Option<String>, ContextError> {
        Ok(None)
    }

    fn current_actor_ip(&self) -> Result<Option<String>, ContextError> {
        Ok(None)
    }
}
