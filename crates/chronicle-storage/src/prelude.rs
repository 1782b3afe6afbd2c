//! Prelude module - commonly used types for convenient import.
//!
//! Use `use chronicle_storage::prelude::*;` to import all essential types.

// Errors
pub use crate::{StorageError, StorageResult};

// Stores
pub use crate::{KvStore, MemoryKvStore};
