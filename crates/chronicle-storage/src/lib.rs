//! Chronicle Storage - namespaced key-value persistence.
//!
//! Provides the raw byte-level [`KvStore`] trait used by the audit engine to
//! persist event records, plus an in-process [`MemoryKvStore`] backend.
//!
//! Keys live inside namespaces (`chronicle:events`, ...) so several stores
//! can share one backend without colliding.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod error;
pub mod kv;

pub use error::{StorageError, StorageResult};
pub use kv::{KvStore, MemoryKvStore};
