//! Chronicle Test - Shared test utilities for the Chronicle audit engine.
//!
//! This crate provides fixture entity types, mock collaborators and test
//! helpers that can be used across Chronicle crates as a dev-dependency.
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! chronicle-test.workspace = true
//! ```
//!
//! Then use in your tests:
//!
//! ```rust,ignore
//! use chronicle_audit::{RecorderOptions, SaveMode};
//! use chronicle_test::{Customer, MemoryEntityStore, RecordingEventStore, test_recorder};
//!
//! #[test]
//! fn test_insert_is_recorded() {
//!     let events = RecordingEventStore::new();
//!     let entities = MemoryEntityStore::new();
//!     let recorder = test_recorder(&events, &entities, RecorderOptions::default());
//!
//!     recorder.record_save(&Customer::sample(), SaveMode::Insert, None).unwrap();
//!
//!     assert_eq!(events.len(), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod fixtures;
pub mod harness;
pub mod mocks;

pub use fixtures::*;
pub use harness::*;
pub use mocks::*;
