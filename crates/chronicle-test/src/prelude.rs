//! Prelude module - commonly used test utilities for convenient import.
//!
//! Use `use chronicle_test::prelude::*;` in test modules.

// Fixtures
pub use crate::{
    Customer, Sensor, SessionToken, TEST_ACTOR_ID, TEST_ACTOR_IP, VipCustomer, register_fixtures,
    test_recorder, test_registry,
};

// Mocks
pub use crate::{FailingActor, MemoryEntityStore, RecordingEventStore, StaticActor, StoreFailure};

// Harness
pub use crate::init_test_tracing;
