//! Prelude module - commonly used types for convenient import.
//!
//! ```rust
//! use chronicle_config::prelude::*;
//! ```

pub use crate::{AuditSection, Config, ConfigError, ConfigResult, LoggingSection};
