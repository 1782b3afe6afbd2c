//! Chronicle Telemetry - Logging setup for the Chronicle audit engine.
//!
//! # Example
//!
//! ```rust,no_run
//! use chronicle_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), chronicle_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Json)
//!     .with_directive("chronicle_audit=debug");
//!
//! setup_logging(&config)?;
//! tracing::info!("recorder ready");
//! # Ok(())
//! # }
//! ```
//!
//! With the `config` feature, a `LogConfig` can be built from the
//! `[logging]` section of a loaded `chronicle_config::Config`.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, LogTarget, setup_default_logging, setup_logging};
