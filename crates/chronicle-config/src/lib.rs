#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Layered configuration for the Chronicle audit engine.
//!
//! # Usage
//!
//! ```rust,no_run
//! use chronicle_config::Config;
//!
//! let config = Config::load(Some(std::path::Path::new("chronicle.toml"))).unwrap();
//! println!("exceptions recorded: {}", config.audit.record_exceptions);
//! ```
//!
//! # Configuration Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Config file** passed to [`Config::load`]
//! 2. **Environment variables** (`CHRONICLE_*`), fallback only
//! 3. **Embedded defaults** (`defaults.toml` compiled into the binary)
//!
//! This crate has no dependencies on other chronicle crates. Conversion into
//! recorder options and eligibility policies lives behind the `config`
//! feature of `chronicle-audit`.

/// Environment variable fallback resolution.
pub mod env;
/// Configuration error types.
pub mod error;
/// Configuration file loading.
pub mod loader;
/// Layered configuration merging.
pub mod merge;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub mod prelude;

pub use error::{ConfigError, ConfigResult};
pub use types::*;

impl Config {
    /// Load configuration from defaults, environment and an optional file.
    ///
    /// See [`loader::load`] for the layering.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file is unreadable or malformed, or
    /// the final configuration fails validation.
    pub fn load(path: Option<&std::path::Path>) -> ConfigResult<Self> {
        loader::load(path)
    }

    /// Load configuration with an explicit environment snapshot.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file is unreadable or malformed, or
    /// the final configuration fails validation.
    pub fn load_with_env(
        path: Option<&std::path::Path>,
        env: &std::collections::HashMap<String, String>,
    ) -> ConfigResult<Self> {
        loader::load_with_env(path, env)
    }

    /// Parse a TOML document layered over the defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the TOML is malformed or fails
    /// validation.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        loader::load_str(content)
    }
}
