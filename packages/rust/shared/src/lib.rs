//! Shared types, error model, and configuration for opws-builder.
//!
//! This crate is the foundation depended on by the other workspace crates.
//! It provides:
//! - [`BuildError`], the unified error type
//! - Domain types ([`Value`], [`Bundle`], [`BuildVersion`], [`Representation`])
//! - Configuration ([`BuilderConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    BuilderConfig, CONFIG_FILE_NAME, EXPECTED_VERSION_ENV, init_config, load_config,
    load_config_from,
};
pub use error::{BuildError, Result};
pub use types::{
    BUILD_TIMESTAMP_KEY, BuildVersion, Bundle, Map, OutputToggles, Representation, Value,
};
