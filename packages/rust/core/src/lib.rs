//! Build pipeline for opws datasets.
//!
//! Turns a directory of YAML documents into per-item JSON, JSONP and raw
//! artifacts, one bundle per collection, and a global bundle stamped with the
//! build time (e.g., `run_build`).

pub mod collection;
pub mod context;
pub mod document;
pub mod fs;
pub mod global;
pub mod item;
pub mod limiter;
pub mod pipeline;
pub mod render;
pub mod version;

#[cfg(test)]
mod testing;

pub use fs::{Filesystem, LocalFs};
pub use pipeline::{BuildReporter, BuildSummary, SilentReporter, is_version_mismatch, run_build};
