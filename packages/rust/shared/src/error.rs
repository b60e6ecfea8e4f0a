//! Error types for opws-builder.
//!
//! Library crates use [`BuildError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all build operations.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The dataset's `SCHEMA_VERSION` does not match the version this build expects.
    #[error("unexpected SCHEMA_VERSION in dataset: found {actual:?}, expected {expected:?}")]
    VersionMismatch { actual: String, expected: String },

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Reading an input file or listing an input directory failed.
    #[error("read failed at {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A document could not be parsed into the JSON value model.
    #[error("parse error in {path:?}: {message}")]
    Parse { path: PathBuf, message: String },

    /// Writing an artifact or creating an output directory failed.
    #[error("write failed at {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Two input files resolve to the same member name in one bundle.
    #[error("duplicate member {name:?} in {bundle}")]
    DuplicateMember { bundle: String, name: String },

    /// A value could not be serialized for output.
    #[error("render error: {0}")]
    Render(String),

    /// A concurrency limiter was closed while operations were queued.
    #[error("{0} limiter closed")]
    LimiterClosed(&'static str),

    /// A detached write task panicked or was aborted.
    #[error("write task failed: {0}")]
    Task(String),

    /// More than one branch of a fan-out failed.
    #[error("{} build steps failed:\n{}", .0.len(), list_errors(.0))]
    Aggregate(Vec<BuildError>),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BuildError>;

impl BuildError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error for the document at `path`.
    pub fn parse(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Wrap a read-side `std::io::Error` with its path.
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    /// Wrap a write-side `std::io::Error` with its path.
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    /// Fold the failures of one fan-out into a single error.
    ///
    /// Nested aggregates are flattened so the caller sees every leaf failure once.
    /// Returns `None` when `errors` is empty.
    pub fn collect(errors: Vec<BuildError>) -> Option<Self> {
        let mut flat: Vec<BuildError> = errors.into_iter().flat_map(Self::into_leaves).collect();
        match flat.len() {
            0 => None,
            1 => flat.pop(),
            _ => Some(Self::Aggregate(flat)),
        }
    }

    /// Combine two failures into one aggregate.
    pub fn merge(self, other: BuildError) -> Self {
        let mut flat = self.into_leaves();
        flat.extend(other.into_leaves());
        Self::Aggregate(flat)
    }

    fn into_leaves(self) -> Vec<BuildError> {
        match self {
            Self::Aggregate(inner) => inner,
            other => vec![other],
        }
    }

    /// Number of leaf failures carried by this error.
    pub fn failure_count(&self) -> usize {
        match self {
            Self::Aggregate(inner) => inner.len(),
            _ => 1,
        }
    }
}

fn list_errors(errors: &[BuildError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}
