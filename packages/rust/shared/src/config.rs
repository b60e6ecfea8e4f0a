//! Build configuration for opws-builder.
//!
//! Config lives in `opws-builder.toml` in the working directory (or at a path
//! given on the command line). CLI flags override config file values, which
//! override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BuildError, Result};
use crate::types::OutputToggles;

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "opws-builder.toml";

/// Environment variable overriding `expectedVersion`.
pub const EXPECTED_VERSION_ENV: &str = "OPWS_EXPECTED_SCHEMA_VERSION";

/// Largest accepted `maxConcurrentReads` / `maxConcurrentWrites`
/// (tokio's semaphore permit ceiling).
pub const MAX_CONCURRENCY: usize = usize::MAX >> 3;

// ---------------------------------------------------------------------------
// Config struct (matching opws-builder.toml schema)
// ---------------------------------------------------------------------------

/// Everything one build needs to know, deserialized from TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuilderConfig {
    /// Dataset root holding `SCHEMA_VERSION` and one directory per collection.
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    /// Output root; artifacts land under `<outDir>/<tag>/latest/`.
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,

    /// Domain stamped into every JSONP envelope.
    #[serde(default = "default_build_domain")]
    pub build_domain: String,

    /// The only dataset `SCHEMA_VERSION` this builder accepts.
    #[serde(default = "default_expected_version")]
    pub expected_version: String,

    /// Collection directories to aggregate.
    #[serde(default = "default_collections")]
    pub collections: Vec<String>,

    /// Where to put the standalone `BUILD_TIMESTAMP` artifacts.
    /// Defaults to the versioned build directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_dir: Option<PathBuf>,

    /// Maximum simultaneous file reads.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_reads: usize,

    /// Maximum simultaneous file writes.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_writes: usize,

    #[serde(default = "default_true")]
    pub json_slices: bool,

    #[serde(default = "default_true")]
    pub jsonp_slices: bool,

    /// Verbatim copies of the input documents.
    #[serde(default = "default_true")]
    pub raw_slices: bool,

    #[serde(default = "default_true")]
    pub json_bundles: bool,

    #[serde(default = "default_true")]
    pub jsonp_bundles: bool,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            out_dir: default_out_dir(),
            build_domain: default_build_domain(),
            expected_version: default_expected_version(),
            collections: default_collections(),
            timestamp_dir: None,
            max_concurrent_reads: default_max_concurrent(),
            max_concurrent_writes: default_max_concurrent(),
            json_slices: true,
            jsonp_slices: true,
            raw_slices: true,
            json_bundles: true,
            jsonp_bundles: true,
        }
    }
}

fn default_base_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_out_dir() -> PathBuf {
    PathBuf::from("build")
}
fn default_build_domain() -> String {
    "builds.opws.org".into()
}
fn default_expected_version() -> String {
    "v0.1".into()
}
fn default_collections() -> Vec<String> {
    vec!["profiles".into(), "legacies".into()]
}
fn default_max_concurrent() -> usize {
    1000
}
fn default_true() -> bool {
    true
}

impl BuilderConfig {
    /// The per-level representation switches.
    pub fn outputs(&self) -> OutputToggles {
        OutputToggles {
            json_slices: self.json_slices,
            jsonp_slices: self.jsonp_slices,
            raw_slices: self.raw_slices,
            json_bundles: self.json_bundles,
            jsonp_bundles: self.jsonp_bundles,
        }
    }

    /// Reject settings no build can run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_reads == 0 {
            return Err(BuildError::config("maxConcurrentReads must be at least 1"));
        }
        if self.max_concurrent_writes == 0 {
            return Err(BuildError::config("maxConcurrentWrites must be at least 1"));
        }
        if self.max_concurrent_reads > MAX_CONCURRENCY {
            return Err(BuildError::config(format!(
                "maxConcurrentReads must be at most {MAX_CONCURRENCY}"
            )));
        }
        if self.max_concurrent_writes > MAX_CONCURRENCY {
            return Err(BuildError::config(format!(
                "maxConcurrentWrites must be at most {MAX_CONCURRENCY}"
            )));
        }
        if self.collections.is_empty() {
            return Err(BuildError::config("at least one collection is required"));
        }
        let mut seen = std::collections::HashSet::new();
        for name in &self.collections {
            if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
                return Err(BuildError::config(format!(
                    "invalid collection name {name:?}"
                )));
            }
            if name == crate::types::BUILD_TIMESTAMP_KEY {
                return Err(BuildError::config(format!(
                    "collection name {name:?} is reserved"
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(BuildError::config(format!(
                    "collection {name:?} listed twice"
                )));
            }
        }
        if self.expected_version.trim().is_empty() {
            return Err(BuildError::config("expectedVersion must not be empty"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the config. An explicit `path` must exist; otherwise `opws-builder.toml`
/// in the working directory is used if present, and defaults if not.
pub fn load_config(path: Option<&Path>) -> Result<BuilderConfig> {
    if let Some(path) = path {
        return load_config_from(path);
    }

    let path = Path::new(CONFIG_FILE_NAME);
    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(BuilderConfig::default());
    }

    load_config_from(path)
}

/// Load the config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<BuilderConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| BuildError::read(path, e))?;

    toml::from_str(&content)
        .map_err(|e| BuildError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Write a default config file into `dir`. Refuses to overwrite an existing one.
pub fn init_config(dir: &Path) -> Result<PathBuf> {
    let path = dir.join(CONFIG_FILE_NAME);
    if path.exists() {
        return Err(BuildError::config(format!(
            "{} already exists",
            path.display()
        )));
    }

    let content = toml::to_string_pretty(&BuilderConfig::default())
        .map_err(|e| BuildError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| BuildError::write(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
