//! Dataset version gate.

use std::path::Path;

use opws_builder_shared::{BuildError, Result};

use crate::fs::Filesystem;

/// File at the dataset root holding its version tag.
pub const VERSION_FILE: &str = "SCHEMA_VERSION";

/// Read and trim the dataset's version tag.
pub async fn read_version_tag(fs: &dyn Filesystem, base_dir: &Path) -> Result<String> {
    let path = base_dir.join(VERSION_FILE);
    let raw = fs.read(&path).await?;
    let text = String::from_utf8(raw)
        .map_err(|e| BuildError::parse(&path, format!("not valid UTF-8: {e}")))?;
    Ok(text.trim().to_string())
}

/// Fail unless the dataset tag is exactly the one this build expects.
pub fn check(actual: &str, expected: &str) -> Result<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(BuildError::VersionMismatch {
            actual: actual.to_string(),
            expected: expected.to_string(),
        })
    }
}
