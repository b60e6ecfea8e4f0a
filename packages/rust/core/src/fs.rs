//! Filesystem capability used by the pipeline.
//!
//! Every read, listing and write the build performs goes through
//! [`Filesystem`], so tests can swap in an instrumented implementation.

use std::path::Path;

use async_trait::async_trait;
use tracing::warn;

use opws_builder_shared::{BuildError, Result};

/// The I/O surface of a build. Each call is independently failable.
#[async_trait]
pub trait Filesystem: Send + Sync {
    /// Read a whole file.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Create or truncate `path` and write `contents`.
    async fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;

    /// Names of the regular files directly inside `dir`, in listing order.
    async fn list_files(&self, dir: &Path) -> Result<Vec<String>>;

    /// Create `dir` and any missing parents.
    async fn ensure_dir(&self, dir: &Path) -> Result<()>;
}

/// The real filesystem, via `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

#[async_trait]
impl Filesystem for LocalFs {
    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .map_err(|e| BuildError::read(path, e))
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        tokio::fs::write(path, contents)
            .await
            .map_err(|e| BuildError::write(path, e))
    }

    async fn list_files(&self, dir: &Path) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| BuildError::read(dir, e))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| BuildError::read(dir, e))?
        {
            let path = entry.path();
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| BuildError::read(&path, e))?;
            // Symlinks count when they resolve to a file.
            let is_file = if file_type.is_symlink() {
                tokio::fs::metadata(&path)
                    .await
                    .map(|m| m.is_file())
                    .unwrap_or(false)
            } else {
                file_type.is_file()
            };
            if !is_file {
                warn!(path = %path.display(), "skipping non-file entry");
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => {
                    return Err(BuildError::read(
                        &path,
                        std::io::Error::new(
                            std::io::ErrorKind::InvalidData,
                            format!("file name {raw:?} is not valid UTF-8"),
                        ),
                    ));
                }
            }
        }
        Ok(names)
    }

    async fn ensure_dir(&self, dir: &Path) -> Result<()> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| BuildError::write(dir, e))
    }
}
