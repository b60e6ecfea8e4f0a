//! In-memory filesystem for pipeline tests.
//!
//! Counts in-flight reads and writes, can be told to fail specific paths, and
//! lists directories in reverse name order so tests notice any dependence on
//! listing order.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use opws_builder_shared::{BuildError, Result};

use crate::fs::Filesystem;

#[derive(Default)]
pub(crate) struct MemoryFs {
    files: Mutex<BTreeMap<PathBuf, Vec<u8>>>,
    dirs: Mutex<BTreeSet<PathBuf>>,
    failing: Mutex<HashSet<PathBuf>>,
    reads_in_flight: AtomicUsize,
    peak_reads: AtomicUsize,
    writes_in_flight: AtomicUsize,
    peak_writes: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryFs {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Seed an input file (its parent directories are created too).
    pub(crate) fn insert(&self, path: impl AsRef<Path>, contents: impl AsRef<[u8]>) {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            self.add_dir_all(parent);
        }
        self.files
            .lock()
            .unwrap()
            .insert(path, contents.as_ref().to_vec());
    }

    /// Make every read or write of `path` fail.
    pub(crate) fn fail(&self, path: impl AsRef<Path>) {
        self.failing
            .lock()
            .unwrap()
            .insert(path.as_ref().to_path_buf());
    }

    pub(crate) fn get(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path.as_ref()).cloned()
    }

    pub(crate) fn text(&self, path: impl AsRef<Path>) -> String {
        let path = path.as_ref();
        let bytes = self
            .get(path)
            .unwrap_or_else(|| panic!("no file at {}", path.display()));
        String::from_utf8(bytes).unwrap()
    }

    /// Paths of every file under `root`, relative to it, with `/` separators.
    pub(crate) fn files_under(&self, root: impl AsRef<Path>) -> BTreeSet<String> {
        let root = root.as_ref();
        self.files
            .lock()
            .unwrap()
            .keys()
            .filter_map(|p| p.strip_prefix(root).ok())
            .map(|p| {
                p.components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .collect()
    }

    pub(crate) fn has_dir(&self, path: impl AsRef<Path>) -> bool {
        self.dirs.lock().unwrap().contains(path.as_ref())
    }

    pub(crate) fn dir_count(&self) -> usize {
        self.dirs.lock().unwrap().len()
    }

    pub(crate) fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub(crate) fn peak_reads(&self) -> usize {
        self.peak_reads.load(Ordering::SeqCst)
    }

    pub(crate) fn peak_writes(&self) -> usize {
        self.peak_writes.load(Ordering::SeqCst)
    }

    fn add_dir_all(&self, dir: &Path) {
        let mut dirs = self.dirs.lock().unwrap();
        for ancestor in dir.ancestors() {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            dirs.insert(ancestor.to_path_buf());
        }
    }

    fn is_failing(&self, path: &Path) -> bool {
        self.failing.lock().unwrap().contains(path)
    }

    async fn hold(in_flight: &AtomicUsize, peak: &AtomicUsize) {
        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(1)).await;
        in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

fn io_error(kind: std::io::ErrorKind, msg: &str) -> std::io::Error {
    std::io::Error::new(kind, msg.to_string())
}

#[async_trait]
impl Filesystem for MemoryFs {
    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        Self::hold(&self.reads_in_flight, &self.peak_reads).await;
        if self.is_failing(path) {
            return Err(BuildError::read(
                path,
                io_error(std::io::ErrorKind::PermissionDenied, "injected failure"),
            ));
        }
        self.get(path).ok_or_else(|| {
            BuildError::read(path, io_error(std::io::ErrorKind::NotFound, "no such file"))
        })
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        Self::hold(&self.writes_in_flight, &self.peak_writes).await;
        if self.is_failing(path) {
            return Err(BuildError::write(
                path,
                io_error(std::io::ErrorKind::PermissionDenied, "injected failure"),
            ));
        }
        let parent_exists = path.parent().is_none_or(|p| self.has_dir(p));
        if !parent_exists {
            return Err(BuildError::write(
                path,
                io_error(std::io::ErrorKind::NotFound, "parent directory missing"),
            ));
        }
        self.files
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), contents.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list_files(&self, dir: &Path) -> Result<Vec<String>> {
        Self::hold(&self.reads_in_flight, &self.peak_reads).await;
        if !self.has_dir(dir) || self.is_failing(dir) {
            return Err(BuildError::read(
                dir,
                io_error(std::io::ErrorKind::NotFound, "no such directory"),
            ));
        }
        let mut names: Vec<String> = self
            .files
            .lock()
            .unwrap()
            .keys()
            .filter(|p| p.parent() == Some(dir))
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        names.reverse();
        Ok(names)
    }

    async fn ensure_dir(&self, dir: &Path) -> Result<()> {
        if self.is_failing(dir) {
            return Err(BuildError::write(
                dir,
                io_error(std::io::ErrorKind::PermissionDenied, "injected failure"),
            ));
        }
        self.add_dir_all(dir);
        Ok(())
    }
}
