//! Per-build state shared read-only by every pipeline stage.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use opws_builder_shared::{
    BuildError, BuildVersion, BuilderConfig, OutputToggles, Representation, Result,
};

use crate::fs::Filesystem;
use crate::limiter::ConcurrencyLimiter;
use crate::render;

/// Everything a stage needs to know about the build it belongs to.
pub struct BuildContext {
    /// `<tag>/latest`.
    pub version: BuildVersion,
    /// Captured once at build start; shared by every artifact.
    pub timestamp: String,
    /// Domain stamped into JSONP envelopes.
    pub domain: String,
    /// Dataset root.
    pub base_dir: PathBuf,
    /// `<outDir>/<tag>/latest`.
    pub build_dir: PathBuf,
    /// Directory receiving the standalone timestamp artifacts.
    pub timestamp_dir: PathBuf,
    pub outputs: OutputToggles,
    pub fs: Arc<dyn Filesystem>,
    pub reads: ConcurrencyLimiter,
    pub writes: WriteTracker,
}

/// Where a rendered value goes: `<dir>/<stem>.<ext>`, published as
/// `/<version>/<virtual_stem>.<ext>`.
#[derive(Debug, Clone)]
pub struct ArtifactTarget<'a> {
    pub dir: &'a Path,
    pub stem: &'a str,
    pub virtual_stem: &'a str,
}

impl BuildContext {
    pub fn new(
        config: &BuilderConfig,
        tag: &str,
        timestamp: String,
        fs: Arc<dyn Filesystem>,
    ) -> Self {
        let version = BuildVersion::from_tag(tag);
        let build_dir = config
            .out_dir
            .join(version.tag())
            .join(opws_builder_shared::types::LATEST_SEGMENT);
        let timestamp_dir = config
            .timestamp_dir
            .clone()
            .unwrap_or_else(|| build_dir.clone());

        Self {
            version,
            timestamp,
            domain: config.build_domain.clone(),
            base_dir: config.base_dir.clone(),
            build_dir,
            timestamp_dir,
            outputs: config.outputs(),
            reads: ConcurrencyLimiter::new("read", config.max_concurrent_reads),
            writes: WriteTracker::new(fs.clone(), config.max_concurrent_writes),
            fs,
        }
    }

    /// Read a file through the read limiter.
    pub async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.reads.schedule(self.fs.read(path)).await
    }

    /// List a directory through the read limiter.
    pub async fn list_files(&self, dir: &Path) -> Result<Vec<String>> {
        self.reads.schedule(self.fs.list_files(dir)).await
    }

    /// Create an output directory and its parents.
    pub async fn ensure_dir(&self, dir: &Path) -> Result<()> {
        self.fs.ensure_dir(dir).await
    }

    /// Render `value` as JSON and/or JSONP and schedule the writes.
    pub async fn emit_value<T: Serialize + ?Sized>(
        &self,
        value: &T,
        target: &ArtifactTarget<'_>,
        json: bool,
        jsonp: bool,
    ) -> Result<()> {
        if !json && !jsonp {
            return Ok(());
        }

        let payload = render::to_json(value)?;

        if jsonp {
            let ext = Representation::Jsonp.extension();
            let filename = self
                .version
                .virtual_path(&format!("{}.{ext}", target.virtual_stem));
            let wrapped = render::jsonp(&payload, &self.domain, &filename)?;
            self.writes
                .schedule(
                    target.dir.join(format!("{}.{ext}", target.stem)),
                    wrapped.into_bytes(),
                )
                .await;
        }

        if json {
            let ext = Representation::Json.extension();
            self.writes
                .schedule(
                    target.dir.join(format!("{}.{ext}", target.stem)),
                    payload.into_bytes(),
                )
                .await;
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// WriteTracker
// ---------------------------------------------------------------------------

/// Detached artifact writes, bounded by the write limiter.
///
/// Scheduling returns immediately; the build awaits everything via
/// [`WriteTracker::drain`] before it reports.
pub struct WriteTracker {
    fs: Arc<dyn Filesystem>,
    limiter: Arc<ConcurrencyLimiter>,
    pending: Mutex<Vec<JoinHandle<Result<()>>>>,
    written: Arc<AtomicUsize>,
}

impl WriteTracker {
    pub fn new(fs: Arc<dyn Filesystem>, capacity: usize) -> Self {
        Self {
            fs,
            limiter: Arc::new(ConcurrencyLimiter::new("write", capacity)),
            pending: Mutex::new(Vec::new()),
            written: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Artifacts successfully written so far.
    pub fn written(&self) -> usize {
        self.written.load(Ordering::SeqCst)
    }

    /// Queue a write of `contents` to `path`.
    pub async fn schedule(&self, path: PathBuf, contents: Vec<u8>) {
        let fs = self.fs.clone();
        let limiter = self.limiter.clone();
        let written = self.written.clone();

        let handle = tokio::spawn(async move {
            match limiter.schedule(fs.write(&path, &contents)).await {
                Ok(()) => {
                    written.fetch_add(1, Ordering::SeqCst);
                    debug!(path = %path.display(), bytes = contents.len(), "wrote artifact");
                    Ok(())
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "artifact write failed");
                    Err(e)
                }
            }
        });

        self.pending.lock().await.push(handle);
    }

    /// Wait for every scheduled write. Returns the number written, or every
    /// write failure.
    pub async fn drain(&self) -> Result<usize> {
        let mut errors = Vec::new();
        loop {
            let batch = std::mem::take(&mut *self.pending.lock().await);
            if batch.is_empty() {
                break;
            }
            for handle in batch {
                match handle.await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => errors.push(e),
                    Err(join_err) => errors.push(BuildError::Task(join_err.to_string())),
                }
            }
        }

        match BuildError::collect(errors) {
            Some(err) => Err(err),
            None => Ok(self.written()),
        }
    }
}
