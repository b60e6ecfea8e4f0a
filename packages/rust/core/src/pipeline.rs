//! End-to-end build: version gate → output dirs → bundles → flush writes.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{SecondsFormat, Utc};
use tracing::{error, info, instrument};

use opws_builder_shared::{BuildError, BuildVersion, BuilderConfig, Result, Value};

use crate::context::BuildContext;
use crate::fs::Filesystem;
use crate::{global, version};

/// Result of a successful build.
#[derive(Debug, Clone)]
pub struct BuildSummary {
    /// `<tag>/latest`.
    pub version: BuildVersion,
    /// The timestamp stamped into every artifact.
    pub timestamp: String,
    /// Where the versioned artifacts were written.
    pub build_dir: PathBuf,
    /// Item count per collection, in name order.
    pub collections: Vec<(String, usize)>,
    /// Number of files written.
    pub artifacts_written: usize,
    pub elapsed: Duration,
}

impl BuildSummary {
    pub fn item_count(&self) -> usize {
        self.collections.iter().map(|(_, n)| n).sum()
    }
}

/// Progress callback for reporting build status.
pub trait BuildReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called once per collection as soon as its bundle is built, while
    /// other collections may still be running.
    ///
    /// Not called for collections that failed.
    fn collection_done(&self, name: &str, items: usize);
    /// Called when the build completes successfully.
    fn done(&self, summary: &BuildSummary);
}

/// No-op reporter for headless/test usage.
pub struct SilentReporter;

impl BuildReporter for SilentReporter {
    fn phase(&self, _name: &str) {}
    fn collection_done(&self, _name: &str, _items: usize) {}
    fn done(&self, _summary: &BuildSummary) {}
}

/// Current time in the artifact timestamp format, e.g. `2026-10-19T12:00:00.000Z`.
pub fn capture_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Run one build.
///
/// 1. Read `SCHEMA_VERSION` and compare it with `expectedVersion`; nothing is
///    created on mismatch
/// 2. Create the versioned output directory
/// 3. Build every collection bundle and the global bundle
/// 4. Wait for every scheduled write, including those of failed branches
#[instrument(skip_all, fields(base_dir = %config.base_dir.display(), out_dir = %config.out_dir.display()))]
pub async fn run_build(
    config: &BuilderConfig,
    fs: Arc<dyn Filesystem>,
    progress: &dyn BuildReporter,
) -> Result<BuildSummary> {
    let start = Instant::now();
    config.validate()?;

    // --- Phase 1: Version gate ---
    progress.phase("Checking dataset version");
    let tag = version::read_version_tag(fs.as_ref(), &config.base_dir).await?;
    version::check(&tag, &config.expected_version)?;

    let ctx = BuildContext::new(config, &tag, capture_timestamp(), fs);
    info!(
        version = %ctx.version,
        timestamp = %ctx.timestamp,
        collections = config.collections.len(),
        "starting build"
    );

    // --- Phase 2: Output directories ---
    progress.phase("Preparing output directories");
    ctx.ensure_dir(&ctx.build_dir).await?;
    if ctx.timestamp_dir != ctx.build_dir {
        ctx.ensure_dir(&ctx.timestamp_dir).await?;
    }

    // --- Phase 3: Bundles ---
    progress.phase("Building bundles");
    let built = global::build(&ctx, &config.collections, progress).await;

    // --- Phase 4: Flush ---
    progress.phase("Flushing writes");
    let flushed = ctx.writes.drain().await;

    let (bundle, artifacts_written) = match (built, flushed) {
        (Ok(bundle), Ok(written)) => (bundle, written),
        (Err(e), Ok(_)) | (Ok(_), Err(e)) => {
            error!(failures = e.failure_count(), "build failed");
            return Err(e);
        }
        (Err(build_err), Err(write_err)) => {
            let e = build_err.merge(write_err);
            error!(failures = e.failure_count(), "build failed");
            return Err(e);
        }
    };

    let collections: Vec<(String, usize)> = bundle
        .members()
        .filter(|name| *name != opws_builder_shared::BUILD_TIMESTAMP_KEY)
        .map(|name| {
            let items = bundle.get(name).and_then(Value::as_map).map_or(0, |m| m.len());
            (name.to_string(), items)
        })
        .collect();

    let summary = BuildSummary {
        version: ctx.version.clone(),
        timestamp: ctx.timestamp.clone(),
        build_dir: ctx.build_dir.clone(),
        collections,
        artifacts_written,
        elapsed: start.elapsed(),
    };

    progress.done(&summary);

    info!(
        version = %summary.version,
        items = summary.item_count(),
        artifacts = summary.artifacts_written,
        elapsed_ms = summary.elapsed.as_millis(),
        "build complete"
    );

    Ok(summary)
}

/// Whether `err` is the pre-flight version mismatch.
pub fn is_version_mismatch(err: &BuildError) -> bool {
    matches!(err, BuildError::VersionMismatch { .. })
}
