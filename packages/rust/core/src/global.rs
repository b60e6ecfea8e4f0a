//! Global aggregation: every collection bundle → `bundle.json`.

use futures::future::join_all;
use tracing::{error, info, instrument};

use opws_builder_shared::{BUILD_TIMESTAMP_KEY, BuildError, Bundle, Result, Value};

use crate::collection;
use crate::context::{ArtifactTarget, BuildContext};
use crate::pipeline::BuildReporter;
use crate::render;

/// File stem of the global bundle artifacts.
pub const GLOBAL_BUNDLE_STEM: &str = "bundle";

/// File stem of the standalone timestamp artifacts.
pub const TIMESTAMP_STEM: &str = "BUILD_TIMESTAMP";

/// Aggregate every collection into the global bundle and write it, followed
/// by the timestamp artifacts.
///
/// The bundle's first key is `BUILD_TIMESTAMP`; collections follow in name order.
/// `progress` hears about each collection as soon as its bundle is built.
#[instrument(skip_all, fields(version = %ctx.version, collections = collections.len()))]
pub async fn build(
    ctx: &BuildContext,
    collections: &[String],
    progress: &dyn BuildReporter,
) -> Result<Bundle> {
    let mut names: Vec<&str> = collections.iter().map(String::as_str).collect();
    names.sort_unstable();

    let results = join_all(names.iter().map(|name| async move {
        let result = collection::process(ctx, name).await;
        if let Ok(bundle) = &result {
            progress.collection_done(name, bundle.len());
        }
        result
    }))
    .await;

    let mut bundle = Bundle::new(GLOBAL_BUNDLE_STEM);
    bundle.insert(BUILD_TIMESTAMP_KEY, Value::String(ctx.timestamp.clone()))?;

    let mut errors = Vec::new();
    for (name, result) in names.iter().zip(results) {
        match result {
            Ok(member) => bundle.insert(*name, member.into_value())?,
            Err(e) => {
                error!(collection = %name, error = %e, "collection failed");
                errors.push(e);
            }
        }
    }
    if let Some(err) = BuildError::collect(errors) {
        return Err(err);
    }

    let target = ArtifactTarget {
        dir: &ctx.build_dir,
        stem: GLOBAL_BUNDLE_STEM,
        virtual_stem: GLOBAL_BUNDLE_STEM,
    };
    ctx.emit_value(
        &bundle,
        &target,
        ctx.outputs.json_bundles,
        ctx.outputs.jsonp_bundles,
    )
    .await?;

    write_timestamp_files(ctx).await?;

    info!(members = bundle.len() - 1, "global bundle built");
    Ok(bundle)
}

/// `BUILD_TIMESTAMP.txt` and `BUILD_TIMESTAMP.jsonp`, regardless of toggles.
async fn write_timestamp_files(ctx: &BuildContext) -> Result<()> {
    ctx.writes
        .schedule(
            ctx.timestamp_dir.join(format!("{TIMESTAMP_STEM}.txt")),
            ctx.timestamp.clone().into_bytes(),
        )
        .await;

    let wrapped = render::jsonp(
        &render::to_json(&ctx.timestamp)?,
        &ctx.domain,
        &ctx.version.virtual_path(&format!("{TIMESTAMP_STEM}.jsonp")),
    )?;
    ctx.writes
        .schedule(
            ctx.timestamp_dir.join(format!("{TIMESTAMP_STEM}.jsonp")),
            wrapped.into_bytes(),
        )
        .await;

    Ok(())
}
