//! Per-item processing: parse one document and emit its slices.

use std::path::Path;

use tracing::{debug, instrument};

use opws_builder_shared::{Representation, Result, Value};

use crate::context::{ArtifactTarget, BuildContext};
use crate::document;

/// Parse `raw` and schedule the item's enabled slice artifacts.
///
/// Returns the parsed value as soon as parsing is done; the writes finish in
/// the background. Returns `None` when no JSON-derived output is enabled, in
/// which case the document is not parsed at all.
#[instrument(skip_all, fields(collection = %collection, item = %name))]
pub async fn process(
    ctx: &BuildContext,
    collection: &str,
    name: &str,
    source: &Path,
    raw: Vec<u8>,
) -> Result<Option<Value>> {
    let outputs = ctx.outputs;
    let value = if outputs.needs_parse() {
        Some(document::parse(source, &raw)?)
    } else {
        None
    };

    let dir = ctx.build_dir.join(collection);

    if let Some(value) = &value {
        let virtual_stem = format!("{collection}/{name}");
        let target = ArtifactTarget {
            dir: &dir,
            stem: name,
            virtual_stem: &virtual_stem,
        };
        ctx.emit_value(value, &target, outputs.json_slices, outputs.jsonp_slices)
            .await?;
    }

    if outputs.raw_slices {
        let path = dir.join(format!("{name}.{}", Representation::Raw.extension()));
        ctx.writes.schedule(path, raw).await;
    }

    debug!("item processed");
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use opws_builder_shared::{BuildError, BuilderConfig};

    use crate::fs::Filesystem;
    use crate::testing::MemoryFs;

    fn context(fs: &Arc<MemoryFs>, config: &BuilderConfig) -> BuildContext {
        BuildContext::new(config, "v0.1", "2026-10-19T12:00:00.000Z".into(), fs.clone())
    }

    fn config() -> BuilderConfig {
        BuilderConfig {
            out_dir: "out".into(),
            ..BuilderConfig::default()
        }
    }

    #[tokio::test]
    async fn emits_all_slices() {
        let fs = Arc::new(MemoryFs::new());
        fs.ensure_dir(Path::new("out/v0.1/latest/profiles")).await.unwrap();
        let ctx = context(&fs, &config());

        let value = process(&ctx, "profiles", "a", Path::new("profiles/a.yaml"), b"x: 1\n".to_vec())
            .await
            .unwrap();
        assert!(value.is_some());
        assert_eq!(ctx.writes.drain().await.unwrap(), 3);

        assert_eq!(fs.text("out/v0.1/latest/profiles/a.json"), r#"{"x":1}"#);
        assert_eq!(
            fs.text("out/v0.1/latest/profiles/a.jsonp"),
            r#"opws_jsonp_response({"x":1},{"domain":"builds.opws.org","filename":"/v0.1/latest/profiles/a.jsonp"})"#
        );
        assert_eq!(fs.text("out/v0.1/latest/profiles/a.yaml"), "x: 1\n");
    }

    #[tokio::test]
    async fn raw_copy_skips_parsing() {
        let fs = Arc::new(MemoryFs::new());
        fs.ensure_dir(Path::new("out/v0.1/latest/profiles")).await.unwrap();
        let config = BuilderConfig {
            json_slices: false,
            jsonp_slices: false,
            json_bundles: false,
            jsonp_bundles: false,
            ..config()
        };
        let ctx = context(&fs, &config);

        let value = process(&ctx, "profiles", "bad", Path::new("profiles/bad.yaml"), b"x: [\n".to_vec())
            .await
            .unwrap();
        assert!(value.is_none());
        ctx.writes.drain().await.unwrap();
        assert_eq!(
            fs.files_under("out/v0.1/latest").into_iter().collect::<Vec<_>>(),
            vec!["profiles/bad.yaml"]
        );
    }

    #[tokio::test]
    async fn parse_failure_writes_nothing() {
        let fs = Arc::new(MemoryFs::new());
        fs.ensure_dir(Path::new("out/v0.1/latest/profiles")).await.unwrap();
        let ctx = context(&fs, &config());

        let err = process(&ctx, "profiles", "bad", Path::new("profiles/bad.yaml"), b"x: [\n".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::Parse { .. }));
        assert_eq!(ctx.writes.drain().await.unwrap(), 0);
        assert_eq!(fs.write_count(), 0);
    }
}
