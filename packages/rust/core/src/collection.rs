//! Collection aggregation: every item of one directory → one bundle.

use futures::future::join_all;
use tracing::{error, info, instrument};

use opws_builder_shared::{BuildError, Bundle, Representation, Result, Value};

use crate::context::{ArtifactTarget, BuildContext};
use crate::item;

/// Member name for an input file: the file name without its `.yaml` suffix.
pub fn item_name(file_name: &str) -> &str {
    file_name
        .strip_suffix(Representation::Raw.extension())
        .and_then(|stem| stem.strip_suffix('.'))
        .unwrap_or(file_name)
}

/// Process every item of `collection` and return its bundle.
///
/// Items are processed concurrently; the bundle is built only once all of them
/// have resolved. Every item failure is reported, and none of the bundle
/// artifacts are written if any item failed.
#[instrument(skip_all, fields(collection = %collection))]
pub async fn process(ctx: &BuildContext, collection: &str) -> Result<Bundle> {
    ctx.ensure_dir(&ctx.build_dir.join(collection)).await?;

    let source_dir = ctx.base_dir.join(collection);
    let files = ctx.list_files(&source_dir).await?;

    let mut items: Vec<(String, String)> = files
        .into_iter()
        .map(|file| (item_name(&file).to_string(), file))
        .collect();
    items.sort();

    if let Some(pair) = items.windows(2).find(|pair| pair[0].0 == pair[1].0) {
        return Err(BuildError::DuplicateMember {
            bundle: collection.to_string(),
            name: pair[0].0.clone(),
        });
    }

    let source_dir = &source_dir;
    let results = join_all(items.iter().map(|(name, file)| async move {
        let path = source_dir.join(file);
        let raw = ctx.read(&path).await?;
        item::process(ctx, collection, name, &path, raw).await
    }))
    .await;

    let mut bundle = Bundle::new(collection);
    let mut errors = Vec::new();
    for ((name, _), result) in items.iter().zip(results) {
        match result {
            // Unparsed items still occupy their key.
            Ok(value) => bundle.insert(name.clone(), value.unwrap_or(Value::Null))?,
            Err(e) => {
                error!(item = %name, error = %e, "item failed");
                errors.push(e);
            }
        }
    }
    if let Some(err) = BuildError::collect(errors) {
        return Err(err);
    }

    let target = ArtifactTarget {
        dir: &ctx.build_dir,
        stem: collection,
        virtual_stem: collection,
    };
    ctx.emit_value(
        &bundle,
        &target,
        ctx.outputs.json_bundles,
        ctx.outputs.jsonp_bundles,
    )
    .await?;

    info!(items = bundle.len(), "collection bundled");
    Ok(bundle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Arc;

    use opws_builder_shared::BuilderConfig;

    use crate::fs::Filesystem;
    use crate::testing::MemoryFs;

    fn context(fs: &Arc<MemoryFs>) -> BuildContext {
        let config = BuilderConfig {
            base_dir: "data".into(),
            out_dir: "out".into(),
            ..BuilderConfig::default()
        };
        BuildContext::new(&config, "v0.1", "2026-10-19T12:00:00.000Z".into(), fs.clone())
    }

    #[test]
    fn item_names_strip_only_the_yaml_suffix() {
        assert_eq!(item_name("a.yaml"), "a");
        assert_eq!(item_name("a.b.yaml"), "a.b");
        assert_eq!(item_name("notes.txt"), "notes.txt");
        assert_eq!(item_name("yaml"), "yaml");
        assert_eq!(item_name("ayaml"), "ayaml");
    }

    #[tokio::test]
    async fn bundle_is_sorted_and_complete() {
        let fs = Arc::new(MemoryFs::new());
        fs.insert("data/profiles/b.yaml", "x: 2\n");
        fs.insert("data/profiles/a.yaml", "x: 1\n");
        fs.insert("data/profiles/c.yaml", "[1, 2]\n");
        let ctx = context(&fs);

        let bundle = process(&ctx, "profiles").await.unwrap();
        ctx.writes.drain().await.unwrap();

        assert_eq!(bundle.members().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(
            fs.text("out/v0.1/latest/profiles.json"),
            r#"{"a":{"x":1},"b":{"x":2},"c":[1,2]}"#
        );
        assert_eq!(
            fs.text("out/v0.1/latest/profiles.jsonp"),
            r#"opws_jsonp_response({"a":{"x":1},"b":{"x":2},"c":[1,2]},{"domain":"builds.opws.org","filename":"/v0.1/latest/profiles.jsonp"})"#
        );
    }

    #[tokio::test]
    async fn empty_collection_bundles_to_empty_map() {
        let fs = Arc::new(MemoryFs::new());
        fs.ensure_dir(Path::new("data/legacies")).await.unwrap();
        let ctx = context(&fs);

        let bundle = process(&ctx, "legacies").await.unwrap();
        ctx.writes.drain().await.unwrap();
        assert!(bundle.is_empty());
        assert_eq!(fs.text("out/v0.1/latest/legacies.json"), "{}");
    }

    #[tokio::test]
    async fn colliding_item_names_fail() {
        let fs = Arc::new(MemoryFs::new());
        fs.insert("data/profiles/a.yaml", "x: 1\n");
        fs.insert("data/profiles/a", "x: 2\n");
        let ctx = context(&fs);

        let err = process(&ctx, "profiles").await.unwrap_err();
        assert!(matches!(err, BuildError::DuplicateMember { ref name, .. } if name == "a"));
    }

    #[tokio::test]
    async fn failed_items_are_all_reported_and_siblings_still_write() {
        let fs = Arc::new(MemoryFs::new());
        fs.insert("data/profiles/good.yaml", "x: 1\n");
        fs.insert("data/profiles/bad.yaml", "x: [\n");
        fs.insert("data/profiles/locked.yaml", "x: 3\n");
        fs.fail("data/profiles/locked.yaml");
        let ctx = context(&fs);

        let err = process(&ctx, "profiles").await.unwrap_err();
        ctx.writes.drain().await.unwrap();

        assert_eq!(err.failure_count(), 2);
        assert!(fs.get("out/v0.1/latest/profiles/good.json").is_some());
        assert!(fs.get("out/v0.1/latest/profiles.json").is_none());
    }

    #[tokio::test]
    async fn missing_directory_is_a_read_failure() {
        let fs = Arc::new(MemoryFs::new());
        let ctx = context(&fs);
        let err = process(&ctx, "profiles").await.unwrap_err();
        assert!(matches!(err, BuildError::Read { .. }));
    }
}
