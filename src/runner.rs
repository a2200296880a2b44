//! The per-node cache wrapper (component F, `with_cache`, §4.6).
//!
//! This is the engine's hot path: every concrete node's `run` is expected to
//! delegate its per-item bookkeeping to [`with_cache`] rather than talk to
//! the cache store directly.

use crate::cache::{is_valid, CacheEntry, CacheStore, TrackedFileMeta, UpstreamOutputSignature};
use crate::context::PipelineContext;
use crate::error::NodeError;
use crate::hash::{compute_content_signature, upstream_set_signature};
use crate::node::{ConfigValue, Input, NodeOutput, TrackedOrigin};
use crate::resolver::OutputsLookup;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// What `perform_work` may report back about one item's execution.
#[derive(Default)]
pub struct WorkOutcome {
    /// Extra files discovered while performing the work (e.g. XSLT
    /// `document()` includes), tracked alongside the item itself.
    pub discovered_dependencies: Vec<PathBuf>,
    /// The output this item produced, if different from the default
    /// single-key convention the caller otherwise assumes.
    pub output: Option<NodeOutput>,
}

/// One row of the `with_cache` report (§4.6 step 6).
pub struct ItemRunResult {
    pub item_key: String,
    pub output: NodeOutput,
    pub cached: bool,
}

/// Runs `items` through the shared cache loop described in §4.6.
///
/// - `config`/`items_spec` feed the content signature and the upstream/
///   file-ref dependency walk.
/// - `cache_key(item)` derives a stable, unique item key.
/// - `item_source_paths(item)` are the item's own source file(s), tracked
///   with origin `item`.
/// - `output_path(item)` is the path the item's output is expected at for
///   *this* run (not necessarily where it was cached last time).
/// - `perform_work(item, output_path)` does the actual transform; returning
///   `Err` aborts the whole node (§7).
#[allow(clippy::too_many_arguments)]
pub fn with_cache<Item>(
    ctx: &PipelineContext<'_>,
    node_name: &str,
    kind_tag: &str,
    config: &BTreeMap<String, ConfigValue>,
    items_spec: Option<&Input>,
    items: &[Item],
    cache_key: impl Fn(&Item) -> String,
    item_source_paths: impl Fn(&Item) -> Vec<PathBuf>,
    output_path: impl Fn(&Item) -> PathBuf,
    mut perform_work: impl FnMut(&Item, &Path) -> Result<WorkOutcome, NodeError>,
) -> Result<Vec<ItemRunResult>, NodeError> {
    let content_signature = compute_content_signature(kind_tag, config, items_spec, ctx.root_dir());

    let config_file_refs = collect_config_file_refs(config);
    let upstream_signatures = collect_upstream_signatures(ctx, config, items_spec)?;

    // Hash every config-level file-ref once up front; a stylesheet shared by
    // thousands of items must not be re-hashed per item.
    let file_ref_hashes = hash_file_refs(&config_file_refs)?;

    let cache_keys: Vec<String> = items.iter().map(&cache_key).collect();
    ctx.cache.clean_except(content_signature.as_str(), &cache_keys)?;

    let mut results = Vec::with_capacity(items.len());

    for item in items {
        let item_key = cache_key(item);
        let expected_output_path = output_path(item);

        let cached = ctx.cache.get(content_signature.as_str(), &item_key);
        let reusable = cached
            .as_ref()
            .filter(|entry| is_valid(entry, ctx, node_name).is_valid());

        if let Some(entry) = reusable {
            let output = rebase_cached_outputs(ctx.cache, entry, &expected_output_path)?;
            debug!(node = node_name, item = item_key, "cache hit");
            results.push(ItemRunResult { item_key, output, cached: true });
            continue;
        }

        debug!(node = node_name, item = item_key, "cache miss, running work");
        let outcome = perform_work(item, &expected_output_path)?;

        let mut tracked_files = Vec::new();
        for path in item_source_paths(item) {
            tracked_files.push(TrackedFileMeta::capture(&path, TrackedOrigin::Item)?);
        }
        for (path, hash) in &file_ref_hashes {
            let metadata = std::fs::metadata(path)?;
            let last_modified_millis = metadata
                .modified()?
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64;
            tracked_files.push(TrackedFileMeta {
                path: path.clone(),
                origin: TrackedOrigin::FileRef,
                last_modified_millis,
                content_hash: hash.clone(),
            });
        }
        for discovered in &outcome.discovered_dependencies {
            tracked_files.push(TrackedFileMeta::capture(discovered, TrackedOrigin::Discovered)?);
        }

        let output = outcome.output.unwrap_or_else(|| {
            let mut default = NodeOutput::new();
            default.insert("default".to_string(), vec![expected_output_path.clone()]);
            default
        });

        let output_base_dir =
            expected_output_path.parent().map(Path::to_path_buf).unwrap_or_default();

        let entry = CacheEntry {
            content_signature: content_signature.as_str().to_string(),
            item_key: item_key.clone(),
            timestamp: crate::utils::now_millis(),
            upstream_signatures: upstream_signatures.clone(),
            tracked_files,
            outputs_by_key: output.clone(),
            output_base_dir,
        };
        ctx.cache.set(content_signature.as_str(), &item_key, &entry)?;

        results.push(ItemRunResult { item_key, output, cached: false });
    }

    Ok(results)
}

fn collect_config_file_refs(config: &BTreeMap<String, ConfigValue>) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = config
        .values()
        .filter_map(|value| match value {
            ConfigValue::FileRef(file_ref) => Some(file_ref.path.clone()),
            _ => None,
        })
        .collect();
    paths.sort();
    paths.dedup();
    paths
}

fn hash_file_refs(paths: &[PathBuf]) -> Result<Vec<(PathBuf, String)>, NodeError> {
    let mut out = Vec::with_capacity(paths.len());
    for path in paths {
        let hash = crate::hash::content_hash_of_file(path)?;
        out.push((path.clone(), hash));
    }
    Ok(out)
}

fn collect_upstream_signatures(
    ctx: &PipelineContext<'_>,
    config: &BTreeMap<String, ConfigValue>,
    items_spec: Option<&Input>,
) -> Result<Vec<UpstreamOutputSignature>, NodeError> {
    let mut refs = Vec::new();
    for value in config.values() {
        if let ConfigValue::NodeOutputRef(node_output_ref) = value {
            refs.push(node_output_ref.clone());
        }
    }
    if let Some(items_spec) = items_spec {
        collect_node_output_refs(items_spec, &mut refs);
    }

    let mut signatures = Vec::with_capacity(refs.len());
    for node_output_ref in refs {
        let paths = ctx.resolve_input(&Input::NodeOutputRef(node_output_ref.clone()))?;
        signatures.push(UpstreamOutputSignature {
            node: node_output_ref.node,
            output_key: node_output_ref.key,
            glob: node_output_ref.glob,
            signature: upstream_set_signature(&paths),
        });
    }
    Ok(signatures)
}

fn collect_node_output_refs(input: &Input, out: &mut Vec<crate::node::NodeOutputRef>) {
    match input {
        Input::Glob(_) => {}
        Input::List(items) => {
            for item in items {
                collect_node_output_refs(item, out);
            }
        }
        Input::NodeOutputRef(node_output_ref) => out.push(node_output_ref.clone()),
    }
}

/// Rebases a cache hit's recorded outputs onto the locations the current run
/// expects them at, copying artifacts as needed. A cache hit must report
/// paths the current run's caller can actually rely on, not wherever a prior
/// run (possibly under a since-changed build directory *or* output
/// extension — both presentation-only per spec.md I3) left them. Any path
/// mismatch triggers a copy; filename equality is never a precondition,
/// since changing only the output extension is exactly the kind of
/// presentation-only edit that must still rebase (§4.6 step 5).
fn rebase_cached_outputs(
    cache: &CacheStore,
    entry: &CacheEntry,
    expected_output_path: &Path,
) -> Result<NodeOutput, NodeError> {
    let mut rebased = entry.outputs_by_key.clone();
    let total_paths: usize = rebased.values().map(Vec::len).sum();

    if total_paths == 1 {
        // The common single-output convention (one item, one artifact): the
        // current expectation unconditionally replaces whatever path was
        // cached, regardless of directory or extension.
        for paths in rebased.values_mut() {
            for cached_path in paths.iter_mut() {
                if cached_path != expected_output_path {
                    cache.copy_to_expected_path(cached_path, expected_output_path)?;
                    *cached_path = expected_output_path.to_path_buf();
                }
            }
        }
        return Ok(rebased);
    }

    // Multiple tracked outputs (a custom multi-file `WorkOutcome::output`):
    // preserve each path's position relative to the entry's recorded
    // `output_base_dir`, rebasing that whole subtree onto the directory the
    // current run expects this item's output under.
    let expected_base = expected_output_path.parent().unwrap_or_else(|| Path::new(""));
    if entry.output_base_dir == expected_base {
        return Ok(rebased);
    }
    for paths in rebased.values_mut() {
        for cached_path in paths.iter_mut() {
            let relative = cached_path.strip_prefix(&entry.output_base_dir).unwrap_or(cached_path);
            let new_path = expected_base.join(relative);
            if &new_path != cached_path {
                cache.copy_to_expected_path(cached_path, &new_path)?;
                *cached_path = new_path;
            }
        }
    }
    Ok(rebased)
}

#[instrument(skip_all)]
pub fn collect_output_refs(outputs: &[NodeOutput], key: &str) -> Vec<PathBuf> {
    let mut seen = std::collections::HashSet::new();
    let mut paths = Vec::new();
    for output in outputs {
        if let Some(produced) = output.get(key) {
            for path in produced {
                if seen.insert(path.clone()) {
                    paths.push(path.clone());
                }
            }
        }
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::FileRef;
    use std::collections::BTreeMap;

    #[test]
    fn collect_config_file_refs_dedupes_and_sorts() {
        let mut config = BTreeMap::new();
        config.insert("a".to_string(), ConfigValue::FileRef(FileRef::new("/z.xsl")));
        config.insert("b".to_string(), ConfigValue::FileRef(FileRef::new("/a.xsl")));
        config.insert("c".to_string(), ConfigValue::FileRef(FileRef::new("/a.xsl")));
        let refs = collect_config_file_refs(&config);
        assert_eq!(refs, vec![PathBuf::from("/a.xsl"), PathBuf::from("/z.xsl")]);
    }

    #[test]
    fn collect_output_refs_flattens_and_dedupes() {
        let mut a = NodeOutput::new();
        a.insert("default".to_string(), vec![PathBuf::from("x"), PathBuf::from("y")]);
        let mut b = NodeOutput::new();
        b.insert("default".to_string(), vec![PathBuf::from("y")]);
        let refs = collect_output_refs(&[a, b], "default");
        assert_eq!(refs, vec![PathBuf::from("x"), PathBuf::from("y")]);
    }
}
