//! Input resolver (component D, §4.2).
//!
//! Purely read-only: expands an [`Input`] into a list of concrete file
//! paths. Never touches the cache.

use crate::error::{PipelineError, Result};
use crate::node::{Input, NodeOutput, NodeOutputRef};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// What a resolver needs from its caller: the outputs produced so far by
/// upstream nodes, and the two path roots used to build the extended glob
/// accommodation (§4.2 rule 1).
pub trait OutputsLookup {
    fn get_node_outputs(&self, name: &str) -> Option<&[NodeOutput]>;
    fn root_dir(&self) -> &Path;
    fn build_dir(&self) -> &Path;
}

/// Resolves `input` into an ordered, duplicate-free list of paths.
pub fn resolve(input: &Input, lookup: &dyn OutputsLookup, node_name: &str) -> Result<Vec<PathBuf>> {
    match input {
        Input::NodeOutputRef(node_output_ref) => {
            resolve_node_output_ref(node_output_ref, lookup, node_name)
        }
        Input::Glob(pattern) => resolve_glob(pattern, lookup, node_name),
        Input::List(items) => {
            let mut seen = HashSet::new();
            let mut out = Vec::new();
            for item in items {
                for path in resolve(item, lookup, node_name)? {
                    if seen.insert(path.clone()) {
                        out.push(path);
                    }
                }
            }
            Ok(out)
        }
    }
}

fn resolve_node_output_ref(
    node_output_ref: &NodeOutputRef,
    lookup: &dyn OutputsLookup,
    node_name: &str,
) -> Result<Vec<PathBuf>> {
    let missing = || {
        PipelineError::resolution(
            node_name,
            format!(
                "node '{}' hasn't run or produced no outputs under '{}'",
                node_output_ref.node, node_output_ref.key
            ),
        )
    };

    let outputs = lookup.get_node_outputs(&node_output_ref.node).ok_or_else(missing)?;

    let mut seen = HashSet::new();
    let mut paths = Vec::new();
    for entry in outputs {
        if let Some(produced) = entry.get(&node_output_ref.key) {
            for path in produced {
                if seen.insert(path.clone()) {
                    paths.push(path.clone());
                }
            }
        }
    }
    if paths.is_empty() {
        return Err(missing());
    }

    let Some(glob_pattern) = &node_output_ref.glob else {
        return Ok(paths);
    };

    let primary = glob::Pattern::new(glob_pattern)
        .map_err(|err| PipelineError::resolution(node_name, err))?;
    // Accommodate outputs produced into the default build tree: the stored
    // paths may already carry a `<buildDir>/<anyNode>/` prefix the author's
    // glob never anticipated.
    let extended_source = format!("{}/*/{}", lookup.build_dir().display(), glob_pattern);
    let extended = glob::Pattern::new(&extended_source).ok();

    let filtered: Vec<PathBuf> = paths
        .iter()
        .filter(|path| {
            let rendered = path.to_string_lossy();
            primary.matches(&rendered)
                || extended.as_ref().is_some_and(|pattern| pattern.matches(&rendered))
        })
        .cloned()
        .collect();

    if filtered.is_empty() {
        return Err(PipelineError::resolution(
            node_name,
            format!("glob '{glob_pattern}' matched none of: {paths:?}"),
        ));
    }

    Ok(filtered)
}

fn resolve_glob(pattern: &str, lookup: &dyn OutputsLookup, node_name: &str) -> Result<Vec<PathBuf>> {
    let joined = lookup.root_dir().join(pattern);
    let pattern_str = joined.to_string_lossy().into_owned();

    let entries = glob::glob(&pattern_str).map_err(|err| PipelineError::resolution(node_name, err))?;

    let mut matches: Vec<PathBuf> = entries.filter_map(|entry| entry.ok()).collect();
    if matches.is_empty() {
        return Err(PipelineError::resolution(
            node_name,
            format!("No files found for pattern: {pattern}"),
        ));
    }
    matches.sort();
    Ok(matches)
}
