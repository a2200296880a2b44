//! The pipeline context (component C, §4.3): the sole runtime surface
//! passed to a node's `run`.

use crate::cache::CacheStore;
use crate::error::Result;
use crate::node::{Input, NodeOutput};
use crate::resolver::{self, OutputsLookup};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct PipelineContext<'a> {
    current_node: &'a str,
    outputs: &'a BTreeMap<String, Vec<NodeOutput>>,
    pub cache: &'a CacheStore,
    pub build_dir: PathBuf,
    root_dir: PathBuf,
}

impl<'a> PipelineContext<'a> {
    pub fn new(
        current_node: &'a str,
        outputs: &'a BTreeMap<String, Vec<NodeOutput>>,
        cache: &'a CacheStore,
        build_dir: PathBuf,
        root_dir: PathBuf,
    ) -> Self {
        Self { current_node, outputs, cache, build_dir, root_dir }
    }

    /// Expands `input` into concrete file paths (§4.2).
    pub fn resolve_input(&self, input: &Input) -> Result<Vec<PathBuf>> {
        resolver::resolve(input, self, self.current_node).map_err(Into::into)
    }

    /// Emits a progress/diagnostic message tagged with the running node.
    pub fn log(&self, message: impl std::fmt::Display) {
        info!(node = self.current_node, "{message}");
    }

    pub fn get_node_outputs(&self, name: &str) -> Option<&[NodeOutput]> {
        self.outputs.get(name).map(|v| v.as_slice())
    }

    /// Canonical build-output path for `input_path` under this node (§4.3).
    pub fn get_build_path(&self, node_name: &str, input_path: &Path, new_ext: Option<&str>) -> PathBuf {
        let stripped = self.strip_build_prefix(input_path);
        let mut out = self.build_dir.join(node_name).join(stripped);
        if let Some(ext) = new_ext {
            out.set_extension(ext.trim_start_matches('.'));
        }
        out
    }

    /// Strips `build_dir` and its leading node-name segment from
    /// `input_path` if present; otherwise expresses the path relative to the
    /// project root (§4.3).
    pub fn strip_build_prefix(&self, input_path: &Path) -> PathBuf {
        if let Ok(under_build) = input_path.strip_prefix(&self.build_dir) {
            let mut components = under_build.components();
            components.next();
            components.as_path().to_path_buf()
        } else {
            crate::utils::source_name(input_path, &self.root_dir)
        }
    }
}

impl<'a> OutputsLookup for PipelineContext<'a> {
    fn get_node_outputs(&self, name: &str) -> Option<&[NodeOutput]> {
        PipelineContext::get_node_outputs(self, name)
    }

    fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn build_dir(&self) -> &Path {
        &self.build_dir
    }
}
