//! The pipeline: node registration, graph construction, and sequential
//! execution (component G, §4.7).

use crate::cache::CacheStore;
use crate::context::PipelineContext;
use crate::error::{PipelineError, Result};
use crate::graph::{DependencyGraph, NodeMeta};
use crate::node::{Node, NodeOutput};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument};

pub struct Pipeline {
    nodes: BTreeMap<String, Arc<dyn Node>>,
    order: Vec<String>,
    explicit_dependencies: BTreeMap<String, Vec<String>>,
    outputs: BTreeMap<String, Vec<NodeOutput>>,
    pub cache: CacheStore,
    pub build_dir: PathBuf,
    pub root_dir: PathBuf,
}

impl Pipeline {
    pub fn new(root_dir: impl Into<PathBuf>, build_dir: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            nodes: BTreeMap::new(),
            order: Vec::new(),
            explicit_dependencies: BTreeMap::new(),
            outputs: BTreeMap::new(),
            cache: CacheStore::new(cache_dir),
            build_dir: build_dir.into(),
            root_dir: root_dir.into(),
        }
    }

    /// Builds a pipeline from a [`crate::config::PipelineOptions`], honouring
    /// its cache-enabled flag.
    pub fn from_options(options: crate::config::PipelineOptions) -> Self {
        let cache = if options.cache.enabled {
            CacheStore::new(options.cache.cache_dir)
        } else {
            CacheStore::disabled(options.cache.cache_dir)
        };
        Self {
            nodes: BTreeMap::new(),
            order: Vec::new(),
            explicit_dependencies: BTreeMap::new(),
            outputs: BTreeMap::new(),
            cache,
            build_dir: options.build_dir,
            root_dir: options.root_dir,
        }
    }

    /// Registers `node`, then calls its `on_added_to_pipeline` hook so
    /// composite nodes (§4.8) can register their sub-nodes in turn. The node
    /// is inserted before the hook runs, so the hook (and anything it
    /// registers) can already see it via `get_node_outputs`/the graph.
    pub fn add_node<N: Node + 'static>(&mut self, node: N) -> Result<()> {
        self.add_node_arc(Arc::new(node))
    }

    /// Same as [`Self::add_node`] but for an already-shared node, the shape
    /// composite nodes register their internal sub-nodes through.
    pub fn add_node_arc(&mut self, node: Arc<dyn Node>) -> Result<()> {
        let name = node.name().to_string();
        if self.nodes.contains_key(&name) {
            return Err(PipelineError::config(format!("duplicate node name: {name}")));
        }
        self.order.push(name.clone());
        self.nodes.insert(name, node.clone());

        node.on_added_to_pipeline(self)
    }

    pub fn add_explicit_dependency(&mut self, node: impl Into<String>, depends_on: impl Into<String>) {
        self.explicit_dependencies.entry(node.into()).or_default().push(depends_on.into());
    }

    pub fn get_node_outputs(&self, name: &str) -> Option<&[NodeOutput]> {
        self.outputs.get(name).map(|v| v.as_slice())
    }

    fn build_graph(&self) -> Result<DependencyGraph> {
        let metas: Vec<NodeMeta> = self
            .order
            .iter()
            .map(|name| {
                let node = &self.nodes[name];
                let mut explicit = node.explicit_dependencies();
                if let Some(extra) = self.explicit_dependencies.get(name) {
                    explicit.extend(extra.iter().cloned());
                }
                NodeMeta { name: name.clone(), items: node.items(), config: node.config(), explicit_dependencies: explicit }
            })
            .collect();
        DependencyGraph::build(&metas)
    }

    /// Builds the dependency graph, computes a topological order, and runs
    /// every node's `run` in that order, storing outputs for downstream
    /// resolution. Stops immediately on the first failure (§4.7, §7).
    #[instrument(skip(self))]
    pub fn run(&mut self) -> Result<()> {
        let graph = self.build_graph()?;
        let order = graph.topological_order();

        for node_name in order {
            let node = self.nodes[&node_name].clone();
            info!(node = node_name.as_str(), "running node");

            let ctx = PipelineContext::new(
                &node_name,
                &self.outputs,
                &self.cache,
                self.build_dir.clone(),
                self.root_dir.clone(),
            );

            let outputs = node.run(&ctx).map_err(|source| PipelineError::NodeFailed { node: node_name.clone(), source })?;
            self.outputs.insert(node_name, outputs);
        }

        Ok(())
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }
}
