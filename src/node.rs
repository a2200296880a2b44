//! The node/input/output data model (§3) and the node contract (§4.1).

use crate::context::PipelineContext;
use crate::error::NodeError;
use crate::pipeline::Pipeline;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// A stable, opaque handle to a single file on disk (§3). Created by the
/// pipeline author; never owned by a node.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FileRef {
    pub path: PathBuf,
}

impl FileRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// A reference to one keyed output set of another node, optionally narrowed
/// by a glob pattern (§3).
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct NodeOutputRef {
    pub node: String,
    pub key: String,
    pub glob: Option<String>,
}

impl NodeOutputRef {
    pub fn new(node: impl Into<String>, key: impl Into<String>) -> Self {
        Self { node: node.into(), key: key.into(), glob: None }
    }

    pub fn with_glob(mut self, glob: impl Into<String>) -> Self {
        self.glob = Some(glob.into());
        self
    }
}

/// A sum type over a node's variable input (§3, §9 design note): a single
/// glob string, a flattened list of `Input`, or an upstream output
/// reference.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Input {
    Glob(String),
    List(Vec<Input>),
    NodeOutputRef(NodeOutputRef),
}

impl Input {
    pub fn glob(pattern: impl Into<String>) -> Self {
        Self::Glob(pattern.into())
    }

    pub fn list(items: impl IntoIterator<Item = Input>) -> Self {
        Self::List(items.into_iter().collect())
    }

    pub fn from_node(node: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NodeOutputRef(NodeOutputRef::new(node, key))
    }
}

/// A processing-config value. Recognisable at runtime by structural shape;
/// any value a node's config maps to may be a plain scalar, a `FileRef`, or
/// a `NodeOutputRef` (§3).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConfigValue {
    Scalar(serde_json::Value),
    FileRef(FileRef),
    NodeOutputRef(NodeOutputRef),
}

impl ConfigValue {
    pub fn scalar(value: impl Serialize) -> Self {
        Self::Scalar(serde_json::to_value(value).unwrap_or(serde_json::Value::Null))
    }
}

/// One node's reported result for a processed item (or a single aggregate
/// entry for a no-items node): output key -> list of produced file paths.
pub type NodeOutput = BTreeMap<String, Vec<PathBuf>>;

/// The per-origin tag recorded for every tracked file in a [`crate::cache::CacheEntry`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackedOrigin {
    Item,
    FileRef,
    Discovered,
    /// Reserved for forward/schema compatibility with the persisted cache
    /// format (§3); the `with_cache` flow described in §4.6 never produces
    /// it itself. See DESIGN.md.
    Explicit,
}

/// The node contract (§4.1). Every concrete node implements this trait; the
/// engine only ever interacts with nodes through it.
pub trait Node: Send + Sync {
    fn name(&self) -> &str;

    /// The variable input the node iterates over, if any. `None` signals a
    /// "no-source" node driven entirely by its processing config (§4.6).
    fn items(&self) -> Option<Input>;

    /// Only this contributes to the node's content signature (§3).
    fn config(&self) -> BTreeMap<String, ConfigValue>;

    /// Presentation-only settings (output directory, filename mapping,
    /// extension); excluded from the content signature.
    fn output_config(&self) -> BTreeMap<String, serde_json::Value> {
        BTreeMap::new()
    }

    fn explicit_dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// The only method nodes must implement: produces the node's keyed
    /// output mappings, typically one per item.
    fn run(&self, ctx: &PipelineContext<'_>) -> std::result::Result<Vec<NodeOutput>, NodeError>;

    /// Hook allowing composite nodes (§4.8) to register their internal
    /// sub-nodes with `pipeline` at the moment they themselves are added.
    fn on_added_to_pipeline(&self, _pipeline: &mut Pipeline) -> crate::error::Result<()> {
        Ok(())
    }
}

impl<T: Node + ?Sized> Node for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn items(&self) -> Option<Input> {
        (**self).items()
    }

    fn config(&self) -> BTreeMap<String, ConfigValue> {
        (**self).config()
    }

    fn output_config(&self) -> BTreeMap<String, serde_json::Value> {
        (**self).output_config()
    }

    fn explicit_dependencies(&self) -> Vec<String> {
        (**self).explicit_dependencies()
    }

    fn run(&self, ctx: &PipelineContext<'_>) -> std::result::Result<Vec<NodeOutput>, NodeError> {
        (**self).run(ctx)
    }

    fn on_added_to_pipeline(&self, pipeline: &mut Pipeline) -> crate::error::Result<()> {
        (**self).on_added_to_pipeline(pipeline)
    }
}
