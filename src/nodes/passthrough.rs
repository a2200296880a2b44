//! `PassthroughComposite`: a composite node that registers an internal
//! `CopyNode` the moment it is added to the pipeline and forwards the
//! sub-node's outputs under a mapped key. Composites never call
//! `with_cache` themselves — caching happens entirely at the sub-node level,
//! so wrapping a node in a composite must never change the content
//! signatures downstream consumers compute from its output paths.

use crate::context::PipelineContext;
use crate::error::{NodeError, PipelineError};
use crate::node::{ConfigValue, Input, Node, NodeOutput};
use crate::nodes::CopyNode;
use crate::pipeline::Pipeline;
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct PassthroughComposite {
    name: String,
    inner: Arc<CopyNode>,
    output_mappings: BTreeMap<String, String>,
}

impl PassthroughComposite {
    pub fn new(name: impl Into<String>, items: Input) -> Self {
        let name = name.into();
        let inner_name = format!("{name}::copy");
        let inner = Arc::new(CopyNode::new(inner_name, items));
        let mut output_mappings = BTreeMap::new();
        output_mappings.insert("default".to_string(), "default".to_string());
        Self { name, inner, output_mappings }
    }
}

impl Node for PassthroughComposite {
    fn name(&self) -> &str {
        &self.name
    }

    fn items(&self) -> Option<Input> {
        None
    }

    fn config(&self) -> BTreeMap<String, ConfigValue> {
        BTreeMap::new()
    }

    fn explicit_dependencies(&self) -> Vec<String> {
        vec![self.inner.name().to_string()]
    }

    fn run(&self, ctx: &PipelineContext<'_>) -> Result<Vec<NodeOutput>, NodeError> {
        let sub_outputs = ctx.get_node_outputs(self.inner.name()).ok_or_else(|| -> NodeError {
            Box::new(PipelineError::resolution(
                self.name.clone(),
                format!("sub-node '{}' has not run", self.inner.name()),
            ))
        })?;

        let mapped = sub_outputs
            .iter()
            .map(|sub_output| {
                let mut out = NodeOutput::new();
                for (own_key, sub_key) in &self.output_mappings {
                    if let Some(paths) = sub_output.get(sub_key) {
                        out.insert(own_key.clone(), paths.clone());
                    }
                }
                out
            })
            .collect();

        Ok(mapped)
    }

    fn on_added_to_pipeline(&self, pipeline: &mut Pipeline) -> crate::error::Result<()> {
        pipeline.add_node_arc(self.inner.clone())
    }
}
