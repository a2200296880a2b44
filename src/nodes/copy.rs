//! `CopyNode` (§4.9): copies each resolved input file verbatim to its build
//! path. Its processing config is empty beyond the items reference, so its
//! content signature depends only on the items specification.

use crate::context::PipelineContext;
use crate::error::NodeError;
use crate::node::{ConfigValue, Input, Node, NodeOutput};
use crate::runner::{with_cache, WorkOutcome};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub struct CopyNode {
    name: String,
    items: Input,
}

impl CopyNode {
    pub fn new(name: impl Into<String>, items: Input) -> Self {
        Self { name: name.into(), items }
    }
}

impl Node for CopyNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn items(&self) -> Option<Input> {
        Some(self.items.clone())
    }

    fn config(&self) -> BTreeMap<String, ConfigValue> {
        BTreeMap::new()
    }

    fn run(&self, ctx: &PipelineContext<'_>) -> Result<Vec<NodeOutput>, NodeError> {
        let sources = ctx.resolve_input(&self.items)?;
        let config = self.config();

        let results = with_cache(
            ctx,
            &self.name,
            "Copy",
            &config,
            Some(&self.items),
            &sources,
            |source: &PathBuf| crate::hash::make_item_key(&[source]),
            |source: &PathBuf| vec![source.clone()],
            |source: &PathBuf| ctx.get_build_path(&self.name, source, None),
            |source, output_path| {
                crate::utils::copy_file(source, output_path)?;
                Ok(WorkOutcome::default())
            },
        )?;

        Ok(results.into_iter().map(|result| result.output).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStore;
    use std::collections::BTreeMap as Map;

    #[test]
    fn copies_each_resolved_file_and_caches_on_second_run() {
        let dir = tempfile::tempdir().unwrap();
        let src_dir = dir.path().join("src");
        std::fs::create_dir_all(&src_dir).unwrap();
        std::fs::write(src_dir.join("a.xml"), b"<a/>").unwrap();

        let node = CopyNode::new("copy", Input::glob("src/*.xml"));
        let cache = CacheStore::new(dir.path().join("cache"));
        let build_dir = dir.path().join("build");

        let outputs_first: Map<String, Vec<NodeOutput>> = Map::new();
        let ctx = PipelineContext::new("copy", &outputs_first, &cache, build_dir.clone(), dir.path().to_path_buf());
        let result = node.run(&ctx).unwrap();
        let produced = &result[0]["default"];
        assert_eq!(produced.len(), 1);
        assert!(produced[0].exists());

        // Second run should hit the cache; output file still present.
        let result_second = node.run(&ctx).unwrap();
        assert_eq!(result_second[0]["default"], result[0]["default"]);
    }
}
