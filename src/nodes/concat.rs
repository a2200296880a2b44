//! `ConcatNode`: concatenates a fixed header with every file matched by a
//! glob into a single output file. It never iterates `items()` the way
//! `CopyNode` does; instead the whole resolved set collapses into one
//! synthetic cache entry, exercising the no-source degenerate case from the
//! cache wrapper (a node driven by its processing config rather than a
//! per-item input).

use crate::context::PipelineContext;
use crate::error::NodeError;
use crate::node::{ConfigValue, FileRef, Input, Node, NodeOutput};
use crate::runner::{with_cache, WorkOutcome};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct ConcatNode {
    name: String,
    header: FileRef,
    sources_glob: String,
    output_filename: String,
}

impl ConcatNode {
    pub fn new(
        name: impl Into<String>,
        header: FileRef,
        sources_glob: impl Into<String>,
        output_filename: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            header,
            sources_glob: sources_glob.into(),
            output_filename: output_filename.into(),
        }
    }
}

impl Node for ConcatNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn items(&self) -> Option<Input> {
        None
    }

    fn config(&self) -> BTreeMap<String, ConfigValue> {
        let mut config = BTreeMap::new();
        config.insert("header".to_string(), ConfigValue::FileRef(self.header.clone()));
        config.insert("sourcesGlob".to_string(), ConfigValue::scalar(self.sources_glob.clone()));
        config
    }

    fn run(&self, ctx: &PipelineContext<'_>) -> Result<Vec<NodeOutput>, NodeError> {
        let sources = ctx.resolve_input(&Input::glob(self.sources_glob.clone()))?;
        let config = self.config();
        let output_path = ctx.build_dir.join(&self.name).join(&self.output_filename);

        // A single synthetic item standing in for the whole resolved set.
        let items = vec![sources];

        let results = with_cache(
            ctx,
            &self.name,
            "Concat",
            &config,
            None,
            &items,
            |_item: &Vec<PathBuf>| crate::hash::make_item_key(&[Path::new(&self.output_filename)]),
            |item: &Vec<PathBuf>| item.clone(),
            |_item: &Vec<PathBuf>| output_path.clone(),
            |item, output_path| {
                let mut file = crate::utils::create_file(output_path)?;
                file.write_all(&std::fs::read(&self.header.path)?)?;
                for source in item {
                    file.write_all(&std::fs::read(source)?)?;
                }
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

    fn write(path: &Path, content: &[u8]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn concatenates_header_and_sources_into_one_output() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("header.txt"), b"HEAD;");
        write(&dir.path().join("src/a.txt"), b"A;");
        write(&dir.path().join("src/b.txt"), b"B;");

        let node = ConcatNode::new(
            "concat",
            FileRef::new(dir.path().join("header.txt")),
            "src/*.txt",
            "all.txt",
        );
        let cache = CacheStore::new(dir.path().join("cache"));
        let outputs: Map<String, Vec<NodeOutput>> = Map::new();
        let ctx =
            PipelineContext::new("concat", &outputs, &cache, dir.path().join("build"), dir.path().to_path_buf());

        let result = node.run(&ctx).unwrap();
        assert_eq!(result.len(), 1);
        let produced = &result[0]["default"][0];
        assert_eq!(std::fs::read_to_string(produced).unwrap(), "HEAD;A;B;");
    }

    #[test]
    fn second_run_with_no_changes_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("header.txt"), b"HEAD;");
        write(&dir.path().join("src/a.txt"), b"A;");

        let node =
            ConcatNode::new("concat", FileRef::new(dir.path().join("header.txt")), "src/*.txt", "all.txt");
        let cache = CacheStore::new(dir.path().join("cache"));
        let outputs: Map<String, Vec<NodeOutput>> = Map::new();
        let ctx =
            PipelineContext::new("concat", &outputs, &cache, dir.path().join("build"), dir.path().to_path_buf());

        let first = node.run(&ctx).unwrap();
        let second = node.run(&ctx).unwrap();
        assert_eq!(first[0]["default"], second[0]["default"]);
    }
}
