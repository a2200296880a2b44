//! Four-tier cache validation (§4.5).
//!
//! Checks run cheapest-first; the first failure short-circuits the rest.

use super::CacheEntry;
use crate::hash::{content_hash_of_file, upstream_set_signature};
use crate::node::NodeOutputRef;
use crate::resolver::{self, OutputsLookup};
use tracing::trace;

/// Why a cache entry was judged invalid, for diagnostics/logging. The
/// wrapper only cares about the boolean, but keeping the reason around makes
/// `cache miss` log lines useful.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationOutcome {
    Valid,
    UpstreamNotRun,
    UpstreamSetChanged,
    TrackedFileMissing,
    TrackedFileChanged,
    OutputMissing,
}

impl ValidationOutcome {
    pub fn is_valid(self) -> bool {
        matches!(self, ValidationOutcome::Valid)
    }
}

/// Runs the four ordered checks from §4.5 against `entry`.
pub fn is_valid(entry: &CacheEntry, lookup: &dyn OutputsLookup, node_name: &str) -> ValidationOutcome {
    match check_upstream_signatures(entry, lookup, node_name) {
        outcome @ (ValidationOutcome::UpstreamNotRun | ValidationOutcome::UpstreamSetChanged) => {
            trace!(?outcome, node = node_name, "cache miss: upstream set check failed");
            return outcome;
        }
        ValidationOutcome::Valid => {}
        _ => unreachable!("check_upstream_signatures only returns Valid or its own failure modes"),
    }

    if let Some(outcome) = check_tracked_files(entry) {
        trace!(?outcome, node = node_name, "cache miss: tracked file check failed");
        return outcome;
    }

    if let Some(outcome) = check_outputs_exist(entry) {
        trace!(?outcome, node = node_name, "cache miss: output existence check failed");
        return outcome;
    }

    ValidationOutcome::Valid
}

fn check_upstream_signatures(
    entry: &CacheEntry,
    lookup: &dyn OutputsLookup,
    node_name: &str,
) -> ValidationOutcome {
    for recorded in &entry.upstream_signatures {
        let node_output_ref = NodeOutputRef {
            node: recorded.node.clone(),
            key: recorded.output_key.clone(),
            glob: recorded.glob.clone(),
        };
        let resolved = match resolver::resolve(
            &crate::node::Input::NodeOutputRef(node_output_ref),
            lookup,
            node_name,
        ) {
            Ok(paths) => paths,
            Err(_) => return ValidationOutcome::UpstreamNotRun,
        };
        let current = upstream_set_signature(&resolved);
        if current != recorded.signature {
            return ValidationOutcome::UpstreamSetChanged;
        }
    }
    ValidationOutcome::Valid
}

fn check_tracked_files(entry: &CacheEntry) -> Option<ValidationOutcome> {
    for tracked in &entry.tracked_files {
        let metadata = match std::fs::metadata(&tracked.path) {
            Ok(metadata) => metadata,
            Err(_) => return Some(ValidationOutcome::TrackedFileMissing),
        };
        let modified_millis = metadata
            .modified()
            .ok()
            .and_then(|time| time.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|duration| duration.as_millis() as u64);

        if modified_millis == Some(tracked.last_modified_millis) {
            continue;
        }

        match content_hash_of_file(&tracked.path) {
            Ok(current_hash) if current_hash == tracked.content_hash => continue,
            _ => return Some(ValidationOutcome::TrackedFileChanged),
        }
    }
    None
}

fn check_outputs_exist(entry: &CacheEntry) -> Option<ValidationOutcome> {
    for paths in entry.outputs_by_key.values() {
        for path in paths {
            if !path.exists() {
                return Some(ValidationOutcome::OutputMissing);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TrackedFileMeta;
    use crate::node::{NodeOutput, TrackedOrigin};
    use std::path::{Path, PathBuf};

    struct EmptyLookup {
        root: PathBuf,
        build: PathBuf,
    }

    impl OutputsLookup for EmptyLookup {
        fn get_node_outputs(&self, _name: &str) -> Option<&[NodeOutput]> {
            None
        }
        fn root_dir(&self) -> &Path {
            &self.root
        }
        fn build_dir(&self) -> &Path {
            &self.build
        }
    }

    fn base_entry() -> CacheEntry {
        CacheEntry {
            content_signature: "Xslt-aaaaaaaaaaaaaaaa".into(),
            item_key: "item".into(),
            timestamp: 0,
            upstream_signatures: Vec::new(),
            tracked_files: Vec::new(),
            outputs_by_key: NodeOutput::new(),
            output_base_dir: PathBuf::new(),
        }
    }

    #[test]
    fn valid_when_nothing_tracked_and_no_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let lookup = EmptyLookup { root: dir.path().to_path_buf(), build: dir.path().join("build") };
        let outcome = is_valid(&base_entry(), &lookup, "node");
        assert_eq!(outcome, ValidationOutcome::Valid);
    }

    #[test]
    fn missing_tracked_file_invalidates() {
        let dir = tempfile::tempdir().unwrap();
        let lookup = EmptyLookup { root: dir.path().to_path_buf(), build: dir.path().join("build") };
        let mut entry = base_entry();
        entry.tracked_files.push(TrackedFileMeta {
            path: dir.path().join("missing.xml"),
            origin: TrackedOrigin::Item,
            last_modified_millis: 0,
            content_hash: "deadbeef".into(),
        });
        assert_eq!(is_valid(&entry, &lookup, "node"), ValidationOutcome::TrackedFileMissing);
    }

    #[test]
    fn touched_but_identical_file_stays_valid() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("a.xml");
        std::fs::write(&file_path, b"hello").unwrap();
        let hash = content_hash_of_file(&file_path).unwrap();
        let metadata = std::fs::metadata(&file_path).unwrap();
        let real_mtime = metadata
            .modified()
            .unwrap()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_millis() as u64;

        let lookup = EmptyLookup { root: dir.path().to_path_buf(), build: dir.path().join("build") };
        let mut entry = base_entry();
        entry.tracked_files.push(TrackedFileMeta {
            path: file_path,
            origin: TrackedOrigin::Item,
            // A different stored mtime forces the validator past the cheap
            // timestamp check and into the content-hash comparison.
            last_modified_millis: real_mtime.wrapping_add(1),
            content_hash: hash,
        });
        assert_eq!(is_valid(&entry, &lookup, "node"), ValidationOutcome::Valid);
    }

    #[test]
    fn changed_content_invalidates() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("a.xml");
        std::fs::write(&file_path, b"hello").unwrap();

        let lookup = EmptyLookup { root: dir.path().to_path_buf(), build: dir.path().join("build") };
        let mut entry = base_entry();
        entry.tracked_files.push(TrackedFileMeta {
            path: file_path.clone(),
            origin: TrackedOrigin::Item,
            last_modified_millis: 1,
            content_hash: "not-the-real-hash".into(),
        });
        std::fs::write(&file_path, b"changed").unwrap();
        assert_eq!(is_valid(&entry, &lookup, "node"), ValidationOutcome::TrackedFileChanged);
    }

    #[test]
    fn missing_output_invalidates() {
        let dir = tempfile::tempdir().unwrap();
        let lookup = EmptyLookup { root: dir.path().to_path_buf(), build: dir.path().join("build") };
        let mut entry = base_entry();
        entry
            .outputs_by_key
            .insert("default".to_string(), vec![dir.path().join("missing-output.html")]);
        assert_eq!(is_valid(&entry, &lookup, "node"), ValidationOutcome::OutputMissing);
    }
}
