//! The on-disk cache store (component E, §5).
//!
//! Grounded on the teacher's `SolFilesCache`/`CacheEntry` in `cache.rs`:
//! a JSON-backed map keyed by a stable identifier, one entry per tracked
//! unit of work, each carrying per-file modification timestamps and content
//! hashes used to decide whether a re-run can be skipped.

mod validator;

pub use validator::{is_valid, ValidationOutcome};

use crate::error::Result;
use crate::node::TrackedOrigin;
use crate::utils;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{instrument, trace};

/// Metadata recorded for one file this cache entry depends on (§5).
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedFileMeta {
    pub path: PathBuf,
    pub origin: TrackedOrigin,
    pub last_modified_millis: u64,
    pub content_hash: String,
}

impl TrackedFileMeta {
    /// Reads `path`'s current modification time and content hash from disk.
    pub fn capture(path: &Path, origin: TrackedOrigin) -> Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let last_modified_millis = metadata
            .modified()?
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        let content_hash = crate::hash::content_hash_of_file(path)?;
        Ok(Self { path: path.to_path_buf(), origin, last_modified_millis, content_hash })
    }
}

/// One recorded dependency on an upstream node's output set (§4.6 step 3).
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamOutputSignature {
    pub node: String,
    pub output_key: String,
    pub glob: Option<String>,
    pub signature: String,
}

/// One cache entry: a single unit of cached work, identified by the pipeline
/// by `(contentSignature, itemKey)` (§4.4).
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// The node's content signature at the time this entry was written.
    pub content_signature: String,
    /// The item key this entry is stored under (§3).
    pub item_key: String,
    /// Creation time of this entry, in milliseconds since the Unix epoch (§3).
    pub timestamp: u64,
    /// One entry per upstream `NodeOutputRef` this unit of work consulted.
    pub upstream_signatures: Vec<UpstreamOutputSignature>,
    /// Every file this unit of work read, including the item's own source
    /// files, any `FileRef`s consulted, and files discovered while running.
    pub tracked_files: Vec<TrackedFileMeta>,
    /// The output paths produced the last time this entry was written,
    /// keyed the same way as a `NodeOutput`.
    pub outputs_by_key: crate::node::NodeOutput,
    /// The directory portion shared by the item's output path at write time
    /// (§3, §4.6): used to rebase a cache hit's outputs onto the directory a
    /// later run expects them under.
    pub output_base_dir: PathBuf,
}

/// The on-disk JSON cache, one file per node + item key under the cache
/// directory.
#[derive(Clone, Debug)]
pub struct CacheStore {
    pub(crate) cache_dir: PathBuf,
    enabled: bool,
}

impl CacheStore {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self { cache_dir: cache_dir.into(), enabled: true }
    }

    /// Same on-disk layout, but [`Self::get`] always reports a miss and
    /// [`Self::set`]/[`Self::clean_except`] are no-ops. Used when
    /// `PipelineOptions::no_cache` disables reuse without changing the cache
    /// directory a node would otherwise write to.
    pub fn disabled(cache_dir: impl Into<PathBuf>) -> Self {
        Self { cache_dir: cache_dir.into(), enabled: false }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn entry_path(&self, signature: &str, item_key: &str) -> PathBuf {
        self.cache_dir.join(sanitise_component(signature)).join(format!("{}.json", sanitise_component(item_key)))
    }

    /// Reads the stored entry for `(signature, item_key)`, if any. A missing
    /// or unreadable file is treated as "no entry" rather than an error,
    /// matching the teacher's "absent cache is a fresh project" stance.
    #[instrument(skip(self), fields(signature, item = item_key))]
    pub fn get(&self, signature: &str, item_key: &str) -> Option<CacheEntry> {
        if !self.enabled {
            return None;
        }
        let path = self.entry_path(signature, item_key);
        match utils::read_json_file(&path) {
            Ok(entry) => Some(entry),
            Err(_) => {
                trace!(path = %path.display(), "no usable cache entry");
                None
            }
        }
    }

    /// Writes `entry` for `(signature, item_key)` atomically. A no-op when
    /// the store is disabled.
    #[instrument(skip(self, entry), fields(signature, item = item_key))]
    pub fn set(&self, signature: &str, item_key: &str, entry: &CacheEntry) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let path = self.entry_path(signature, item_key);
        utils::write_json_file(&path, entry)
    }

    /// Removes every cache entry under `signature` whose item key is not in
    /// `keep`. Called once per node after a run so entries for items that no
    /// longer exist (deleted sources) don't linger forever. Silently
    /// succeeds if the subtree doesn't exist.
    pub fn clean_except(&self, signature: &str, keep: &[String]) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let dir = self.cache_dir.join(sanitise_component(signature));
        if !dir.exists() {
            return Ok(());
        }
        let keep_files: std::collections::HashSet<String> =
            keep.iter().map(|key| format!("{}.json", sanitise_component(key))).collect();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if !keep_files.contains(file_name.as_ref()) {
                trace!(file = %file_name, signature, "removing stale cache entry");
                std::fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }

    /// Removes the subtree for one content signature, or the whole cache
    /// directory if `signature` is `None`.
    pub fn clear(&self, signature: Option<&str>) -> Result<()> {
        let target = match signature {
            Some(sig) => self.cache_dir.join(sanitise_component(sig)),
            None => self.cache_dir.clone(),
        };
        if target.exists() {
            std::fs::remove_dir_all(&target)?;
        }
        Ok(())
    }

    /// Copies a file from wherever it was cached (the entry's recorded
    /// output path) to `expected_path`, used to rebase a cache hit's output
    /// onto the path the current run expects it at.
    pub fn copy_to_expected_path(&self, cached: &Path, expected_path: &Path) -> Result<()> {
        if cached == expected_path {
            return Ok(());
        }
        utils::copy_file(cached, expected_path)
    }
}

/// Lowercase; path separators become `-`; dots become `_`; anything else
/// outside `[a-zA-Z0-9-_]` is dropped; repeated hyphens collapse; result is
/// bounded to a reasonable length (§4.4).
fn sanitise_component(raw: &str) -> String {
    let lower = raw.to_ascii_lowercase();
    let mut out = String::with_capacity(lower.len());
    for ch in lower.chars() {
        if ch == '/' || ch == '\\' {
            out.push('-');
        } else if ch == '.' {
            out.push('_');
        } else if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
            out.push(ch);
        }
    }
    let mut collapsed = utils::collapse_hyphens(&out);
    collapsed.truncate(150);
    collapsed
}
