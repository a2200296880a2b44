//! Small filesystem and path helpers shared across the crate.
//!
//! Grounded on the teacher's `crates/core/src/utils.rs` (`read_json_file`,
//! `write_json_file`, parent-dir creation, source-name normalisation).

use crate::error::Result;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Reads and deserialises a JSON file.
pub fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read(path)?;
    Ok(serde_json::from_slice(&content)?)
}

/// Serialises `value` and writes it atomically: write to a sibling temp file
/// then rename over the destination, so a crash never leaves a half-written
/// cache entry (invariant I10).
pub fn write_json_file<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    create_parent_dir_all(path)?;
    let rendered = serde_json::to_vec_pretty(value)?;
    atomic_write(path, &rendered)
}

/// Writes `bytes` atomically via a temp file in the same directory followed
/// by a rename, so readers never observe a partial write.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    create_parent_dir_all(path)?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

/// Creates `path`'s parent directory (and any missing ancestors), if it has
/// one and it doesn't already exist.
pub fn create_parent_dir_all(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Copies `src` to `dst`, creating `dst`'s parent directories first.
pub fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    create_parent_dir_all(dst)?;
    fs::copy(src, dst)?;
    Ok(())
}

/// Strips a `base` prefix from `path` if present, otherwise returns `path`
/// unchanged. Used to render paths relative to the project root in logs and
/// cache keys.
pub fn source_name(path: &Path, base: &Path) -> PathBuf {
    path.strip_prefix(base).map(Path::to_path_buf).unwrap_or_else(|_| path.to_path_buf())
}

/// Renders `path` with forward-slash separators regardless of platform, so
/// signatures and item keys hash identically on Windows and Unix. Mirrors
/// the teacher's `canonicalize`, which applies the same `path_slash`
/// normalisation on Windows.
pub fn slash_display(path: &Path) -> String {
    #[cfg(windows)]
    {
        use path_slash::PathExt;
        path.to_slash_lossy().into_owned()
    }
    #[cfg(not(windows))]
    {
        path.to_string_lossy().into_owned()
    }
}

/// Collapses runs of consecutive `-` into a single `-` and trims any at the
/// ends. Used when sanitising an arbitrary basename into a cache-safe
/// component.
pub fn collapse_hyphens(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut previous_was_hyphen = false;
    for ch in input.chars() {
        if ch == '-' {
            if !previous_was_hyphen {
                out.push(ch);
            }
            previous_was_hyphen = true;
        } else {
            out.push(ch);
            previous_was_hyphen = false;
        }
    }
    out.trim_matches('-').to_string()
}

/// Current wall-clock time in milliseconds since the Unix epoch, used to
/// stamp a freshly written `CacheEntry` (§3).
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Ensures `dir` exists, creating it (and ancestors) if necessary.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        trace!(path = %dir.display(), "creating directory");
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// Opens `path` for writing, truncating it, creating parent dirs first. Used
/// by node implementations that stream output rather than buffer it.
pub fn create_file(path: &Path) -> Result<File> {
    create_parent_dir_all(path)?;
    Ok(File::create(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapse_hyphens_trims_and_merges() {
        assert_eq!(collapse_hyphens("--a--b---c--"), "a-b-c");
        assert_eq!(collapse_hyphens("abc"), "abc");
        assert_eq!(collapse_hyphens("---"), "");
    }

    #[test]
    fn atomic_write_produces_final_content_without_leaking_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/out.json");
        atomic_write(&target, b"hello").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "hello");
        let siblings: Vec<_> = fs::read_dir(target.parent().unwrap()).unwrap().collect();
        assert_eq!(siblings.len(), 1);
    }

    #[test]
    fn source_name_strips_known_prefix() {
        let base = Path::new("/project");
        let path = Path::new("/project/src/a.xml");
        assert_eq!(source_name(path, base), PathBuf::from("src/a.xml"));
    }
}
