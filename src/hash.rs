//! Content hasher & signatures (component A).
//!
//! Every hash in this module is a SHA-256 digest; `*_hex8` variants truncate
//! to the first 16 hex characters (8 bytes) as required for
//! [`ContentSignature`] and the upstream-set signature.

use crate::error::Result;
use crate::node::{ConfigValue, Input};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(64);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// First 16 hex chars (8 bytes) of the SHA-256 digest.
pub fn sha256_hex8(bytes: &[u8]) -> String {
    sha256_hex(bytes)[..16].to_string()
}

/// Hashes the content of a file on disk. Used for tracked-file hashes and
/// the validator's re-hash step.
pub fn content_hash_of_file(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    Ok(sha256_hex(&bytes))
}

/// The upstream-set signature (§4.5): first 16 hex chars of SHA-256 over
/// `sorted(paths).join("|")`.
pub fn upstream_set_signature(paths: &[PathBuf]) -> String {
    let mut rendered: Vec<String> = paths.iter().map(|p| crate::utils::slash_display(p)).collect();
    rendered.sort();
    sha256_hex8(rendered.join("|").as_bytes())
}

/// A short `<KindTag>-<hex8>` identifier for a node's configuration identity
/// (§3). Stable across runs; the output config never contributes to it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ContentSignature(String);

impl ContentSignature {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes the node content signature from its `kind_tag`, processing
/// config, and items specification, per §3:
///
/// - (a) each config entry carrying a `FileRef`, serialised as
///   `key:<absolute path>` (identity, not contents) — relative `FileRef`
///   paths are resolved against `root_dir` first so the same file produces
///   the same signature regardless of the current working directory or
///   which relative spelling referenced it;
/// - (b) all remaining config entries as JSON with keys sorted;
/// - (c) the items specification (literal glob string, array repr, or
///   upstream reference name + output key).
///
/// The output config is deliberately never consulted.
pub fn compute_content_signature(
    kind_tag: &str,
    config: &BTreeMap<String, ConfigValue>,
    items: Option<&Input>,
    root_dir: &Path,
) -> ContentSignature {
    let mut file_ref_parts = Vec::new();
    let mut remaining: BTreeMap<String, serde_json::Value> = BTreeMap::new();

    for (key, value) in config {
        match value {
            ConfigValue::FileRef(file_ref) => {
                let absolute = absolutize(&file_ref.path, root_dir);
                file_ref_parts.push(format!("{key}:{}", crate::utils::slash_display(&absolute)));
            }
            ConfigValue::NodeOutputRef(_) | ConfigValue::Scalar(_) => {
                remaining.insert(key.clone(), serde_json::to_value(value).unwrap_or_default());
            }
        }
    }
    file_ref_parts.sort();

    let remaining_json = serde_json::to_string(&remaining).unwrap_or_default();
    let items_repr = items.map(render_input).unwrap_or_default();

    let mut input = String::new();
    input.push_str(&file_ref_parts.join(";"));
    input.push('|');
    input.push_str(&remaining_json);
    input.push('|');
    input.push_str(&items_repr);

    ContentSignature(format!("{kind_tag}-{}", sha256_hex8(input.as_bytes())))
}

/// Resolves `path` to an absolute form against `root_dir` if it isn't one
/// already. No filesystem access — the content signature must stay cheap to
/// compute (§9 Open Question), so this is a pure path join, not
/// `fs::canonicalize`.
fn absolutize(path: &Path, root_dir: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root_dir.join(path)
    }
}

fn render_input(input: &Input) -> String {
    match input {
        Input::Glob(pattern) => pattern.clone(),
        Input::List(items) => items.iter().map(render_input).collect::<Vec<_>>().join(","),
        Input::NodeOutputRef(node_output_ref) => {
            format!("{}::{}", node_output_ref.node, node_output_ref.key)
        }
    }
}

/// Derives a short, filesystem-safe item key from one or more paths (§3).
///
/// Depends only on the sorted multiset of paths, so
/// `make_item_key(&[a, b]) == make_item_key(&[b, a])` (invariant I9).
pub fn make_item_key(paths: &[&Path]) -> String {
    let mut sorted: Vec<&Path> = paths.to_vec();
    sorted.sort();

    let joined = sorted.iter().map(|p| crate::utils::slash_display(p)).collect::<Vec<_>>().join("|");
    let hex8 = sha256_hex8(joined.as_bytes());

    let base = sorted
        .first()
        .and_then(|p| p.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let sanitised = sanitise_basename(&base);

    let mut key = format!("{sanitised}-{hex8}");
    key.truncate(200);
    key
}

fn sanitise_basename(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    let mut out = String::with_capacity(lower.len());
    for ch in lower.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' {
            out.push(ch);
        } else {
            out.push('-');
        }
    }
    crate::utils::collapse_hyphens(&out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::FileRef;

    #[test]
    fn item_key_is_order_independent() {
        let a = Path::new("src/a.xml");
        let b = Path::new("src/b.xml");
        assert_eq!(make_item_key(&[a, b]), make_item_key(&[b, a]));
    }

    #[test]
    fn content_signature_ignores_output_config() {
        let mut config = BTreeMap::new();
        config.insert(
            "stylesheet".to_string(),
            ConfigValue::FileRef(FileRef { path: PathBuf::from("/xsl/main.xsl") }),
        );
        let items = Input::Glob("src/**/*.xml".to_string());
        let root_dir = Path::new("/project");
        let sig_a = compute_content_signature("Xslt", &config, Some(&items), root_dir);
        let sig_b = compute_content_signature("Xslt", &config, Some(&items), root_dir);
        assert_eq!(sig_a, sig_b);
    }

    #[test]
    fn content_signature_changes_with_file_ref_path() {
        let items = Input::Glob("src/**/*.xml".to_string());
        let mut config_a = BTreeMap::new();
        config_a.insert(
            "stylesheet".to_string(),
            ConfigValue::FileRef(FileRef { path: PathBuf::from("/xsl/main.xsl") }),
        );
        let mut config_b = BTreeMap::new();
        config_b.insert(
            "stylesheet".to_string(),
            ConfigValue::FileRef(FileRef { path: PathBuf::from("/xsl/other.xsl") }),
        );
        let root_dir = Path::new("/project");
        let sig_a = compute_content_signature("Xslt", &config_a, Some(&items), root_dir);
        let sig_b = compute_content_signature("Xslt", &config_b, Some(&items), root_dir);
        assert_ne!(sig_a, sig_b);
    }

    #[test]
    fn content_signature_is_stable_for_a_relative_file_ref_regardless_of_cwd() {
        let items = Input::Glob("src/**/*.xml".to_string());
        let mut config = BTreeMap::new();
        config.insert(
            "stylesheet".to_string(),
            ConfigValue::FileRef(FileRef { path: PathBuf::from("xsl/main.xsl") }),
        );
        let sig_from_project_a =
            compute_content_signature("Xslt", &config, Some(&items), Path::new("/checkout-a/project"));
        let sig_from_project_b =
            compute_content_signature("Xslt", &config, Some(&items), Path::new("/checkout-a/project"));
        assert_eq!(
            sig_from_project_a, sig_from_project_b,
            "the same root_dir must always absolutize a relative FileRef the same way"
        );

        let sig_from_different_root =
            compute_content_signature("Xslt", &config, Some(&items), Path::new("/checkout-b/project"));
        assert_ne!(
            sig_from_project_a, sig_from_different_root,
            "a relative FileRef under a different root resolves to a different absolute identity"
        );
    }
}
