//! Pipeline and cache configuration (ambient stack; see `SPEC_FULL.md` §1).
//!
//! Grounded on the teacher's `ProjectBuilder`/`ProjectPathsConfig`: plain
//! builder structs with chained setters and a terminal `build()`, rather
//! than a config-file format, since CLI/config-loading front-ends are
//! explicitly out of scope for the core.

use crate::pipeline::Pipeline;
use std::path::PathBuf;

/// Cache-specific knobs: where entries live, and whether the cache is
/// consulted at all. Mirrors the teacher's `Project.cached` flag: disabling
/// it never changes what a node produces, only whether prior work is reused.
#[derive(Clone, Debug)]
pub struct CacheOptions {
    pub cache_dir: PathBuf,
    pub enabled: bool,
}

impl CacheOptions {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self { cache_dir: cache_dir.into(), enabled: true }
    }
}

/// Builder for a [`Pipeline`]: project root, build directory, and cache
/// options. `root_dir` defaults `build_dir` to `<root>/build` and the cache
/// directory to `<root>/.sitepipe-cache`; both can be overridden.
#[derive(Clone, Debug)]
pub struct PipelineOptions {
    pub root_dir: PathBuf,
    pub build_dir: PathBuf,
    pub cache: CacheOptions,
}

impl PipelineOptions {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        let root_dir = root_dir.into();
        let build_dir = root_dir.join("build");
        let cache_dir = root_dir.join(".sitepipe-cache");
        Self { cache: CacheOptions::new(cache_dir), build_dir, root_dir }
    }

    pub fn build_dir(mut self, build_dir: impl Into<PathBuf>) -> Self {
        self.build_dir = build_dir.into();
        self
    }

    pub fn cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache.cache_dir = cache_dir.into();
        self
    }

    /// Disables cache reuse for the built pipeline; every item is recomputed
    /// every run. A clean cache must still produce identical artifacts, so
    /// this is purely a reuse toggle, never a behavior change (§1 Non-goals).
    pub fn no_cache(mut self) -> Self {
        self.cache.enabled = false;
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline::from_options(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_place_build_and_cache_dirs_under_root() {
        let options = PipelineOptions::new("/project");
        assert_eq!(options.build_dir, PathBuf::from("/project/build"));
        assert_eq!(options.cache.cache_dir, PathBuf::from("/project/.sitepipe-cache"));
        assert!(options.cache.enabled);
    }

    #[test]
    fn no_cache_disables_without_touching_dirs() {
        let options = PipelineOptions::new("/project").no_cache();
        assert!(!options.cache.enabled);
        assert_eq!(options.build_dir, PathBuf::from("/project/build"));
    }
}
