//! Crate-wide error taxonomy.
//!
//! Mirrors the teacher's `SolcError`: a flat `thiserror` enum with
//! `#[error(transparent)]` wraps around the underlying I/O/serde failures and
//! named variants for the domain-specific failure modes from the pipeline's
//! own error-handling design (configuration, resolution, cycle, node work).

use std::fmt;

/// The error type returned by a node's [`crate::Node::run`].
///
/// Nodes are free to raise whatever error type they like; it only needs to
/// be `Error + Send + Sync` so the pipeline can box it up as the `source` of
/// a [`PipelineError::NodeFailed`].
pub type NodeError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Detected before execution: unknown explicit dependency, duplicate
    /// node name, or any other structural problem with the graph.
    #[error("{message}")]
    Config { message: String },

    /// The dependency graph contains a cycle; `cycle` lists the node names
    /// in cycle order, starting and ending at the same node.
    #[error("dependency cycle detected: {}", cycle.join(" -> "))]
    CycleDetected { cycle: Vec<String> },

    /// Raised while resolving an `Input` (§4.2): empty glob match, missing
    /// upstream output, or an empty glob-filtered set.
    #[error("{node}: {message}")]
    Resolution { node: String, message: String },

    /// A node's `run` raised an error. Fatal; the pipeline stops and the
    /// node's partial outputs are never written to the cache.
    #[error("{node}: {source}")]
    NodeFailed {
        node: String,
        #[source]
        source: NodeError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub(crate) fn config(message: impl fmt::Display) -> Self {
        Self::Config { message: message.to_string() }
    }

    pub(crate) fn resolution(node: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Resolution { node: node.into(), message: message.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
