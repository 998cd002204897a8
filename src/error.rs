//! Error types for network construction and inference.

use thiserror::Error;

use crate::node::NodeId;

/// Errors raised while wiring a network or running the sampler.
///
/// Structural problems (bad wiring, cycles) and caller misuse are reported here.
/// Numeric degeneracies during a Metropolis step are not errors: a NaN
/// acceptance ratio is treated as a rejection and counted by
/// [`AcceptanceTracker`](crate::stats::AcceptanceTracker).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum HopperError {
    /// A linear-Gaussian node whose coefficient vector does not have one
    /// entry per parent plus the intercept.
    #[error("node {node}: expected {expected} coefficients (parents + intercept), got {actual}")]
    CoefficientMismatch {
        node: String,
        expected: usize,
        actual: usize,
    },

    /// The initialization frontier stopped shrinking. Either the graph has a
    /// cycle or some node can never see all of its parents initialized.
    #[error("initialization stalled with {} node(s) pending: {}", pending.len(), pending.join(", "))]
    InitializationStalled { pending: Vec<String> },

    /// An edge from a node to itself.
    #[error("node {0} cannot be its own parent")]
    SelfEdge(NodeId),

    /// The same parent was wired twice into one child.
    #[error("edge {parent} -> {child} already exists")]
    DuplicateEdge { parent: NodeId, child: NodeId },

    /// A handle that does not belong to this network.
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// A node, proposal or observer parameter out of its valid range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// `infer` or `reset` called before any node was registered.
    #[error("no nodes registered")]
    EmptyNetwork,

    /// Topology changed after sampling began without an intervening reset.
    #[error("network topology is frozen once sampling has begun; call reset() first")]
    TopologyFrozen,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "csv")]
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, HopperError>;
