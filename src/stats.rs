//! Acceptance statistics for the Metropolis–Hastings sampler.

use std::collections::VecDeque;

use crate::node::NodeId;

/// Number of most recent decisions kept for [`AcceptanceTracker::recent_rate`].
pub const RECENT_WINDOW: usize = 100;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeAcceptance {
    pub proposals: u64,
    pub accepted: u64,
    /// Proposals whose acceptance ratio evaluated to NaN.
    pub degenerate: u64,
    recent: VecDeque<bool>,
}

impl NodeAcceptance {
    pub fn rate(&self) -> Option<f64> {
        (self.proposals > 0).then(|| self.accepted as f64 / self.proposals as f64)
    }

    fn record(&mut self, accepted: bool) {
        self.proposals += 1;
        self.accepted += accepted as u64;
        if self.recent.len() == RECENT_WINDOW {
            self.recent.pop_front();
        }
        self.recent.push_back(accepted);
    }
}

/// Per-node counts of proposals and accepted moves since the last reset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AcceptanceTracker {
    nodes: Vec<NodeAcceptance>,
}

impl AcceptanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, node: NodeId) -> &mut NodeAcceptance {
        if node.0 >= self.nodes.len() {
            self.nodes.resize_with(node.0 + 1, NodeAcceptance::default);
        }
        &mut self.nodes[node.0]
    }

    pub fn record(&mut self, node: NodeId, accepted: bool) {
        self.entry(node).record(accepted);
    }

    /// Records a rejection caused by a NaN acceptance ratio.
    pub fn record_degenerate(&mut self, node: NodeId) {
        let entry = self.entry(node);
        entry.record(false);
        entry.degenerate += 1;
    }

    pub fn reset(&mut self) {
        self.nodes.clear();
    }

    pub fn node(&self, node: NodeId) -> Option<&NodeAcceptance> {
        self.nodes.get(node.0).filter(|n| n.proposals > 0)
    }

    pub fn rate(&self, node: NodeId) -> Option<f64> {
        self.node(node).and_then(NodeAcceptance::rate)
    }

    /// Acceptance rate over the last [`RECENT_WINDOW`] proposals of `node`.
    pub fn recent_rate(&self, node: NodeId) -> Option<f64> {
        let entry = self.node(node)?;
        let accepted = entry.recent.iter().filter(|&&a| a).count();
        Some(accepted as f64 / entry.recent.len() as f64)
    }

    pub fn proposals(&self) -> u64 {
        self.nodes.iter().map(|n| n.proposals).sum()
    }

    pub fn accepted(&self) -> u64 {
        self.nodes.iter().map(|n| n.accepted).sum()
    }

    pub fn degenerate(&self) -> u64 {
        self.nodes.iter().map(|n| n.degenerate).sum()
    }

    pub fn overall_rate(&self) -> Option<f64> {
        let proposals = self.proposals();
        (proposals > 0).then(|| self.accepted() as f64 / proposals as f64)
    }
}
