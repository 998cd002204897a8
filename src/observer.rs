/*!
Consumers of the joint sample produced after every sweep.

The sampler calls [`Observer::on_sweep_complete`] once per sweep, in sweep order,
with read-only access to the network. [`Observer::reset`] is called when the
sampler is reset so accumulated results start over.
*/

use ndarray::Array2;
use tracing::debug;

use crate::error::Result;
use crate::histogram::Histogram;
use crate::network::Network;
use crate::node::NodeId;

pub trait Observer {
    /// Clears accumulated state.
    fn reset(&mut self);

    /// Receives the network after a completed sweep.
    fn on_sweep_complete(&mut self, network: &Network);
}

/// No observer. Sweeps are run and discarded.
impl Observer for () {
    fn reset(&mut self) {}

    fn on_sweep_complete(&mut self, _network: &Network) {}
}

impl<O: Observer + ?Sized> Observer for Box<O> {
    fn reset(&mut self) {
        (**self).reset()
    }

    fn on_sweep_complete(&mut self, network: &Network) {
        (**self).on_sweep_complete(network)
    }
}

/// Histogram of one node's marginal over the sweeps.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramObserver {
    node: NodeId,
    histogram: Histogram,
}

impl HistogramObserver {
    pub fn new(range_start: f64, range_end: f64, num_bins: usize, node: NodeId) -> Result<Self> {
        Ok(Self {
            node,
            histogram: Histogram::new(range_start, range_end, num_bins)?,
        })
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn histogram(&self) -> &Histogram {
        &self.histogram
    }

    pub fn to_json(&self) -> Result<String> {
        self.histogram.to_json()
    }
}

impl Observer for HistogramObserver {
    fn reset(&mut self) {
        self.histogram.reset();
    }

    fn on_sweep_complete(&mut self, network: &Network) {
        match network.value(self.node) {
            Some(value) => self.histogram.accumulate(value),
            None => debug!(node = %self.node, "histogram node not in network"),
        }
    }
}

/// Records the values of selected nodes after every sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceObserver {
    nodes: Vec<NodeId>,
    rows: Vec<f64>,
    sweeps: usize,
}

impl TraceObserver {
    pub fn new(nodes: Vec<NodeId>) -> Self {
        Self {
            nodes,
            rows: Vec::new(),
            sweeps: 0,
        }
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn sweeps(&self) -> usize {
        self.sweeps
    }

    /// Recorded values as a `sweeps × nodes` matrix.
    pub fn samples(&self) -> Array2<f64> {
        let width = self.nodes.len();
        Array2::from_shape_fn((self.sweeps, width), |(i, j)| self.rows[i * width + j])
    }

    /// History of one traced node, or `None` if it is not traced.
    pub fn column(&self, node: NodeId) -> Option<Vec<f64>> {
        let j = self.nodes.iter().position(|&n| n == node)?;
        let width = self.nodes.len();
        Some(self.rows.iter().skip(j).step_by(width).copied().collect())
    }
}

impl Observer for TraceObserver {
    fn reset(&mut self) {
        self.rows.clear();
        self.sweeps = 0;
    }

    fn on_sweep_complete(&mut self, network: &Network) {
        self.rows.extend(
            self.nodes
                .iter()
                .map(|&n| network.value(n).unwrap_or(f64::NAN)),
        );
        self.sweeps += 1;
    }
}
