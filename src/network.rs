/*!
Arena of node records plus the current value of every node.

The network is the sole owner of its nodes. Edges are stored on both sides as
[`NodeId`] lists, and values live in a dense vector indexed by the same handles so
that observers can read a whole joint sample as one slice.
*/

use tracing::debug;

use crate::error::{HopperError, Result};
use crate::node::{Node, NodeId};
use crate::random::RandomSource;

#[derive(Debug, Clone, Default)]
pub struct Network {
    nodes: Vec<Node>,
    values: Vec<f64>,
    free: Vec<NodeId>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves `node` into the arena and returns its handle.
    ///
    /// Evidence starts at its observed value. Free nodes hold `NaN` until
    /// [`initialize`](Self::initialize) runs. Edges carried over from another
    /// network are dropped; wire the node again with [`edge_from`](Self::edge_from).
    pub fn add(&mut self, mut node: Node) -> NodeId {
        node.parents.clear();
        node.children.clear();
        let id = NodeId(self.nodes.len());
        self.values.push(node.observed_value().unwrap_or(f64::NAN));
        if !node.is_evidence() {
            self.free.push(id);
        }
        self.nodes.push(node);
        id
    }

    /// Wires `parent -> child`. The parent is appended to the child's parent
    /// list, which fixes its coefficient slot in a linear-Gaussian child.
    pub fn edge_from(&mut self, child: NodeId, parent: NodeId) -> Result<()> {
        self.get(child).ok_or(HopperError::UnknownNode(child))?;
        self.get(parent).ok_or(HopperError::UnknownNode(parent))?;
        if child == parent {
            return Err(HopperError::SelfEdge(child));
        }
        if self.nodes[child.0].parents.contains(&parent) {
            return Err(HopperError::DuplicateEdge { parent, child });
        }
        self.nodes[child.0].parents.push(parent);
        self.nodes[parent.0].children.push(child);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.get(id).ok_or(HopperError::UnknownNode(id))
    }

    pub fn value(&self, id: NodeId) -> Option<f64> {
        self.values.get(id.0).copied()
    }

    /// Current joint sample, indexed by `NodeId.0`.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Non-evidence nodes, in registration order.
    pub fn free_nodes(&self) -> &[NodeId] {
        &self.free
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn label(&self, id: NodeId) -> String {
        match self.get(id) {
            Some(node) => node.label(id),
            None => id.to_string(),
        }
    }

    pub(crate) fn set_value(&mut self, id: NodeId, value: f64) {
        self.values[id.0] = value;
    }

    /// Checks every linear-Gaussian node against its wired parents.
    pub fn validate(&self) -> Result<()> {
        self.nodes
            .iter()
            .enumerate()
            .try_for_each(|(i, node)| node.check_arity(NodeId(i)))
    }

    /// Seeds every free node by ancestral sampling.
    ///
    /// Each wave scans the remaining frontier and draws a value for every node
    /// whose parents are all initialized. Evidence counts as initialized on
    /// sight. Blocked nodes carry over to the next wave. A wave that makes no
    /// progress means the graph has a cycle, which is reported instead of
    /// looping. Coefficient counts are validated first. Returns the number of
    /// waves.
    pub fn initialize<R: RandomSource + ?Sized>(&mut self, rng: &mut R) -> Result<usize> {
        self.validate()?;
        let mut initialized = vec![false; self.nodes.len()];
        let mut frontier: Vec<NodeId> = self.ids().collect();
        let mut waves = 0;

        while !frontier.is_empty() {
            waves += 1;
            let mut blocked = Vec::new();
            for &id in &frontier {
                let node = &self.nodes[id.0];
                if node.is_evidence() {
                    if let Some(value) = node.observed_value() {
                        self.values[id.0] = value;
                    }
                    initialized[id.0] = true;
                } else if node.parents.iter().all(|p| initialized[p.0]) {
                    self.values[id.0] = node.sample(&self.values, rng);
                    initialized[id.0] = true;
                } else {
                    blocked.push(id);
                }
            }
            debug!(
                wave = waves,
                seeded = frontier.len() - blocked.len(),
                blocked = blocked.len(),
                "initialization wave"
            );
            if blocked.len() == frontier.len() {
                return Err(HopperError::InitializationStalled {
                    pending: blocked.iter().map(|&id| self.label(id)).collect(),
                });
            }
            frontier = blocked;
        }
        Ok(waves)
    }

    /// Log of the unnormalized likelihood of `node` taking `value`: its own
    /// conditional times the conditionals of its children.
    ///
    /// Parents are unaffected by a change of `node`, and grandchildren only
    /// depend on their direct parents, so the children complete the Markov
    /// blanket term. The node's stored value is restored before returning.
    pub fn log_blanket_likelihood(&mut self, node: NodeId, value: f64) -> f64 {
        let original = self.values[node.0];
        self.values[node.0] = value;
        let record = &self.nodes[node.0];
        let own = record.log_conditional(value, &self.values);
        let log_likelihood = record.children.iter().fold(own, |acc, child| {
            acc + self.nodes[child.0].log_conditional(self.values[child.0], &self.values)
        });
        self.values[node.0] = original;
        log_likelihood
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::SeededSource;
    use approx::assert_abs_diff_eq;

    fn chain(len: usize) -> (Network, Vec<NodeId>) {
        let mut net = Network::new();
        let mut ids = vec![net.add(Node::evidence(1.0).unwrap())];
        for _ in 1..len {
            let id = net.add(Node::gaussian(vec![0.0, 1.0], 1.0).unwrap());
            net.edge_from(id, *ids.last().unwrap()).unwrap();
            ids.push(id);
        }
        (net, ids)
    }

    #[test]
    fn edges_are_symmetric() {
        let (net, ids) = chain(3);
        assert_eq!(net.node(ids[1]).unwrap().parents(), &[ids[0]]);
        assert_eq!(net.node(ids[1]).unwrap().children(), &[ids[2]]);
        assert_eq!(net.node(ids[0]).unwrap().children(), &[ids[1]]);
        assert_eq!(net.free_nodes(), &ids[1..]);
    }

    #[test]
    fn bad_edges_are_rejected() {
        let (mut net, ids) = chain(2);
        assert!(matches!(
            net.edge_from(ids[1], ids[1]),
            Err(HopperError::SelfEdge(_))
        ));
        assert!(matches!(
            net.edge_from(ids[1], ids[0]),
            Err(HopperError::DuplicateEdge { .. })
        ));
        assert!(matches!(
            net.edge_from(NodeId(9), ids[0]),
            Err(HopperError::UnknownNode(NodeId(9)))
        ));
    }

    #[test]
    fn free_nodes_start_unset() {
        let (net, ids) = chain(2);
        assert_eq!(net.value(ids[0]), Some(1.0));
        assert!(net.value(ids[1]).unwrap().is_nan());
    }

    #[test]
    fn initialize_seeds_out_of_order_registration() {
        // Register the child before its parent so one extra wave is needed.
        let mut net = Network::new();
        let child = net.add(Node::gaussian(vec![0.0, 1.0], 1.0).unwrap());
        let root = net.add(Node::uniform(0.0, 1.0).unwrap());
        let leaf = net.add(Node::gaussian(vec![0.0, 2.0], 1.0).unwrap());
        net.edge_from(child, root).unwrap();
        net.edge_from(leaf, child).unwrap();

        let waves = net.initialize(&mut SeededSource::new(42)).unwrap();
        assert_eq!(waves, 2);
        assert!(net.values().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn initialize_reports_cycles() {
        let mut net = Network::new();
        let a = net.add(Node::gaussian(vec![0.0, 1.0], 1.0).unwrap().with_name("a"));
        let b = net.add(Node::gaussian(vec![0.0, 1.0], 1.0).unwrap().with_name("b"));
        let c = net.add(Node::uniform(0.0, 1.0).unwrap());
        net.edge_from(a, b).unwrap();
        net.edge_from(b, a).unwrap();

        match net.initialize(&mut SeededSource::new(1)) {
            Err(HopperError::InitializationStalled { pending }) => {
                assert_eq!(pending, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("Expected InitializationStalled, got {other:?}"),
        }
        assert!(net.value(c).unwrap().is_finite());
    }

    #[test]
    fn validate_flags_coefficient_mismatch() {
        let mut net = Network::new();
        let p = net.add(Node::evidence(0.0).unwrap());
        let q = net.add(Node::evidence(0.0).unwrap());
        let x = net.add(Node::gaussian(vec![0.0, 1.0], 1.0).unwrap());
        net.edge_from(x, p).unwrap();
        net.edge_from(x, q).unwrap();
        assert!(matches!(
            net.validate(),
            Err(HopperError::CoefficientMismatch {
                expected: 3,
                actual: 2,
                ..
            })
        ));
    }

    #[test]
    fn initialize_fails_on_coefficient_mismatch() {
        let mut net = Network::new();
        let p = net.add(Node::evidence(5.0).unwrap());
        let q = net.add(Node::evidence(1.0).unwrap());
        let x = net.add(Node::gaussian(vec![10.0, 1.0], 4.0).unwrap().with_name("x"));
        net.edge_from(x, p).unwrap();
        net.edge_from(x, q).unwrap();

        match net.initialize(&mut SeededSource::new(42)) {
            Err(HopperError::CoefficientMismatch {
                node,
                expected,
                actual,
            }) => {
                assert_eq!(node, "x");
                assert_eq!((expected, actual), (3, 2));
            }
            other => panic!("Expected CoefficientMismatch, got {other:?}"),
        }
        assert!(net.value(x).unwrap().is_nan());
    }

    #[test]
    fn added_node_drops_foreign_edges() {
        let (source, ids) = chain(3);
        let wired = source.node(ids[1]).unwrap().clone();
        assert_eq!(wired.parents(), &[ids[0]]);
        assert_eq!(wired.children(), &[ids[2]]);

        let mut net = Network::new();
        let root = net.add(Node::evidence(2.0).unwrap());
        let copy = net.add(wired);
        assert!(net.node(copy).unwrap().parents().is_empty());
        assert!(net.node(copy).unwrap().children().is_empty());
        assert!(net.node(root).unwrap().children().is_empty());

        // Two coefficients need one parent again.
        assert!(matches!(
            net.initialize(&mut SeededSource::new(42)),
            Err(HopperError::CoefficientMismatch { .. })
        ));
        net.edge_from(copy, root).unwrap();
        net.initialize(&mut SeededSource::new(42)).unwrap();
        assert!(net.value(copy).unwrap().is_finite());
    }

    #[test]
    fn blanket_likelihood_includes_children_and_restores_value() {
        let mut net = Network::new();
        let x = net.add(Node::uniform(0.0, 10.0).unwrap());
        let y = net.add(Node::gaussian_evidence(vec![10.0, 1.0], 4.0, 15.0).unwrap());
        net.edge_from(y, x).unwrap();
        net.set_value(x, 5.0);

        assert_eq!(net.log_blanket_likelihood(x, 5.0), 0.0);
        // Child mean at x = 3 is 13, (15 - 13)^2 / 8 = 0.5.
        assert_abs_diff_eq!(net.log_blanket_likelihood(x, 3.0), -0.5, epsilon = 1e-12);
        assert_eq!(net.log_blanket_likelihood(x, 11.0), f64::NEG_INFINITY);
        assert_eq!(net.value(x), Some(5.0));
    }
}
