/*!
# Metropolis–Hastings over a Bayesian network

[`MetroSampler`] owns a [`Network`] and updates its free nodes one at a time.
A **sweep** proposes a new value for every free node in registration order and
then hands the joint sample to the registered [`Observer`].

## Overview

- **Registration**: nodes are moved into the sampler's arena with
  [`MetroSampler::register`] and wired with [`MetroSampler::edge_from`].
- **Initialization**: free nodes are seeded by ancestral sampling the first time
  the chain is used ([`MetroSampler::initialize`]).
- **Transition**: each free node gets one Metropolis–Hastings step whose
  acceptance ratio only involves the node and its children.
- **Reproducibility**: every draw comes from one [`RandomSource`]. Two samplers
  with the same seed and network produce the same accept/reject trace.

## Example Usage

```rust
use hopper::metropolis_hastings::MetroSampler;
use hopper::node::Node;
use hopper::observer::HistogramObserver;
use hopper::proposal::GaussianRandomWalk;

let mut sampler = MetroSampler::new(GaussianRandomWalk::new(10.0).unwrap()).set_seed(42);
let speed = sampler.register(Node::evidence(5.0).unwrap()).unwrap();
let position = sampler
    .register(Node::gaussian(vec![10.0, 1.0], 4.0).unwrap())
    .unwrap();
sampler.edge_from(position, speed).unwrap();

let mut sampler = sampler.register_observer(HistogramObserver::new(5.0, 20.0, 20, position).unwrap());
sampler.infer(1_000).unwrap();
assert_eq!(sampler.observer().histogram().total(), 1_000);
```
*/

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, trace, warn};

use crate::error::{HopperError, Result};
use crate::network::Network;
use crate::node::{Node, NodeId};
use crate::observer::Observer;
use crate::proposal::ProposalDensity;
use crate::random::{RandomSource, SeededSource};
use crate::stats::AcceptanceTracker;

/// Result of one Metropolis–Hastings step on one node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    pub node: NodeId,
    pub original: f64,
    pub proposal: f64,
    /// Log of the acceptance ratio, NaN if it was degenerate.
    pub log_acceptance: f64,
    pub accepted: bool,
}

impl StepOutcome {
    /// Value the node holds after the step.
    pub fn value(&self) -> f64 {
        if self.accepted {
            self.proposal
        } else {
            self.original
        }
    }
}

/**
Metropolis–Hastings sampler for a network of scalar nodes.

# Type Parameters
- `Q`: the proposal kernel, see [`ProposalDensity`].
- `O`: the observer notified after every sweep. `()` until
  [`register_observer`](MetroSampler::register_observer) is called.
- `R`: the random source, [`SeededSource`] by default.
*/
#[derive(Debug, Clone)]
pub struct MetroSampler<Q, O = (), R = SeededSource> {
    network: Network,
    proposal: Q,
    observer: O,
    rng: R,
    acceptance: AcceptanceTracker,
    initialized: bool,
    sampling: bool,
    sweeps: u64,
}

impl<Q: ProposalDensity> MetroSampler<Q> {
    /// Creates an empty sampler with an entropy-seeded random source.
    pub fn new(proposal: Q) -> Self {
        Self {
            network: Network::new(),
            proposal,
            observer: (),
            rng: SeededSource::from_entropy(),
            acceptance: AcceptanceTracker::new(),
            initialized: false,
            sampling: false,
            sweeps: 0,
        }
    }
}

impl<Q, O> MetroSampler<Q, O, SeededSource> {
    /**
    Reseeds the random source.

    ```rust
    use hopper::metropolis_hastings::MetroSampler;
    use hopper::proposal::GaussianRandomWalk;

    let sampler = MetroSampler::new(GaussianRandomWalk::new(1.0).unwrap()).set_seed(42);
    assert_eq!(sampler.seed(), 42);
    ```
    */
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.rng = SeededSource::new(seed);
        self
    }

    pub fn seed(&self) -> u64 {
        self.rng.seed
    }
}

impl<Q, R> MetroSampler<Q, (), R> {
    /// Attaches the sampler's single observer.
    pub fn register_observer<O: Observer>(self, observer: O) -> MetroSampler<Q, O, R> {
        MetroSampler {
            network: self.network,
            proposal: self.proposal,
            observer,
            rng: self.rng,
            acceptance: self.acceptance,
            initialized: self.initialized,
            sampling: self.sampling,
            sweeps: self.sweeps,
        }
    }
}

impl<Q, O, R> MetroSampler<Q, O, R> {
    /// Replaces the random source, e.g. with a scripted one.
    pub fn with_source<R2: RandomSource>(self, rng: R2) -> MetroSampler<Q, O, R2> {
        MetroSampler {
            network: self.network,
            proposal: self.proposal,
            observer: self.observer,
            rng,
            acceptance: self.acceptance,
            initialized: self.initialized,
            sampling: self.sampling,
            sweeps: self.sweeps,
        }
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.network.node(id)
    }

    pub fn value(&self, id: NodeId) -> Option<f64> {
        self.network.value(id)
    }

    pub fn values(&self) -> &[f64] {
        self.network.values()
    }

    pub fn proposal(&self) -> &Q {
        &self.proposal
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    pub fn acceptance(&self) -> &AcceptanceTracker {
        &self.acceptance
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Sweeps completed since the last reset.
    pub fn sweeps(&self) -> u64 {
        self.sweeps
    }

    fn check_mutable(&self) -> Result<()> {
        if self.sampling {
            Err(HopperError::TopologyFrozen)
        } else {
            Ok(())
        }
    }

    /// Moves `node` into the sampler and returns its handle.
    pub fn register(&mut self, node: Node) -> Result<NodeId> {
        self.check_mutable()?;
        self.initialized = false;
        Ok(self.network.add(node))
    }

    /// Wires `parent -> child`. Must happen before sampling starts.
    pub fn edge_from(&mut self, child: NodeId, parent: NodeId) -> Result<()> {
        self.check_mutable()?;
        self.network.edge_from(child, parent)?;
        self.initialized = false;
        Ok(())
    }
}

impl<Q, O, R> MetroSampler<Q, O, R>
where
    Q: ProposalDensity,
    O: Observer,
    R: RandomSource,
{
    /// Seeds every free node by ancestral sampling. Does nothing if the chain
    /// is already initialized.
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        if self.network.is_empty() {
            return Err(HopperError::EmptyNetwork);
        }
        let waves = self.network.initialize(&mut self.rng)?;
        debug!(
            nodes = self.network.len(),
            free = self.network.free_nodes().len(),
            waves,
            "network initialized"
        );
        self.initialized = true;
        Ok(())
    }

    /// Redraws every free node from scratch, clears the observer and the
    /// acceptance statistics, and allows topology changes again.
    pub fn reset(&mut self) -> Result<()> {
        self.initialized = false;
        self.sampling = false;
        self.sweeps = 0;
        self.initialize()?;
        self.acceptance.reset();
        self.observer.reset();
        info!(nodes = self.network.len(), "sampler reset");
        Ok(())
    }

    /// Runs `num_iterations` sweeps, notifying the observer after each.
    pub fn infer(&mut self, num_iterations: usize) -> Result<()> {
        self.begin()?;
        for _ in 0..num_iterations {
            self.run_sweep();
        }
        self.log_summary(num_iterations);
        Ok(())
    }

    /// Like [`infer`](Self::infer), with a progress bar on stderr.
    pub fn infer_progress(&mut self, num_iterations: usize) -> Result<()> {
        self.begin()?;
        let pb = ProgressBar::new(num_iterations as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("##-"));
        }
        for _ in 0..num_iterations {
            self.run_sweep();
            pb.inc(1);
        }
        pb.finish_with_message("Done!");
        self.log_summary(num_iterations);
        Ok(())
    }

    /// Runs a single sweep and returns the step taken for every free node.
    pub fn sweep(&mut self) -> Result<Vec<StepOutcome>> {
        self.begin()?;
        let mut outcomes = Vec::with_capacity(self.network.free_nodes().len());
        for i in 0..self.network.free_nodes().len() {
            let node = self.network.free_nodes()[i];
            outcomes.push(self.metro_step(node));
        }
        self.finish_sweep();
        Ok(outcomes)
    }

    /**
    Acceptance ratio of moving `node` from its current value to `proposal`,
    before clamping to 1.

    ```rust
    use hopper::metropolis_hastings::MetroSampler;
    use hopper::node::Node;
    use hopper::proposal::GaussianRandomWalk;

    let mut sampler = MetroSampler::new(GaussianRandomWalk::new(1.0).unwrap()).set_seed(1);
    let x = sampler.register(Node::gaussian(vec![0.0], 1.0).unwrap()).unwrap();
    sampler.initialize().unwrap();
    let current = sampler.value(x).unwrap();
    assert_eq!(sampler.acceptance_probability(x, current).unwrap(), 1.0);
    ```
    */
    pub fn acceptance_probability(&mut self, node: NodeId, proposal: f64) -> Result<f64> {
        self.initialize()?;
        if self.network.node(node)?.is_evidence() {
            return Err(HopperError::InvalidParameter(format!(
                "evidence node {} is never proposed",
                self.network.label(node)
            )));
        }
        let original = self.network.values()[node.0];
        Ok(self.log_acceptance(node, proposal, original).exp())
    }

    fn begin(&mut self) -> Result<()> {
        if self.network.is_empty() {
            return Err(HopperError::EmptyNetwork);
        }
        self.initialize()?;
        self.sampling = true;
        Ok(())
    }

    fn run_sweep(&mut self) {
        for i in 0..self.network.free_nodes().len() {
            let node = self.network.free_nodes()[i];
            self.metro_step(node);
        }
        self.finish_sweep();
    }

    fn finish_sweep(&mut self) {
        self.sweeps += 1;
        self.observer.on_sweep_complete(&self.network);
    }

    fn log_summary(&self, num_iterations: usize) {
        info!(
            sweeps = num_iterations,
            total_sweeps = self.sweeps,
            acceptance = self.acceptance.overall_rate().unwrap_or(0.0),
            degenerate = self.acceptance.degenerate(),
            "inference complete"
        );
    }

    /// Log of `[L(proposal) / L(original)] * [q(original | proposal) / q(proposal | original)]`,
    /// where `L` is the Markov blanket likelihood of the node.
    fn log_acceptance(&mut self, node: NodeId, proposal: f64, original: f64) -> f64 {
        let log_likelihood_ratio = self.network.log_blanket_likelihood(node, proposal)
            - self.network.log_blanket_likelihood(node, original);
        let log_transition_ratio = self.proposal.log_transition(proposal, original)
            - self.proposal.log_transition(original, proposal);
        log_likelihood_ratio + log_transition_ratio
    }

    fn metro_step(&mut self, node: NodeId) -> StepOutcome {
        let original = self.network.values()[node.0];
        let proposal = self.proposal.draw(original, &mut self.rng);
        let log_acceptance = self.log_acceptance(node, proposal, original);

        let accepted = if log_acceptance.is_nan() {
            warn!(
                node = %self.network.label(node),
                original,
                proposal,
                "degenerate acceptance ratio, rejecting"
            );
            self.acceptance.record_degenerate(node);
            false
        } else {
            let accepted = log_acceptance >= 0.0 || self.rng.uniform().ln() < log_acceptance;
            self.acceptance.record(node, accepted);
            accepted
        };

        self.network
            .set_value(node, if accepted { proposal } else { original });
        trace!(%node, original, proposal, log_acceptance, accepted, "metropolis step");

        StepOutcome {
            node,
            original,
            proposal,
            log_acceptance,
            accepted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::{HistogramObserver, TraceObserver};
    use crate::proposal::GaussianRandomWalk;
    use std::collections::VecDeque;

    /// Replays a fixed list of gaussian and uniform draws.
    struct ScriptedSource {
        gaussians: VecDeque<f64>,
        uniforms: VecDeque<f64>,
    }

    impl RandomSource for ScriptedSource {
        fn gaussian(&mut self, sigma2: f64) -> f64 {
            self.gaussians.pop_front().expect("script ran out of gaussian draws") * sigma2.sqrt()
        }

        fn uniform(&mut self) -> f64 {
            self.uniforms.pop_front().expect("script ran out of uniform draws")
        }
    }

    fn position_network<O, R>(
        sampler: &mut MetroSampler<GaussianRandomWalk, O, R>,
    ) -> (NodeId, NodeId) {
        let speed = sampler.register(Node::evidence(5.0).unwrap()).unwrap();
        let position = sampler
            .register(Node::gaussian(vec![10.0, 1.0], 4.0).unwrap())
            .unwrap();
        sampler.edge_from(position, speed).unwrap();
        (speed, position)
    }

    fn walk(sigma2: f64) -> MetroSampler<GaussianRandomWalk> {
        MetroSampler::new(GaussianRandomWalk::new(sigma2).unwrap()).set_seed(42)
    }

    #[test]
    fn infer_on_empty_network_fails() {
        let mut sampler = walk(1.0);
        assert!(matches!(sampler.infer(10), Err(HopperError::EmptyNetwork)));
        assert!(matches!(sampler.reset(), Err(HopperError::EmptyNetwork)));
    }

    #[test]
    fn initialize_is_idempotent() {
        let mut sampler = walk(1.0);
        let (_, position) = position_network(&mut sampler);
        sampler.initialize().unwrap();
        let first = sampler.value(position).unwrap();
        assert!(first.is_finite());
        sampler.initialize().unwrap();
        assert_eq!(sampler.value(position), Some(first));
    }

    #[test]
    fn reset_redraws_free_nodes() {
        let mut sampler = walk(1.0);
        let (speed, position) = position_network(&mut sampler);
        sampler.initialize().unwrap();
        let first = sampler.value(position).unwrap();
        sampler.reset().unwrap();
        assert_ne!(sampler.value(position), Some(first));
        assert_eq!(sampler.value(speed), Some(5.0));
    }

    #[test]
    fn topology_is_frozen_while_sampling() {
        let mut sampler = walk(1.0);
        let (speed, position) = position_network(&mut sampler);
        sampler.infer(1).unwrap();
        assert!(matches!(
            sampler.register(Node::evidence(1.0).unwrap()),
            Err(HopperError::TopologyFrozen)
        ));
        assert!(matches!(
            sampler.edge_from(speed, position),
            Err(HopperError::TopologyFrozen)
        ));
        sampler.reset().unwrap();
        let extra = sampler.register(Node::uniform(0.0, 1.0).unwrap()).unwrap();
        assert!(!sampler.is_initialized());
        sampler.infer(1).unwrap();
        assert!(sampler.value(extra).unwrap().is_finite());
    }

    #[test]
    fn coefficient_mismatch_fails_fast() {
        let mut sampler = walk(1.0);
        let a = sampler.register(Node::evidence(1.0).unwrap()).unwrap();
        let x = sampler
            .register(Node::gaussian(vec![0.0], 1.0).unwrap().with_name("x"))
            .unwrap();
        sampler.edge_from(x, a).unwrap();
        assert!(matches!(
            sampler.infer(1),
            Err(HopperError::CoefficientMismatch { .. })
        ));
    }

    #[test]
    fn node_copied_from_another_sampler_is_rewired() {
        let mut first = walk(1.0);
        let (_, position) = position_network(&mut first);
        let copied = first.node(position).unwrap().clone();

        let mut second = walk(1.0);
        let speed = second.register(Node::evidence(2.0).unwrap()).unwrap();
        let moved = second.register(copied).unwrap();
        assert!(second.node(moved).unwrap().parents().is_empty());
        assert!(matches!(
            second.infer(1),
            Err(HopperError::CoefficientMismatch { .. })
        ));

        second.edge_from(moved, speed).unwrap();
        second.infer(1).unwrap();
        assert!(second.value(moved).unwrap().is_finite());
    }

    #[test]
    fn identical_proposal_is_always_accepted() {
        let mut sampler = walk(10.0);
        let (_, position) = position_network(&mut sampler);
        sampler.initialize().unwrap();
        let current = sampler.value(position).unwrap();
        assert_eq!(sampler.acceptance_probability(position, current).unwrap(), 1.0);
    }

    #[test]
    fn evidence_has_no_acceptance_probability() {
        let mut sampler = walk(10.0);
        let (speed, _) = position_network(&mut sampler);
        assert!(sampler.acceptance_probability(speed, 1.0).is_err());
    }

    #[test]
    fn scripted_step_accepts_uphill_and_rejects_downhill() {
        // Initial draw puts the node at mean + 2 = 17. The first proposal moves
        // it to the mean (uphill), the second 6 units away (downhill).
        let source = ScriptedSource {
            gaussians: VecDeque::from(vec![1.0, -2.0 / 10f64.sqrt(), 6.0 / 10f64.sqrt()]),
            uniforms: VecDeque::from(vec![0.5]),
        };
        let mut sampler = walk(10.0).with_source(source);
        let (_, position) = position_network(&mut sampler);
        sampler.initialize().unwrap();
        assert!((sampler.value(position).unwrap() - 17.0).abs() < 1e-12);

        let first = sampler.sweep().unwrap();
        assert_eq!(first.len(), 1);
        assert!(first[0].accepted);
        assert!((first[0].value() - 15.0).abs() < 1e-12);

        // exp(-36 / 8) ~ 0.011 < 0.5, so the move is rejected.
        let second = sampler.sweep().unwrap();
        assert!(!second[0].accepted);
        assert!((sampler.value(position).unwrap() - 15.0).abs() < 1e-12);
        assert_eq!(sampler.acceptance().rate(position), Some(0.5));
    }

    #[test]
    fn nan_ratio_is_rejected() {
        // A uniform node sitting outside its support makes both likelihoods
        // -inf, so the log ratio is NaN.
        let source = ScriptedSource {
            gaussians: VecDeque::from(vec![0.1]),
            uniforms: VecDeque::from(vec![0.5]),
        };
        let mut sampler = walk(1.0).with_source(source);
        let u = sampler.register(Node::uniform(0.0, 1.0).unwrap()).unwrap();
        sampler.initialize().unwrap();
        sampler.network.set_value(u, 5.0);

        let outcome = sampler.sweep().unwrap();
        assert!(outcome[0].log_acceptance.is_nan());
        assert!(!outcome[0].accepted);
        assert_eq!(sampler.value(u), Some(5.0));
        assert_eq!(sampler.acceptance().degenerate(), 1);
    }

    #[test]
    fn observer_sees_every_sweep() {
        let mut sampler = walk(10.0);
        let (speed, position) = position_network(&mut sampler);
        let mut sampler = sampler.register_observer(TraceObserver::new(vec![speed, position]));
        sampler.infer(25).unwrap();
        assert_eq!(sampler.observer().sweeps(), 25);
        assert_eq!(sampler.sweeps(), 25);
        assert!(sampler
            .observer()
            .column(speed)
            .unwrap()
            .iter()
            .all(|&v| v == 5.0));
    }

    #[test]
    fn reset_then_zero_iterations_clears_observer() {
        let mut sampler = walk(10.0);
        let (_, position) = position_network(&mut sampler);
        let mut sampler =
            sampler.register_observer(HistogramObserver::new(5.0, 20.0, 20, position).unwrap());
        sampler.infer(100).unwrap();
        assert_eq!(sampler.observer().histogram().total(), 100);
        let before = sampler.value(position);

        sampler.reset().unwrap();
        sampler.infer(0).unwrap();
        assert_eq!(sampler.observer().histogram().total(), 0);
        assert_ne!(sampler.value(position), before);
        assert_eq!(sampler.acceptance().proposals(), 0);
    }

    #[test]
    fn progress_run_matches_plain_run() {
        let mut plain = walk(10.0);
        let (_, position) = position_network(&mut plain);
        let mut shown = walk(10.0);
        position_network(&mut shown);

        plain.infer(200).unwrap();
        shown.infer_progress(200).unwrap();
        assert_eq!(plain.value(position), shown.value(position));
    }
}
