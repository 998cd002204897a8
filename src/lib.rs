/*!
Approximate Bayesian inference over small networks of scalar continuous random
variables with Metropolis–Hastings.

Build a network of [`node::Node`]s inside a [`metropolis_hastings::MetroSampler`],
pin some of them to observed values, attach an [`observer::Observer`] and run
sweeps. Each sweep proposes a new value for every free node and then hands the
joint sample to the observer.

```rust
use hopper::metropolis_hastings::MetroSampler;
use hopper::node::Node;
use hopper::observer::HistogramObserver;
use hopper::proposal::GaussianRandomWalk;

// Infer a speed from an observed position.
let mut sampler = MetroSampler::new(GaussianRandomWalk::new(5.0).unwrap()).set_seed(7);
let speed = sampler.register(Node::uniform(0.0, 10.0).unwrap()).unwrap();
let position = sampler
    .register(Node::gaussian_evidence(vec![10.0, 1.0], 4.0, 15.0).unwrap())
    .unwrap();
sampler.edge_from(position, speed).unwrap();

let mut sampler = sampler.register_observer(HistogramObserver::new(0.0, 10.0, 20, speed).unwrap());
sampler.reset().unwrap();
sampler.infer(500).unwrap();
println!("{}", sampler.observer().to_json().unwrap());
```
*/

pub mod error;
pub mod histogram;
pub mod io;
pub mod metropolis_hastings;
pub mod network;
pub mod node;
pub mod observer;
pub mod proposal;
pub mod random;
pub mod stats;

pub use error::{HopperError, Result};
