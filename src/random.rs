/*!
Random draws used by node sampling, proposals and the accept/reject test.

A sampler owns exactly one [`RandomSource`]. Every draw of a run goes through it,
so two samplers built with the same seed and the same network produce the same
chain, including the same accept/reject decisions.

```rust
use hopper::random::{RandomSource, SeededSource};

let mut a = SeededSource::new(7);
let mut b = SeededSource::new(7);
assert_eq!(a.gaussian(2.0), b.gaussian(2.0));
assert!((0.0..1.0).contains(&a.uniform()));
```
*/

use rand::rngs::SmallRng;
use rand::{thread_rng, Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

/// Source of the two kinds of independent draws the sampler needs.
pub trait RandomSource {
    /// Draws from `Normal(0, sigma2)`. Note that `sigma2` is a variance.
    fn gaussian(&mut self, sigma2: f64) -> f64;

    /// Draws uniformly from `[0, 1)`.
    fn uniform(&mut self) -> f64;
}

/// [`RandomSource`] backed by a seeded [`SmallRng`].
#[derive(Debug, Clone)]
pub struct SeededSource {
    /// The seed this source was created from.
    pub seed: u64,
    rng: SmallRng,
}

impl SeededSource {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Creates a source with a seed taken from the thread-local generator.
    pub fn from_entropy() -> Self {
        Self::new(thread_rng().gen::<u64>())
    }
}

impl Default for SeededSource {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl RandomSource for SeededSource {
    fn gaussian(&mut self, sigma2: f64) -> f64 {
        let z: f64 = StandardNormal.sample(&mut self.rng);
        z * sigma2.sqrt()
    }

    fn uniform(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

impl<R: RandomSource + ?Sized> RandomSource for &mut R {
    fn gaussian(&mut self, sigma2: f64) -> f64 {
        (**self).gaussian(sigma2)
    }

    fn uniform(&mut self) -> f64 {
        (**self).uniform()
    }
}
