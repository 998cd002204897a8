/*!
One-dimensional proposal kernels for the Metropolis–Hastings step.

A kernel draws a candidate from the current value and reports the (unnormalized)
log density of moving between two values. The sampler always applies the
Hastings correction `q(proposal -> original) / q(original -> proposal)`, so
asymmetric kernels such as [`MultiplicativeLogNormal`] need no special casing.

```rust
use hopper::proposal::{GaussianRandomWalk, ProposalDensity};
use hopper::random::SeededSource;

let kernel = GaussianRandomWalk::new(10.0).unwrap();
let mut rng = SeededSource::new(42);
let candidate = kernel.draw(15.0, &mut rng);
assert_eq!(kernel.log_transition(15.0, candidate), kernel.log_transition(candidate, 15.0));
```
*/

use crate::error::{HopperError, Result};
use crate::random::RandomSource;

/// A proposal distribution `q(to | from)` over scalar values.
pub trait ProposalDensity {
    /// Samples a candidate from `q(· | current)`.
    fn draw<R: RandomSource + ?Sized>(&self, current: f64, rng: &mut R) -> f64;

    /// Evaluates `log q(to | from)` up to an additive constant.
    ///
    /// Must not be assumed symmetric in its arguments.
    fn log_transition(&self, from: f64, to: f64) -> f64;

    /// Unnormalized transition density, `exp(log_transition)`.
    fn transition(&self, from: f64, to: f64) -> f64 {
        self.log_transition(from, to).exp()
    }
}

fn check_variance(sigma2: f64) -> Result<()> {
    if sigma2.is_finite() && sigma2 > 0.0 {
        Ok(())
    } else {
        Err(HopperError::InvalidParameter(format!(
            "proposal variance must be finite and positive, got {sigma2}"
        )))
    }
}

/// Additive random walk: `to = from + Normal(0, sigma2)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianRandomWalk {
    sigma2: f64,
    half_inv_sigma2: f64,
}

impl GaussianRandomWalk {
    pub fn new(sigma2: f64) -> Result<Self> {
        check_variance(sigma2)?;
        Ok(Self {
            sigma2,
            half_inv_sigma2: 0.5 / sigma2,
        })
    }

    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }
}

impl ProposalDensity for GaussianRandomWalk {
    fn draw<R: RandomSource + ?Sized>(&self, current: f64, rng: &mut R) -> f64 {
        current + rng.gaussian(self.sigma2)
    }

    fn log_transition(&self, from: f64, to: f64) -> f64 {
        let diff = from - to;
        -diff * diff * self.half_inv_sigma2
    }
}

/// Multiplicative random walk: `to = from * exp(Normal(0, sigma2))`.
///
/// Keeps the sign of the current value and never proposes zero, which suits
/// strictly positive quantities. The kernel is asymmetric:
/// `log q(to | from) = -ln(to / from)^2 / (2 sigma2) - ln|to|`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultiplicativeLogNormal {
    sigma2: f64,
}

impl MultiplicativeLogNormal {
    pub fn new(sigma2: f64) -> Result<Self> {
        check_variance(sigma2)?;
        Ok(Self { sigma2 })
    }

    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }
}

impl ProposalDensity for MultiplicativeLogNormal {
    fn draw<R: RandomSource + ?Sized>(&self, current: f64, rng: &mut R) -> f64 {
        current * rng.gaussian(self.sigma2).exp()
    }

    fn log_transition(&self, from: f64, to: f64) -> f64 {
        let ratio = to / from;
        if !(ratio > 0.0 && ratio.is_finite()) {
            return f64::NEG_INFINITY;
        }
        let log_ratio = ratio.ln();
        -log_ratio * log_ratio * 0.5 / self.sigma2 - to.abs().ln()
    }
}
