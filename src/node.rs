/*!
Scalar random variables of a Bayesian network.

A [`Node`] is one of four closed variants ([`NodeKind`]): a linear-Gaussian node
whose mean is a linear function of its parents, the same node clamped to an
observed value, a fixed evidence value, or a uniform prior. Nodes do not own each
other. Parent and child links are [`NodeId`] handles into the
[`Network`](crate::network::Network) arena that owns them.

Densities are unnormalized and evaluated in the log domain. Only ratios of
densities are ever used by the sampler, so normalizing constants cancel.

```rust
use hopper::node::Node;

let prior = Node::uniform(0.0, 10.0).unwrap().with_name("speed");
assert!(!prior.is_evidence());
assert_eq!(prior.log_conditional(4.0, &[]), 0.0);
assert_eq!(prior.log_conditional(12.0, &[]), f64::NEG_INFINITY);
```
*/

use std::fmt;

use crate::error::{HopperError, Result};
use crate::random::RandomSource;

/// Stable handle of a node inside a [`Network`](crate::network::Network).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The conditional distribution a node encodes.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// `Normal(beta[0] + Σ beta[i+1] * parent[i], sigma2)`.
    Gaussian { beta: Vec<f64>, sigma2: f64 },
    /// A linear-Gaussian node whose value has been observed.
    ///
    /// It is never proposed, but its density given its parents still weighs
    /// every proposal made for one of those parents.
    GaussianEvidence {
        beta: Vec<f64>,
        sigma2: f64,
        value: f64,
    },
    /// A constant. Its density is 1 whatever its parents are.
    Evidence { value: f64 },
    /// Flat prior on `[from, to)`.
    ///
    /// The density is 1 on the support, not `1 / (to - from)`.
    Uniform { from: f64, to: f64 },
}

/// A node record: its distribution, an optional debug name and its edges.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    kind: NodeKind,
    name: Option<String>,
    pub(crate) parents: Vec<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

fn check_variance(sigma2: f64) -> Result<()> {
    if sigma2.is_finite() && sigma2 > 0.0 {
        Ok(())
    } else {
        Err(HopperError::InvalidParameter(format!(
            "variance must be finite and positive, got {sigma2}"
        )))
    }
}

fn check_coefficients(beta: &[f64]) -> Result<()> {
    if beta.is_empty() {
        return Err(HopperError::InvalidParameter(
            "coefficient vector needs at least the intercept".into(),
        ));
    }
    if let Some(b) = beta.iter().find(|b| !b.is_finite()) {
        return Err(HopperError::InvalidParameter(format!(
            "coefficients must be finite, got {b}"
        )));
    }
    Ok(())
}

fn check_observed(value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(HopperError::InvalidParameter(format!(
            "observed value must be finite, got {value}"
        )))
    }
}

impl Node {
    fn from_kind(kind: NodeKind) -> Self {
        Self {
            kind,
            name: None,
            parents: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Linear-Gaussian node. `beta[0]` is the intercept, `beta[i + 1]` the
    /// coefficient of the `i`-th parent in wiring order.
    ///
    /// The length of `beta` is checked against the parents once the network
    /// is wired, see [`Network::validate`](crate::network::Network::validate).
    pub fn gaussian(beta: Vec<f64>, sigma2: f64) -> Result<Self> {
        check_coefficients(&beta)?;
        check_variance(sigma2)?;
        Ok(Self::from_kind(NodeKind::Gaussian { beta, sigma2 }))
    }

    /// Linear-Gaussian node observed at `value`.
    pub fn gaussian_evidence(beta: Vec<f64>, sigma2: f64, value: f64) -> Result<Self> {
        check_coefficients(&beta)?;
        check_variance(sigma2)?;
        check_observed(value)?;
        Ok(Self::from_kind(NodeKind::GaussianEvidence {
            beta,
            sigma2,
            value,
        }))
    }

    /// Fixed evidence.
    pub fn evidence(value: f64) -> Result<Self> {
        check_observed(value)?;
        Ok(Self::from_kind(NodeKind::Evidence { value }))
    }

    /// Uniform prior on `[from, to)`.
    pub fn uniform(from: f64, to: f64) -> Result<Self> {
        if !(from.is_finite() && to.is_finite() && from < to) {
            return Err(HopperError::InvalidParameter(format!(
                "uniform bounds must be finite with from < to, got [{from}, {to})"
            )));
        }
        Ok(Self::from_kind(NodeKind::Uniform { from, to }))
    }

    /// Attaches a debug name used in logs and error messages.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name if one was given, otherwise the handle.
    pub fn label(&self, id: NodeId) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => id.to_string(),
        }
    }

    pub fn parents(&self) -> &[NodeId] {
        &self.parents
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn num_parents(&self) -> usize {
        self.parents.len()
    }

    pub fn is_evidence(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Evidence { .. } | NodeKind::GaussianEvidence { .. }
        )
    }

    /// The clamped value of an evidence node.
    pub fn observed_value(&self) -> Option<f64> {
        match self.kind {
            NodeKind::Evidence { value } | NodeKind::GaussianEvidence { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Mean of a linear-Gaussian node given the current parent values.
    pub fn mean(&self, values: &[f64]) -> Option<f64> {
        match &self.kind {
            NodeKind::Gaussian { beta, .. } | NodeKind::GaussianEvidence { beta, .. } => Some(
                self.parents
                    .iter()
                    .zip(&beta[1..])
                    .fold(beta[0], |acc, (p, b)| acc + b * values[p.0]),
            ),
            _ => None,
        }
    }

    /// Log of the unnormalized conditional density of `value` given the
    /// parent values in `values`.
    pub fn log_conditional(&self, value: f64, values: &[f64]) -> f64 {
        match &self.kind {
            NodeKind::Gaussian { sigma2, .. } | NodeKind::GaussianEvidence { sigma2, .. } => {
                let mean = self.mean(values).unwrap_or(f64::NAN);
                let diff = value - mean;
                -diff * diff * 0.5 / sigma2
            }
            NodeKind::Evidence { .. } => 0.0,
            NodeKind::Uniform { from, to } => {
                if (*from..*to).contains(&value) {
                    0.0
                } else {
                    f64::NEG_INFINITY
                }
            }
        }
    }

    /// Unnormalized conditional density, `exp(log_conditional)`.
    pub fn conditional(&self, value: f64, values: &[f64]) -> f64 {
        self.log_conditional(value, values).exp()
    }

    /// Draws from the node's conditional given its parents, ignoring its
    /// current value. Evidence returns its observed value.
    pub fn sample<R: RandomSource + ?Sized>(&self, values: &[f64], rng: &mut R) -> f64 {
        match &self.kind {
            NodeKind::Gaussian { sigma2, .. } => {
                self.mean(values).unwrap_or(f64::NAN) + rng.gaussian(*sigma2)
            }
            NodeKind::GaussianEvidence { value, .. } | NodeKind::Evidence { value } => *value,
            // Rounding can land exactly on `to`, which is outside the support.
            NodeKind::Uniform { from, to } => {
                (from + (to - from) * rng.uniform()).min(to.next_down())
            }
        }
    }

    /// Checks that a linear-Gaussian node has one coefficient per parent
    /// plus the intercept.
    pub(crate) fn check_arity(&self, id: NodeId) -> Result<()> {
        match &self.kind {
            NodeKind::Gaussian { beta, .. } | NodeKind::GaussianEvidence { beta, .. }
                if beta.len() != self.parents.len() + 1 =>
            {
                Err(HopperError::CoefficientMismatch {
                    node: self.label(id),
                    expected: self.parents.len() + 1,
                    actual: beta.len(),
                })
            }
            _ => Ok(()),
        }
    }
}
