//! Runs one of the two reference experiments and prints the histogram of the
//! inferred node.
//!
//! - `position`: speed observed at 5, infer the next position
//!   `Normal(10 + speed, 4)`.
//! - `speed`: next position observed at 15, infer a `Uniform(0, 10)` speed.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use hopper::metropolis_hastings::MetroSampler;
use hopper::node::{Node, NodeId};
use hopper::observer::HistogramObserver;
use hopper::proposal::GaussianRandomWalk;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Experiment {
    Position,
    Speed,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Text,
}

#[derive(Parser)]
#[command(name = "demo", about = "Metropolis-Hastings on a two-node network")]
struct Cli {
    /// Which network to build
    #[arg(long, value_enum, default_value = "position")]
    experiment: Experiment,

    /// Number of sweeps
    #[arg(long, default_value = "10000")]
    iterations: usize,

    /// Random seed; drawn from entropy when omitted
    #[arg(long)]
    seed: Option<u64>,

    /// Variance of the random-walk proposal
    #[arg(long, default_value = "10.0")]
    proposal_sigma2: f64,

    /// Number of histogram bins
    #[arg(long, default_value = "20")]
    bins: usize,

    /// Output format of the histogram
    #[arg(long, value_enum, default_value = "json")]
    format: Format,

    /// Show a progress bar
    #[arg(long)]
    progress: bool,
}

const X_0: f64 = 10.0;
const DELTA_T: f64 = 1.0;
const SIGMA2: f64 = 4.0;

/// Speed observed, next position free. Returns (range, node to histogram).
fn setup_position(sampler: &mut MetroSampler<GaussianRandomWalk>) -> Result<((f64, f64), NodeId)> {
    let speed = sampler.register(Node::evidence(5.0)?.with_name("speed"))?;
    let next_position =
        sampler.register(Node::gaussian(vec![X_0, DELTA_T], SIGMA2)?.with_name("next_position"))?;
    sampler.edge_from(next_position, speed)?;
    Ok(((5.0, 20.0), next_position))
}

/// Next position observed, speed free under a uniform prior.
fn setup_speed(sampler: &mut MetroSampler<GaussianRandomWalk>) -> Result<((f64, f64), NodeId)> {
    let (min_u, max_u) = (0.0, 10.0);
    let speed = sampler.register(Node::uniform(min_u, max_u)?.with_name("speed"))?;
    let next_position = sampler.register(
        Node::gaussian_evidence(vec![X_0, DELTA_T], SIGMA2, 15.0)?.with_name("next_position"),
    )?;
    sampler.edge_from(next_position, speed)?;
    Ok(((min_u, max_u), speed))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut sampler = MetroSampler::new(GaussianRandomWalk::new(cli.proposal_sigma2)?);
    if let Some(seed) = cli.seed {
        sampler = sampler.set_seed(seed);
    }
    info!(seed = sampler.seed(), experiment = ?cli.experiment, "building network");

    let ((start, end), node) = match cli.experiment {
        Experiment::Position => setup_position(&mut sampler)?,
        Experiment::Speed => setup_speed(&mut sampler)?,
    };
    let mut sampler = sampler.register_observer(HistogramObserver::new(start, end, cli.bins, node)?);

    sampler.reset()?;
    if cli.progress {
        sampler.infer_progress(cli.iterations)?;
    } else {
        sampler.infer(cli.iterations)?;
    }
    info!(
        acceptance = sampler.acceptance().overall_rate().unwrap_or(0.0),
        "sampling finished"
    );

    match cli.format {
        Format::Json => println!("{}", sampler.observer().to_json()?),
        Format::Text => println!("{}", sampler.observer().histogram()),
    }
    Ok(())
}
