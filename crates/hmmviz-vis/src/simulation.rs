//! Synthetic Baum-Welch-style training runs for demos and tests.
//!
//! A run draws a random "converged" model and a random starting model, then
//! blends the current model toward the target a little more each iteration,
//! with shrinking gaussian noise. The log-likelihood climbs with diminishing
//! increments. Nothing here fits real data.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Dirichlet, Distribution, Normal};
use tracing::debug;

use crate::snapshot::{Matrix, Snapshot};

/// Bounds applied to every configuration.
pub const STATE_RANGE: (usize, usize) = (2, 12);
pub const OBSERVATION_RANGE: (usize, usize) = (2, 12);
pub const ITERATION_RANGE: (u64, u64) = (1, 200);

/// Configuration for a simulated training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationConfig {
    pub states: usize,
    pub observations: usize,
    pub iterations: u64,
    /// Seed for deterministic simulation
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            states: 3,
            observations: 4,
            iterations: 30,
            seed: 42,
        }
    }
}

impl SimulationConfig {
    /// Clamp every dimension into its supported range.
    pub fn clamped(self) -> Self {
        Self {
            states: self.states.clamp(STATE_RANGE.0, STATE_RANGE.1),
            observations: self.observations.clamp(OBSERVATION_RANGE.0, OBSERVATION_RANGE.1),
            iterations: self.iterations.clamp(ITERATION_RANGE.0, ITERATION_RANGE.1),
            seed: self.seed,
        }
    }
}

/// Row-major probability table.
#[derive(Debug, Clone)]
struct Table {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Table {
    /// Every row an independent flat Dirichlet draw.
    fn dirichlet(rows: usize, cols: usize, rng: &mut StdRng) -> Self {
        let data = (0..rows).flat_map(|_| dirichlet(cols, rng)).collect();
        Self { rows, cols, data }
    }

    fn to_matrix(&self) -> Matrix {
        Matrix::from_fn(self.rows, self.cols, |r, c| self.data[r * self.cols + c])
    }

    fn normalise_rows(&mut self) {
        for row in self.data.chunks_mut(self.cols.max(1)) {
            normalise(row);
        }
    }
}

/// Flat Dirichlet sample over `k` categories.
fn dirichlet(k: usize, rng: &mut StdRng) -> Vec<f64> {
    match Dirichlet::new_with_size(1.0, k) {
        Ok(flat) => flat.sample(rng),
        // Fewer than two categories: the only distribution is all mass on one.
        Err(_) => vec![1.0; k],
    }
}

/// Scale to sum 1. An all-zero vector is left as is.
fn normalise(values: &mut [f64]) {
    let sum: f64 = values.iter().sum();
    let sum = if sum == 0.0 { 1.0 } else { sum };
    for v in values {
        *v /= sum;
    }
}

const BLEND_RATE: f64 = 0.12;
const NOISE_SCALE: f64 = 0.005;
const NOISE_CLIP: f64 = 0.05;
const INITIAL_FLOOR: f64 = 1e-10;
const LIKELIHOOD_DECAY: f64 = 0.05;

/// Iterator over the snapshots of one simulated run.
#[derive(Debug, Clone)]
pub struct TrainingSimulation {
    config: SimulationConfig,
    rng: StdRng,
    transition_target: Table,
    emission_target: Table,
    initial_target: Vec<f64>,
    transition: Table,
    emission: Table,
    initial: Vec<f64>,
    log_likelihood: f64,
    iteration: u64,
}

impl TrainingSimulation {
    pub fn new(config: SimulationConfig) -> Self {
        let config = config.clamped();
        let mut rng = StdRng::seed_from_u64(config.seed);
        let (n, m) = (config.states, config.observations);

        let transition_target = Table::dirichlet(n, n, &mut rng);
        let emission_target = Table::dirichlet(n, m, &mut rng);
        let initial_target = dirichlet(n, &mut rng);

        let transition = Table::dirichlet(n, n, &mut rng);
        let emission = Table::dirichlet(n, m, &mut rng);
        let initial = dirichlet(n, &mut rng);

        let log_likelihood = -500.0 - rng.gen::<f64>() * 200.0;
        debug!(
            states = n,
            observations = m,
            iterations = config.iterations,
            seed = config.seed,
            "starting simulated training run"
        );

        Self {
            config,
            rng,
            transition_target,
            emission_target,
            initial_target,
            transition,
            emission,
            initial,
            log_likelihood,
            iteration: 0,
        }
    }

    /// Simulate a whole run.
    pub fn run(config: SimulationConfig) -> Vec<Snapshot> {
        Self::new(config).collect()
    }

    /// The effective (clamped) configuration.
    pub fn config(&self) -> SimulationConfig {
        self.config
    }

    /// Move `current` toward `target` by `alpha`, add clipped noise, floor
    /// at `floor`.
    fn blend(
        &mut self,
        current: &mut [f64],
        target: &[f64],
        alpha: f64,
        noise: Option<&Normal<f64>>,
        floor: f64,
    ) {
        for (v, t) in current.iter_mut().zip(target) {
            let jitter = noise.map_or(0.0, |n| n.sample(&mut self.rng).clamp(-NOISE_CLIP, NOISE_CLIP));
            *v = ((1.0 - alpha) * *v + alpha * t + jitter).max(floor);
        }
    }
}

impl Iterator for TrainingSimulation {
    type Item = Snapshot;

    fn next(&mut self) -> Option<Snapshot> {
        if self.iteration >= self.config.iterations {
            return None;
        }
        self.iteration += 1;
        let i = self.iteration as f64;
        let alpha = 1.0 - (-BLEND_RATE * i).exp();
        let noise = Normal::new(0.0, NOISE_SCALE / i).ok();

        let mut transition = std::mem::take(&mut self.transition.data);
        let target = std::mem::take(&mut self.transition_target.data);
        self.blend(&mut transition, &target, alpha, noise.as_ref(), 0.0);
        self.transition.data = transition;
        self.transition_target.data = target;
        self.transition.normalise_rows();

        let mut emission = std::mem::take(&mut self.emission.data);
        let target = std::mem::take(&mut self.emission_target.data);
        self.blend(&mut emission, &target, alpha, noise.as_ref(), 0.0);
        self.emission.data = emission;
        self.emission_target.data = target;
        self.emission.normalise_rows();

        let mut initial = std::mem::take(&mut self.initial);
        let target = std::mem::take(&mut self.initial_target);
        self.blend(&mut initial, &target, alpha, noise.as_ref(), INITIAL_FLOOR);
        normalise(&mut initial);
        self.initial = initial;
        self.initial_target = target;

        self.log_likelihood += self.rng.gen_range(1.0..15.0) * (-LIKELIHOOD_DECAY * i).exp();

        Some(Snapshot::new(
            self.iteration,
            self.transition.to_matrix(),
            self.emission.to_matrix(),
            self.initial.clone(),
            (self.log_likelihood * 1e4).round() / 1e4,
        ))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.config.iterations - self.iteration) as usize;
        (left, Some(left))
    }
}
