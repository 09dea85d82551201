//! Bayesian optimization over a Gaussian Process surrogate.
//!
//! The optimizer recommends the next parameter point for an expensive
//! experiment:
//!
//! 1. The first `initial_random` suggestions are uniform random points in
//!    the bounds (pure exploration, seeded).
//! 2. Afterwards the acquisition function is maximized over a deterministic
//!    grid with `grid_resolution` points per dimension on the first
//!    `max_grid_dims` dimensions. Remaining dimensions are held at the
//!    incumbent's coordinates.
//!
//! # Acquisition Functions
//!
//! - **Expected Improvement (EI)**: `imp·Φ(z) + σ·φ(z)`, `z = imp/σ`
//! - **Upper Confidence Bound (UCB)**: tunable exploration via kappa
//! - **Probability of Improvement (PI)**: conservative improvement strategy
//!
//! `Φ` uses the Abramowitz-Stegun 7.1.26 rational approximation of `erf`.
//!
//! # Example
//!
//! ```rust
//! use paramtune::domains::optimization::{BayesianOptimizer, OptimizerConfig};
//!
//! let config = OptimizerConfig {
//!     bounds: vec![(0.0, 10.0)],
//!     ..Default::default()
//! };
//! let mut optimizer = BayesianOptimizer::new(config).unwrap();
//!
//! for _ in 0..8 {
//!     let x = optimizer.suggest();
//!     let y = -(x[0] - 6.0).powi(2);
//!     optimizer.observe(x, y).unwrap();
//! }
//! let (_, best_y) = optimizer.best().unwrap();
//! assert!(best_y <= 0.0);
//! ```

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::gaussian_process::{GaussianProcess, GpConfig};
use super::{midpoint, random_point, validate_bounds};
use crate::engine::guard::NumericGuard;
use crate::engine::rng::TuneRng;
use crate::error::{TuneError, TuneResult};

/// Standard deviations below this carry no expected improvement.
pub const SIGMA_EPSILON: f64 = 1e-10;

/// Acquisition functions for Bayesian optimization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AcquisitionFunction {
    /// Expected Improvement - balances exploration/exploitation.
    #[default]
    ExpectedImprovement,
    /// Upper Confidence Bound with exploration parameter kappa.
    Ucb {
        /// Weight on the posterior standard deviation.
        kappa: f64,
    },
    /// Probability of Improvement - conservative strategy.
    ProbabilityOfImprovement,
}

/// Whether larger or smaller observations are better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    /// Larger outcomes are better (throughput, quality scores).
    #[default]
    Maximize,
    /// Smaller outcomes are better (cost, cycle time).
    Minimize,
}

impl Direction {
    /// True if `candidate` beats `incumbent`.
    #[must_use]
    pub fn improves(self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Self::Maximize => candidate > incumbent,
            Self::Minimize => candidate < incumbent,
        }
    }

    /// Signed improvement of a predicted mean over the incumbent, less `xi`.
    #[must_use]
    pub fn improvement(self, mu: f64, best: f64, xi: f64) -> f64 {
        match self {
            Self::Maximize => mu - best - xi,
            Self::Minimize => best - mu - xi,
        }
    }
}

/// Configuration for Bayesian optimizer.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct OptimizerConfig {
    /// Parameter bounds: (min, max) for each dimension.
    pub bounds: Vec<(f64, f64)>,
    /// Acquisition function to use.
    #[serde(default)]
    pub acquisition: AcquisitionFunction,
    /// Optimization direction.
    #[serde(default)]
    pub direction: Direction,
    /// Kernel hyperparameters of the surrogate.
    #[validate(nested)]
    #[serde(default)]
    pub gp: GpConfig,
    /// Exploration margin ξ subtracted from the improvement.
    #[validate(range(min = 0.0))]
    #[serde(default = "default_xi")]
    pub xi: f64,
    /// Number of initial purely random suggestions.
    #[serde(default = "default_initial_random")]
    pub initial_random: usize,
    /// Grid points per dimension for acquisition maximization.
    #[validate(range(min = 1, max = 1000))]
    #[serde(default = "default_grid_resolution")]
    pub grid_resolution: usize,
    /// Number of leading dimensions covered by the grid.
    #[validate(range(min = 1, max = 6))]
    #[serde(default = "default_max_grid_dims")]
    pub max_grid_dims: usize,
    /// RNG seed for reproducibility.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

const fn default_xi() -> f64 {
    0.01
}

const fn default_initial_random() -> usize {
    5
}

const fn default_grid_resolution() -> usize {
    20
}

const fn default_max_grid_dims() -> usize {
    3
}

const fn default_seed() -> u64 {
    42
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            bounds: vec![(-1.0, 1.0)],
            acquisition: AcquisitionFunction::default(),
            direction: Direction::default(),
            gp: GpConfig::default(),
            xi: default_xi(),
            initial_random: default_initial_random(),
            grid_resolution: default_grid_resolution(),
            max_grid_dims: default_max_grid_dims(),
            seed: default_seed(),
        }
    }
}

/// Bayesian optimizer using Gaussian Process surrogate.
#[derive(Debug)]
pub struct BayesianOptimizer {
    config: OptimizerConfig,
    gp: GaussianProcess,
    /// RNG for the exploration phase.
    rng: TuneRng,
    /// Suggestions handed out so far.
    n_suggestions: usize,
    best_y: Option<f64>,
    best_x: Option<Vec<f64>>,
}

impl BayesianOptimizer {
    /// Create a new Bayesian optimizer.
    ///
    /// # Errors
    ///
    /// Returns `InvalidBounds` for empty, inverted or non-finite bounds.
    pub fn new(config: OptimizerConfig) -> TuneResult<Self> {
        validate_bounds(&config.bounds)?;
        let gp = GaussianProcess::new(config.gp);
        let rng = TuneRng::new(config.seed);

        Ok(Self {
            config,
            gp,
            rng,
            n_suggestions: 0,
            best_y: None,
            best_x: None,
        })
    }

    /// Record an evaluated point.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if `x` does not match the bounds and
    /// `NonFiniteValue` for a NaN or infinite `x` or `y`. Rejected
    /// observations leave the optimizer unchanged.
    pub fn observe(&mut self, x: Vec<f64>, y: f64) -> TuneResult<()> {
        let d = self.config.bounds.len();
        if x.len() != d {
            return Err(TuneError::dimension_mismatch("bayesian.observe", d, x.len()));
        }
        let mut guard = NumericGuard::new();
        guard.check_values(&x, "bayesian.observe input")?;
        guard.check_value(y, "bayesian.observe target")?;

        let improved = self
            .best_y
            .map_or(true, |best| self.config.direction.improves(y, best));
        if improved {
            self.best_y = Some(y);
            self.best_x = Some(x.clone());
        }
        self.gp.update(x, y)
    }

    /// Suggest the next point to evaluate.
    #[must_use]
    pub fn suggest(&mut self) -> Vec<f64> {
        self.n_suggestions += 1;
        if self.n_suggestions <= self.config.initial_random || self.gp.n_observations() == 0 {
            return random_point(&self.config.bounds, &mut self.rng);
        }
        self.grid_search()
    }

    /// Maximize the acquisition function over the fixed grid.
    fn grid_search(&self) -> Vec<f64> {
        let bounds = &self.config.bounds;
        let resolution = self.config.grid_resolution.max(1);
        let grid_dims = bounds.len().min(self.config.max_grid_dims);

        let mut point = self
            .best_x
            .clone()
            .unwrap_or_else(|| midpoint(bounds));
        let mut best_point = point.clone();
        let mut best_acq = f64::NEG_INFINITY;

        let mut counters = vec![0usize; grid_dims];
        let total = resolution.pow(grid_dims as u32);
        for _ in 0..total {
            for (dim, &i) in counters.iter().enumerate() {
                let (min, max) = bounds[dim];
                point[dim] = if resolution == 1 {
                    0.5 * (min + max)
                } else {
                    min + (max - min) * i as f64 / (resolution - 1) as f64
                };
            }

            let acq = self.acquisition_at(&point);
            if acq > best_acq {
                best_acq = acq;
                best_point.clone_from(&point);
            }

            // Mixed-radix increment over the grid indices.
            for c in &mut counters {
                *c += 1;
                if *c < resolution {
                    break;
                }
                *c = 0;
            }
        }

        tracing::trace!(
            evaluated = total,
            acquisition = best_acq,
            "acquisition grid search complete"
        );
        best_point
    }

    /// Evaluate the configured acquisition function at a point.
    #[must_use]
    pub fn acquisition_at(&self, x: &[f64]) -> f64 {
        let prediction = self.gp.predict_point(x);
        let mu = prediction.mean;
        let sigma = prediction.std_dev;
        let direction = self.config.direction;
        let best = self.best_y.unwrap_or(0.0);

        match self.config.acquisition {
            AcquisitionFunction::ExpectedImprovement => {
                expected_improvement(mu, sigma, best, self.config.xi, direction)
            }
            AcquisitionFunction::Ucb { kappa } => upper_confidence_bound(mu, sigma, kappa, direction),
            AcquisitionFunction::ProbabilityOfImprovement => {
                probability_of_improvement(mu, sigma, best, self.config.xi, direction)
            }
        }
    }

    /// Get the best observed point.
    #[must_use]
    pub fn best(&self) -> Option<(&[f64], f64)> {
        match (&self.best_x, self.best_y) {
            (Some(x), Some(y)) => Some((x.as_slice(), y)),
            _ => None,
        }
    }

    /// Get number of observations.
    #[must_use]
    pub fn n_observations(&self) -> usize {
        self.gp.n_observations()
    }

    /// Number of suggestions handed out.
    #[must_use]
    pub const fn n_suggestions(&self) -> usize {
        self.n_suggestions
    }

    /// The surrogate model.
    #[must_use]
    pub const fn gaussian_process(&self) -> &GaussianProcess {
        &self.gp
    }

    /// Observation history in arrival order.
    #[must_use]
    pub fn history(&self) -> Vec<(Vec<f64>, f64)> {
        self.gp.observations().map(|(x, y)| (x.to_vec(), y)).collect()
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &OptimizerConfig {
        &self.config
    }
}

/// Expected Improvement. Zero when `sigma < 1e-10`; never negative.
#[must_use]
pub fn expected_improvement(mu: f64, sigma: f64, best: f64, xi: f64, direction: Direction) -> f64 {
    if sigma < SIGMA_EPSILON {
        return 0.0;
    }
    let imp = direction.improvement(mu, best, xi);
    let z = imp / sigma;
    (imp * normal_cdf(z) + sigma * normal_pdf(z)).max(0.0)
}

/// Upper Confidence Bound (lower confidence bound when minimizing).
#[must_use]
pub fn upper_confidence_bound(mu: f64, sigma: f64, kappa: f64, direction: Direction) -> f64 {
    match direction {
        Direction::Maximize => mu + kappa * sigma,
        Direction::Minimize => -mu + kappa * sigma,
    }
}

/// Probability of Improvement.
#[must_use]
pub fn probability_of_improvement(
    mu: f64,
    sigma: f64,
    best: f64,
    xi: f64,
    direction: Direction,
) -> f64 {
    let imp = direction.improvement(mu, best, xi);
    if sigma < SIGMA_EPSILON {
        return if imp > 0.0 { 1.0 } else { 0.0 };
    }
    normal_cdf(imp / sigma)
}

/// Standard normal PDF.
#[must_use]
pub fn normal_pdf(z: f64) -> f64 {
    const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7; // 1 / sqrt(2 * pi)
    INV_SQRT_2PI * (-0.5 * z * z).exp()
}

/// Standard normal CDF via [`erf`].
#[must_use]
pub fn normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

/// Error function, Abramowitz and Stegun 7.1.26 (|error| < 1.5e-7).
#[must_use]
pub fn erf(x: f64) -> f64 {
    const A1: f64 = 0.254_829_592;
    const A2: f64 = -0.284_496_736;
    const A3: f64 = 1.421_413_741;
    const A4: f64 = -1.453_152_027;
    const A5: f64 = 1.061_405_429;
    const P: f64 = 0.327_591_1;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - (((((A5 * t + A4) * t) + A3) * t + A2) * t + A1) * t * (-x * x).exp();

    sign * y
}
