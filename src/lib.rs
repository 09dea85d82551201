//! # paramtune
//!
//! Parameter learning and optimization for noisy, expensive processes.
//!
//! Recommends and refines control parameters (spindle speed, feed, depth of
//! cut) from sparse, noisy observations:
//! - Surrogate modeling: Gaussian Process regression with calibrated uncertainty
//! - Sequential design: Bayesian optimization, Thompson sampling, conjugate learners
//! - Cheap-objective search: annealing, differential evolution, CMA-lite, PSO, ACO
//! - State tracking: linear, scalar and extended Kalman filters
//!
//! Every stochastic component draws from a seeded [`engine::rng::TuneRng`],
//! so identical seeds give identical results.
//!
//! ## Example
//!
//! ```rust
//! use paramtune::prelude::*;
//!
//! let config = TuneConfig::builder()
//!     .seed(42)
//!     .bounds(vec![(100.0, 400.0)])
//!     .build();
//!
//! let mut optimizer = config.bayesian_optimizer().unwrap();
//! let x = optimizer.suggest();
//! optimizer.observe(x, 0.8).unwrap();
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::many_single_char_names,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::suboptimal_flops,
    clippy::imprecise_flops,
    clippy::too_many_lines,
    clippy::missing_const_for_fn,
    clippy::needless_range_loop,
    clippy::manual_midpoint,
)]

pub mod config;
pub mod domains;
pub mod engine;
pub mod error;
pub mod linalg;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::{TuneConfig, TuneConfigBuilder};
    pub use crate::domains::{
        AcquisitionFunction, AntColony, BayesianOptimizer, CmaLite, CostMatrix,
        DifferentialEvolution, Direction, ExtendedKalmanFilter, GaussianProcess, KalmanFilter,
        Objective, OptimizationResult, ParameterLearner, ParticleSwarm, ScalarKalmanFilter,
        SimulatedAnnealing, StateModel, ThompsonSampler,
    };
    pub use crate::engine::{NumericGuard, TuneRng};
    pub use crate::error::{TuneError, TuneResult};
}

/// Re-export for public API
pub use error::{TuneError, TuneResult};
