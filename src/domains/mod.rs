//! Estimation and optimization engines.
//!
//! - Surrogate modeling: Gaussian Process regression
//! - Sequential design: Bayesian optimization, Thompson sampling, conjugate parameter learning
//! - Metaheuristics: simulated annealing, differential evolution, CMA-lite
//! - Swarm/colony: particle swarm, ant colony sequencing
//! - Filtering: linear, scalar and extended Kalman filters
//!
//! Every continuous optimizer minimizes an [`Objective`] over box [`Bounds`].

pub mod annealing;
pub mod bandit;
pub mod colony;
pub mod evolution;
pub mod gaussian_process;
pub mod kalman;
pub mod learner;
pub mod optimization;
pub mod swarm;

use serde::{Deserialize, Serialize};

use crate::engine::rng::TuneRng;
use crate::error::{TuneError, TuneResult};

pub use annealing::{gaussian_neighbor, AnnealingConfig, AnnealingResult, SimulatedAnnealing};
pub use bandit::{ArmStatistics, ThompsonSampler};
pub use colony::{AntColony, ColonyConfig, CostMatrix, SequenceResult};
pub use evolution::{CmaConfig, CmaLite, DifferentialEvolution, EvolutionConfig};
pub use gaussian_process::{GaussianProcess, GpConfig, Prediction};
pub use kalman::{
    ExtendedKalmanFilter, KalmanConfig, KalmanFilter, ScalarKalmanFilter, StateModel,
};
pub use learner::{Belief, ParameterLearner};
pub use optimization::{AcquisitionFunction, BayesianOptimizer, Direction, OptimizerConfig};
pub use swarm::{ObjectiveMode, ObjectiveWeights, ParticleSwarm, SubObjectives, SwarmConfig};

/// Box constraints: one `(min, max)` pair per dimension.
pub type Bounds = [(f64, f64)];

/// Scalar objective to minimize.
///
/// Implemented for every `Fn(&[f64]) -> f64`, so closures can be passed
/// directly.
pub trait Objective {
    /// Evaluate the objective at `x`.
    fn evaluate(&self, x: &[f64]) -> f64;
}

impl<F> Objective for F
where
    F: Fn(&[f64]) -> f64,
{
    fn evaluate(&self, x: &[f64]) -> f64 {
        self(x)
    }
}

/// Reject empty, inverted or non-finite bounds.
///
/// # Errors
///
/// Returns `InvalidBounds` describing the first offending dimension.
pub fn validate_bounds(bounds: &Bounds) -> TuneResult<()> {
    if bounds.is_empty() {
        return Err(TuneError::invalid_bounds("no dimensions"));
    }
    for (i, (min, max)) in bounds.iter().enumerate() {
        if !min.is_finite() || !max.is_finite() {
            return Err(TuneError::invalid_bounds(format!(
                "dimension {i} has non-finite limits"
            )));
        }
        if min > max {
            return Err(TuneError::invalid_bounds(format!(
                "dimension {i}: min {min} > max {max}"
            )));
        }
    }
    Ok(())
}

/// Clamp every coordinate into its bound.
pub fn clamp_to_bounds(x: &mut [f64], bounds: &Bounds) {
    for (v, (min, max)) in x.iter_mut().zip(bounds) {
        *v = v.clamp(*min, *max);
    }
}

/// Uniformly random point inside the bounds.
pub fn random_point(bounds: &Bounds, rng: &mut TuneRng) -> Vec<f64> {
    bounds
        .iter()
        .map(|(min, max)| rng.gen_range_f64(*min, *max))
        .collect()
}

/// Center of the bounding box.
#[must_use]
pub fn midpoint(bounds: &Bounds) -> Vec<f64> {
    bounds.iter().map(|(min, max)| 0.5 * (min + max)).collect()
}

/// Result of a continuous optimization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// Best found point.
    pub best_x: Vec<f64>,
    /// Objective value at `best_x`.
    pub best_fitness: f64,
    /// Number of objective evaluations.
    pub n_evaluations: usize,
    /// Generations (or iterations) completed.
    pub iterations: usize,
    /// Best fitness after each generation.
    pub convergence: Vec<f64>,
    /// Objective evaluations that returned a non-finite value.
    pub non_finite_evaluations: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_objective_blanket_impl() {
        let sphere = |x: &[f64]| x.iter().map(|v| v * v).sum::<f64>();
        assert!((sphere.evaluate(&[3.0, 4.0]) - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_validate_bounds() {
        assert!(validate_bounds(&[(0.0, 1.0), (-5.0, 5.0)]).is_ok());
        assert!(validate_bounds(&[(2.0, 2.0)]).is_ok());
        assert!(validate_bounds(&[]).is_err());
        assert!(validate_bounds(&[(1.0, 0.0)]).is_err());
        assert!(validate_bounds(&[(0.0, f64::INFINITY)]).is_err());
        assert!(validate_bounds(&[(f64::NAN, 1.0)]).is_err());
    }

    #[test]
    fn test_clamp_and_random_point() {
        let bounds = [(0.0, 1.0), (10.0, 20.0)];
        let mut x = vec![-3.0, 25.0];
        clamp_to_bounds(&mut x, &bounds);
        assert_eq!(x, vec![0.0, 20.0]);

        let mut rng = TuneRng::new(9);
        for _ in 0..100 {
            let p = random_point(&bounds, &mut rng);
            assert!((0.0..=1.0).contains(&p[0]));
            assert!((10.0..=20.0).contains(&p[1]));
        }

        assert_eq!(midpoint(&bounds), vec![0.5, 15.0]);
    }

    #[test]
    fn test_result_serializes() {
        let result = OptimizationResult {
            best_x: vec![1.0, 2.0],
            best_fitness: 0.5,
            n_evaluations: 10,
            iterations: 2,
            convergence: vec![1.0, 0.5],
            non_finite_evaluations: 0,
        };
        let json = serde_json::to_string(&result).expect("serialize");
        let back: OptimizationResult = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.best_x, result.best_x);
        assert_eq!(back.iterations, 2);
    }
}
