//! Simulated annealing over an arbitrary solution type.
//!
//! # Acceptance Rule
//!
//! ```text
//! ΔE = E(candidate) − E(current)
//! accept if ΔE < 0, else with probability exp(−ΔE / T)
//! T ← T · cooling_rate        (every iteration)
//! ```
//!
//! The run ends when `T < min_temperature` or after `max_iterations`,
//! whichever comes first. The best solution seen is returned regardless of
//! where the chain ends.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{clamp_to_bounds, validate_bounds, Objective};
use crate::engine::guard::NumericGuard;
use crate::engine::rng::TuneRng;
use crate::error::{TuneError, TuneResult};

/// Annealing schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AnnealingConfig {
    /// Starting temperature.
    #[validate(range(exclusive_min = 0.0))]
    #[serde(default = "default_initial_temperature")]
    pub initial_temperature: f64,
    /// Geometric cooling factor, in (0, 1).
    #[validate(range(exclusive_min = 0.0, exclusive_max = 1.0))]
    #[serde(default = "default_cooling_rate")]
    pub cooling_rate: f64,
    /// Stop once the temperature drops below this.
    #[validate(range(exclusive_min = 0.0))]
    #[serde(default = "default_min_temperature")]
    pub min_temperature: f64,
    /// Hard iteration cap.
    #[validate(range(min = 1))]
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// RNG seed.
    #[serde(default)]
    pub seed: u64,
}

const fn default_initial_temperature() -> f64 {
    100.0
}

const fn default_cooling_rate() -> f64 {
    0.995
}

const fn default_min_temperature() -> f64 {
    1e-3
}

const fn default_max_iterations() -> usize {
    10_000
}

impl Default for AnnealingConfig {
    fn default() -> Self {
        Self {
            initial_temperature: default_initial_temperature(),
            cooling_rate: default_cooling_rate(),
            min_temperature: default_min_temperature(),
            max_iterations: default_max_iterations(),
            seed: 42,
        }
    }
}

/// Outcome of an annealing run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnealingResult<S> {
    /// Best solution seen.
    pub best: S,
    /// Energy of `best`.
    pub best_energy: f64,
    /// Energy of the starting solution.
    pub initial_energy: f64,
    /// Energy of the chain's final state.
    pub final_energy: f64,
    /// Iterations performed.
    pub iterations: usize,
    /// Accepted moves.
    pub accepted: usize,
    /// Temperature when the run stopped.
    pub final_temperature: f64,
    /// Energy evaluations that returned a non-finite value.
    pub non_finite_evaluations: u64,
}

impl<S> AnnealingResult<S> {
    /// Fraction of proposed moves that were accepted.
    #[must_use]
    pub fn acceptance_rate(&self) -> f64 {
        if self.iterations == 0 {
            0.0
        } else {
            self.accepted as f64 / self.iterations as f64
        }
    }
}

/// Simulated annealing driver.
#[derive(Debug, Clone)]
pub struct SimulatedAnnealing {
    config: AnnealingConfig,
    rng: TuneRng,
}

impl SimulatedAnnealing {
    /// Create an annealer.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a non-positive temperature or a
    /// cooling rate outside (0, 1).
    pub fn new(config: AnnealingConfig) -> TuneResult<Self> {
        config.validate()?;
        if config.min_temperature >= config.initial_temperature {
            return Err(TuneError::config(
                "min_temperature must be below initial_temperature",
            ));
        }
        let rng = TuneRng::new(config.seed);
        Ok(Self { config, rng })
    }

    /// Anneal from `initial`, proposing moves with `perturb`.
    pub fn optimize<S, E, P>(&mut self, initial: S, energy: E, mut perturb: P) -> AnnealingResult<S>
    where
        S: Clone,
        E: Fn(&S) -> f64,
        P: FnMut(&S, &mut TuneRng) -> S,
    {
        let mut guard = NumericGuard::new();
        let mut current_energy = guard.fitness(energy(&initial), "annealing");
        let initial_energy = current_energy;
        let mut best = initial.clone();
        let mut best_energy = current_energy;
        let mut current = initial;

        let mut temperature = self.config.initial_temperature;
        let mut iterations = 0;
        let mut accepted = 0;

        while iterations < self.config.max_iterations
            && temperature >= self.config.min_temperature
        {
            let candidate = perturb(&current, &mut self.rng);
            let candidate_energy = guard.fitness(energy(&candidate), "annealing");
            let delta = candidate_energy - current_energy;

            let accept = delta < 0.0 || self.rng.gen_f64() < (-delta / temperature).exp();
            if accept {
                current = candidate;
                current_energy = candidate_energy;
                accepted += 1;
                if current_energy < best_energy {
                    best_energy = current_energy;
                    best.clone_from(&current);
                }
            }

            temperature *= self.config.cooling_rate;
            iterations += 1;
        }

        tracing::debug!(
            iterations,
            accepted,
            best_energy,
            final_temperature = temperature,
            "simulated annealing finished"
        );

        AnnealingResult {
            best,
            best_energy,
            initial_energy,
            final_energy: current_energy,
            iterations,
            accepted,
            final_temperature: temperature,
            non_finite_evaluations: guard.sanitized_count(),
        }
    }

    /// Minimize a continuous objective from `x0` with Gaussian moves of
    /// standard deviation `step` clamped to `bounds`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidBounds` or `DimensionMismatch` for malformed input.
    pub fn minimize<O: Objective>(
        &mut self,
        objective: &O,
        x0: Vec<f64>,
        bounds: &[(f64, f64)],
        step: f64,
    ) -> TuneResult<AnnealingResult<Vec<f64>>> {
        validate_bounds(bounds)?;
        if x0.len() != bounds.len() {
            return Err(TuneError::dimension_mismatch(
                "annealing.minimize",
                bounds.len(),
                x0.len(),
            ));
        }
        let mut start = x0;
        clamp_to_bounds(&mut start, bounds);
        Ok(self.optimize(
            start,
            |x: &Vec<f64>| objective.evaluate(x),
            gaussian_neighbor(step, bounds.to_vec()),
        ))
    }

    /// The schedule in use.
    #[must_use]
    pub const fn config(&self) -> &AnnealingConfig {
        &self.config
    }
}

/// Perturbation that adds `N(0, step²)` to every coordinate and clamps to bounds.
pub fn gaussian_neighbor(
    step: f64,
    bounds: Vec<(f64, f64)>,
) -> impl Fn(&Vec<f64>, &mut TuneRng) -> Vec<f64> {
    move |x, rng| {
        let mut next: Vec<f64> = x.iter().map(|v| rng.gen_normal(*v, step)).collect();
        clamp_to_bounds(&mut next, &bounds);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        assert!(SimulatedAnnealing::new(AnnealingConfig::default()).is_ok());

        let bad_rate = AnnealingConfig {
            cooling_rate: 1.0,
            ..Default::default()
        };
        assert!(SimulatedAnnealing::new(bad_rate).is_err());

        let inverted = AnnealingConfig {
            initial_temperature: 1.0,
            min_temperature: 2.0,
            ..Default::default()
        };
        assert!(SimulatedAnnealing::new(inverted).is_err());
    }

    #[test]
    fn test_quadratic_from_zero() {
        let mut sa = SimulatedAnnealing::new(AnnealingConfig::default()).expect("new");
        let result = sa.optimize(
            0.0_f64,
            |x| (x - 5.0).powi(2),
            |x, rng| x + rng.gen_normal(0.0, 0.5),
        );

        assert!((result.initial_energy - 25.0).abs() < f64::EPSILON);
        assert!(result.best_energy <= result.initial_energy);
        assert!(result.final_energy <= result.initial_energy);
        assert!((result.best - 5.0).abs() < 0.2, "best = {}", result.best);
    }

    #[test]
    fn test_stops_at_min_temperature() {
        let config = AnnealingConfig {
            initial_temperature: 1.0,
            cooling_rate: 0.5,
            min_temperature: 0.1,
            max_iterations: 1000,
            seed: 1,
        };
        let mut sa = SimulatedAnnealing::new(config).expect("new");
        let result = sa.optimize(0.0_f64, |x| x * x, |x, rng| x + rng.gen_normal(0.0, 1.0));

        // 1.0, 0.5, 0.25, 0.125 are >= 0.1; the fifth would start at 0.0625.
        assert_eq!(result.iterations, 4);
        assert!(result.final_temperature < 0.1);
    }

    #[test]
    fn test_stops_at_iteration_cap() {
        let config = AnnealingConfig {
            max_iterations: 17,
            ..Default::default()
        };
        let mut sa = SimulatedAnnealing::new(config).expect("new");
        let result = sa.optimize(0.0_f64, |x| x * x, |x, rng| x + rng.gen_normal(0.0, 1.0));
        assert_eq!(result.iterations, 17);
        assert!(result.acceptance_rate() > 0.0 && result.acceptance_rate() <= 1.0);
    }

    #[test]
    fn test_non_finite_energy_never_wins() {
        let mut sa = SimulatedAnnealing::new(AnnealingConfig {
            max_iterations: 500,
            ..Default::default()
        })
        .expect("new");
        let result = sa.optimize(
            1.0_f64,
            |x| if *x < 0.0 { f64::NAN } else { *x },
            |x, rng| x + rng.gen_normal(0.0, 0.5),
        );
        assert!(result.best >= 0.0);
        assert!(result.best_energy.is_finite());
        assert!(result.non_finite_evaluations > 0);
    }

    #[test]
    fn test_minimize_continuous() {
        let mut sa = SimulatedAnnealing::new(AnnealingConfig::default()).expect("new");
        let bounds = [(-10.0, 10.0), (-10.0, 10.0)];
        let sphere = |x: &[f64]| (x[0] - 1.0).powi(2) + (x[1] + 2.0).powi(2);

        let result = sa
            .minimize(&sphere, vec![8.0, 8.0], &bounds, 0.3)
            .expect("minimize");
        assert!(result.best_energy < 0.05, "energy {}", result.best_energy);
        assert!(result.best.iter().zip(&bounds).all(|(v, (lo, hi))| v >= lo && v <= hi));

        assert!(sa.minimize(&sphere, vec![0.0], &bounds, 0.3).is_err());
    }

    #[test]
    fn test_reproducible() {
        let run = || {
            let mut sa = SimulatedAnnealing::new(AnnealingConfig::default()).expect("new");
            sa.optimize(0.0_f64, |x| (x - 3.0).powi(2), |x, rng| x + rng.gen_normal(0.0, 1.0))
                .best
        };
        assert!((run() - run()).abs() < f64::EPSILON);
    }
}
