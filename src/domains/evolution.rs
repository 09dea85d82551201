//! Population-based continuous optimizers.
//!
//! # Differential Evolution (DE/rand/1/bin)
//!
//! ```text
//! mutant  = a + F·(b − c)            a, b, c distinct, ≠ i
//! trial_d = mutant_d  if d == forced or U < CR
//!           x_i,d     otherwise
//! x_i     ← trial     if f(trial) < f(x_i)
//! ```
//!
//! # CMA-lite
//!
//! A reduced evolution strategy: a mean vector and one scalar step size.
//! Each generation samples `lambda` candidates from a diagonal Gaussian whose
//! per-dimension scale is `sigma · (max − min)`, moves the mean to the equal
//! weighted average of the best `lambda / 2`, then decays `sigma`. There is
//! no covariance learning.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{
    clamp_to_bounds, midpoint, random_point, validate_bounds, Bounds, Objective,
    OptimizationResult,
};
use crate::engine::guard::NumericGuard;
use crate::engine::rng::TuneRng;
use crate::error::{TuneError, TuneResult};

/// Smallest population that admits three distinct peers per individual.
pub const MIN_POPULATION: usize = 4;

/// Differential evolution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct EvolutionConfig {
    /// Individuals per generation.
    #[validate(range(min = 4))]
    #[serde(default = "default_population_size")]
    pub population_size: usize,
    /// Differential weight F.
    #[validate(range(exclusive_min = 0.0, max = 2.0))]
    #[serde(default = "default_mutation_factor")]
    pub mutation_factor: f64,
    /// Binomial crossover rate CR.
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_crossover_rate")]
    pub crossover_rate: f64,
    /// Generations to run.
    #[validate(range(min = 1))]
    #[serde(default = "default_generations")]
    pub generations: usize,
    /// RNG seed.
    #[serde(default)]
    pub seed: u64,
}

const fn default_population_size() -> usize {
    30
}

const fn default_mutation_factor() -> f64 {
    0.8
}

const fn default_crossover_rate() -> f64 {
    0.9
}

const fn default_generations() -> usize {
    200
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: default_population_size(),
            mutation_factor: default_mutation_factor(),
            crossover_rate: default_crossover_rate(),
            generations: default_generations(),
            seed: 42,
        }
    }
}

/// Differential evolution optimizer.
#[derive(Debug, Clone)]
pub struct DifferentialEvolution {
    config: EvolutionConfig,
    rng: TuneRng,
}

impl DifferentialEvolution {
    /// Create an optimizer.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the population is smaller than
    /// [`MIN_POPULATION`] or a rate is out of range.
    pub fn new(config: EvolutionConfig) -> TuneResult<Self> {
        if config.population_size < MIN_POPULATION {
            return Err(TuneError::config(format!(
                "differential evolution needs a population of at least {MIN_POPULATION}, got {}",
                config.population_size
            )));
        }
        config.validate()?;
        let rng = TuneRng::new(config.seed);
        Ok(Self { config, rng })
    }

    /// Minimize `objective` inside `bounds`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidBounds` for empty, inverted or non-finite bounds.
    pub fn optimize<O: Objective>(
        &mut self,
        objective: &O,
        bounds: &Bounds,
    ) -> TuneResult<OptimizationResult> {
        validate_bounds(bounds)?;
        let dim = bounds.len();
        let np = self.config.population_size;
        let f = self.config.mutation_factor;
        let cr = self.config.crossover_rate;
        let mut guard = NumericGuard::new();

        let mut population: Vec<Vec<f64>> =
            (0..np).map(|_| random_point(bounds, &mut self.rng)).collect();
        let mut fitness: Vec<f64> = population
            .iter()
            .map(|x| guard.fitness(objective.evaluate(x), "differential_evolution"))
            .collect();
        let mut n_evaluations = np;
        let mut convergence = Vec::with_capacity(self.config.generations);

        for generation in 0..self.config.generations {
            for i in 0..np {
                let [a, b, c] = self.distinct_peers(i, np);
                let forced = self.rng.gen_index(dim);

                let mut trial = population[i].clone();
                for d in 0..dim {
                    if d == forced || self.rng.gen_f64() < cr {
                        let (min, max) = bounds[d];
                        trial[d] = (population[a][d] + f * (population[b][d] - population[c][d]))
                            .clamp(min, max);
                    }
                }

                let trial_fitness =
                    guard.fitness(objective.evaluate(&trial), "differential_evolution");
                n_evaluations += 1;
                if trial_fitness < fitness[i] {
                    population[i] = trial;
                    fitness[i] = trial_fitness;
                }
            }

            let best = fitness[best_index(&fitness)];
            convergence.push(best);
            tracing::trace!(generation, best, "differential evolution generation");
        }

        let best = best_index(&fitness);
        let result = OptimizationResult {
            best_x: population[best].clone(),
            best_fitness: fitness[best],
            n_evaluations,
            iterations: self.config.generations,
            convergence,
            non_finite_evaluations: guard.sanitized_count(),
        };
        tracing::debug!(
            best_fitness = result.best_fitness,
            n_evaluations,
            "differential evolution finished"
        );
        Ok(result)
    }

    /// Three mutually distinct indices, all different from `i`.
    fn distinct_peers(&mut self, i: usize, np: usize) -> [usize; 3] {
        let mut picked = [usize::MAX; 3];
        let mut n = 0;
        while n < 3 {
            let candidate = self.rng.gen_index(np);
            if candidate != i && !picked[..n].contains(&candidate) {
                picked[n] = candidate;
                n += 1;
            }
        }
        picked
    }

    /// Settings in use.
    #[must_use]
    pub const fn config(&self) -> &EvolutionConfig {
        &self.config
    }
}

/// CMA-lite settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CmaConfig {
    /// Candidates sampled per generation.
    #[validate(range(min = 2))]
    #[serde(default = "default_lambda")]
    pub lambda: usize,
    /// Initial step size as a fraction of each bound's width.
    #[validate(range(exclusive_min = 0.0))]
    #[serde(default = "default_initial_sigma")]
    pub initial_sigma: f64,
    /// Step size multiplier applied after every generation.
    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    #[serde(default = "default_sigma_decay")]
    pub sigma_decay: f64,
    /// Generations to run.
    #[validate(range(min = 1))]
    #[serde(default = "default_cma_generations")]
    pub generations: usize,
    /// Starting mean; the bounds' midpoint when absent.
    #[serde(default)]
    pub x0: Option<Vec<f64>>,
    /// RNG seed.
    #[serde(default)]
    pub seed: u64,
}

const fn default_lambda() -> usize {
    12
}

const fn default_initial_sigma() -> f64 {
    0.3
}

const fn default_sigma_decay() -> f64 {
    0.99
}

const fn default_cma_generations() -> usize {
    200
}

impl Default for CmaConfig {
    fn default() -> Self {
        Self {
            lambda: default_lambda(),
            initial_sigma: default_initial_sigma(),
            sigma_decay: default_sigma_decay(),
            generations: default_cma_generations(),
            x0: None,
            seed: 42,
        }
    }
}

/// Simplified covariance-matrix adaptation (diagonal, fixed shape).
#[derive(Debug, Clone)]
pub struct CmaLite {
    config: CmaConfig,
    rng: TuneRng,
}

impl CmaLite {
    /// Create an optimizer.
    ///
    /// # Errors
    ///
    /// Returns a validation error for out-of-range settings.
    pub fn new(config: CmaConfig) -> TuneResult<Self> {
        config.validate()?;
        let rng = TuneRng::new(config.seed);
        Ok(Self { config, rng })
    }

    /// Minimize `objective` inside `bounds`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidBounds` for malformed bounds and `DimensionMismatch`
    /// if `x0` does not match their dimension.
    pub fn optimize<O: Objective>(
        &mut self,
        objective: &O,
        bounds: &Bounds,
    ) -> TuneResult<OptimizationResult> {
        validate_bounds(bounds)?;
        let mut mean = match &self.config.x0 {
            Some(x0) if x0.len() != bounds.len() => {
                return Err(TuneError::dimension_mismatch("cma.x0", bounds.len(), x0.len()));
            }
            Some(x0) => x0.clone(),
            None => midpoint(bounds),
        };
        clamp_to_bounds(&mut mean, bounds);

        let lambda = self.config.lambda;
        let mu = (lambda / 2).max(1);
        let mut sigma = self.config.initial_sigma;
        let mut guard = NumericGuard::new();

        let mut best_fitness = guard.fitness(objective.evaluate(&mean), "cma");
        let mut best_x = mean.clone();
        let mut n_evaluations = 1;
        let mut convergence = Vec::with_capacity(self.config.generations);

        for generation in 0..self.config.generations {
            let mut offspring: Vec<(f64, Vec<f64>)> = Vec::with_capacity(lambda);
            for _ in 0..lambda {
                let mut x: Vec<f64> = mean
                    .iter()
                    .zip(bounds)
                    .map(|(m, (min, max))| m + sigma * (max - min) * self.rng.gen_standard_normal())
                    .collect();
                clamp_to_bounds(&mut x, bounds);
                let fx = guard.fitness(objective.evaluate(&x), "cma");
                offspring.push((fx, x));
            }
            n_evaluations += lambda;
            offspring.sort_by(|a, b| a.0.total_cmp(&b.0));

            if offspring[0].0 < best_fitness {
                best_fitness = offspring[0].0;
                best_x.clone_from(&offspring[0].1);
            }

            mean.fill(0.0);
            for (_, x) in &offspring[..mu] {
                for (m, v) in mean.iter_mut().zip(x) {
                    *m += v / mu as f64;
                }
            }
            sigma *= self.config.sigma_decay;

            convergence.push(best_fitness);
            tracing::trace!(generation, best_fitness, sigma, "cma generation");
        }

        tracing::debug!(best_fitness, n_evaluations, "cma finished");
        Ok(OptimizationResult {
            best_x,
            best_fitness,
            n_evaluations,
            iterations: self.config.generations,
            convergence,
            non_finite_evaluations: guard.sanitized_count(),
        })
    }

    /// Settings in use.
    #[must_use]
    pub const fn config(&self) -> &CmaConfig {
        &self.config
    }
}

fn best_index(fitness: &[f64]) -> usize {
    fitness
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map_or(0, |(i, _)| i)
}
