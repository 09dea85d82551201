//! Particle swarm optimization.
//!
//! ```text
//! v ← w·v + c1·r1·(pbest − x) + c2·r2·(gbest − x)
//! v ← clamp(v, ±v_max_fraction·(max − min))
//! x ← clamp(x + v, bounds)
//! w ← max(w − w_decay, w_min)
//! ```
//!
//! [`ParticleSwarm::optimize_weighted`] folds the three process scores
//! (throughput, tool life, surface quality; higher is better) into one
//! fitness to minimize: `−(w_t·t + w_l·l + w_s·s)`.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{
    clamp_to_bounds, random_point, validate_bounds, Bounds, Objective, OptimizationResult,
};
use crate::engine::guard::NumericGuard;
use crate::engine::rng::TuneRng;
use crate::error::{TuneError, TuneResult};

/// Particle swarm settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SwarmConfig {
    /// Number of particles.
    #[validate(range(min = 1))]
    #[serde(default = "default_n_particles")]
    pub n_particles: usize,
    /// Velocity/position update rounds.
    #[validate(range(min = 1))]
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    /// Starting inertia weight w.
    #[validate(range(min = 0.0))]
    #[serde(default = "default_inertia")]
    pub inertia: f64,
    /// Linear inertia decrease per iteration.
    #[validate(range(min = 0.0))]
    #[serde(default = "default_inertia_decay")]
    pub inertia_decay: f64,
    /// Inertia floor.
    #[validate(range(min = 0.0))]
    #[serde(default = "default_inertia_min")]
    pub inertia_min: f64,
    /// Cognitive coefficient c1.
    #[validate(range(min = 0.0))]
    #[serde(default = "default_acceleration")]
    pub cognitive: f64,
    /// Social coefficient c2.
    #[validate(range(min = 0.0))]
    #[serde(default = "default_acceleration")]
    pub social: f64,
    /// Velocity cap as a fraction of each bound's width.
    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    #[serde(default = "default_v_max_fraction")]
    pub v_max_fraction: f64,
    /// RNG seed.
    #[serde(default)]
    pub seed: u64,
}

const fn default_n_particles() -> usize {
    30
}

const fn default_iterations() -> usize {
    100
}

const fn default_inertia() -> f64 {
    0.9
}

const fn default_inertia_decay() -> f64 {
    0.005
}

const fn default_inertia_min() -> f64 {
    0.4
}

const fn default_acceleration() -> f64 {
    2.0
}

const fn default_v_max_fraction() -> f64 {
    0.2
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            n_particles: default_n_particles(),
            iterations: default_iterations(),
            inertia: default_inertia(),
            inertia_decay: default_inertia_decay(),
            inertia_min: default_inertia_min(),
            cognitive: default_acceleration(),
            social: default_acceleration(),
            v_max_fraction: default_v_max_fraction(),
            seed: 42,
        }
    }
}

impl SwarmConfig {
    /// Field ranges plus `inertia_min <= inertia`.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn check(&self) -> TuneResult<()> {
        self.validate()?;
        if self.inertia_min > self.inertia {
            return Err(TuneError::config(format!(
                "inertia_min ({}) exceeds inertia ({})",
                self.inertia_min, self.inertia
            )));
        }
        Ok(())
    }
}

/// Process scores for one candidate; higher is better.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SubObjectives {
    /// Material removal rate or parts per hour.
    pub throughput: f64,
    /// Expected tool life.
    pub tool_life: f64,
    /// Surface finish quality.
    pub surface_quality: f64,
}

/// Non-negative weights on [`SubObjectives`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveWeights {
    /// Weight on throughput.
    pub throughput: f64,
    /// Weight on tool life.
    pub tool_life: f64,
    /// Weight on surface quality.
    pub surface_quality: f64,
}

impl ObjectiveWeights {
    /// Weighted sum of the scores.
    #[must_use]
    pub fn score(&self, s: &SubObjectives) -> f64 {
        self.throughput * s.throughput
            + self.tool_life * s.tool_life
            + self.surface_quality * s.surface_quality
    }

    fn is_valid(&self) -> bool {
        [self.throughput, self.tool_life, self.surface_quality]
            .iter()
            .all(|w| w.is_finite() && *w >= 0.0)
    }
}

/// Which sub-objectives drive a weighted swarm search.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectiveMode {
    /// Throughput only.
    Throughput,
    /// Tool life only.
    ToolLife,
    /// Surface quality only.
    SurfaceQuality,
    /// Equal thirds.
    #[default]
    Balanced,
    /// Caller-supplied weights.
    Weighted(ObjectiveWeights),
}

impl ObjectiveMode {
    /// Weights this mode applies.
    #[must_use]
    pub fn weights(&self) -> ObjectiveWeights {
        match self {
            Self::Throughput => ObjectiveWeights {
                throughput: 1.0,
                tool_life: 0.0,
                surface_quality: 0.0,
            },
            Self::ToolLife => ObjectiveWeights {
                throughput: 0.0,
                tool_life: 1.0,
                surface_quality: 0.0,
            },
            Self::SurfaceQuality => ObjectiveWeights {
                throughput: 0.0,
                tool_life: 0.0,
                surface_quality: 1.0,
            },
            Self::Balanced => ObjectiveWeights {
                throughput: 1.0 / 3.0,
                tool_life: 1.0 / 3.0,
                surface_quality: 1.0 / 3.0,
            },
            Self::Weighted(w) => *w,
        }
    }
}

#[derive(Debug, Clone)]
struct Particle {
    position: Vec<f64>,
    velocity: Vec<f64>,
    best_position: Vec<f64>,
    best_fitness: f64,
}

/// Particle swarm optimizer.
#[derive(Debug, Clone)]
pub struct ParticleSwarm {
    config: SwarmConfig,
    rng: TuneRng,
}

impl ParticleSwarm {
    /// Create a swarm.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for out-of-range settings.
    pub fn new(config: SwarmConfig) -> TuneResult<Self> {
        config.check()?;
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
        let v_max: Vec<f64> = bounds
            .iter()
            .map(|(min, max)| self.config.v_max_fraction * (max - min))
            .collect();
        let mut guard = NumericGuard::new();

        let mut particles: Vec<Particle> = (0..self.config.n_particles)
            .map(|_| {
                let position = random_point(bounds, &mut self.rng);
                let velocity = v_max
                    .iter()
                    .map(|v| self.rng.gen_range_f64(-v, *v))
                    .collect();
                let fitness = guard.fitness(objective.evaluate(&position), "particle_swarm");
                Particle {
                    best_position: position.clone(),
                    position,
                    velocity,
                    best_fitness: fitness,
                }
            })
            .collect();
        let mut n_evaluations = particles.len();

        let (mut global_best, mut global_fitness) = particles.iter().fold(
            (particles[0].position.clone(), f64::INFINITY),
            |(x, f), p| {
                if p.best_fitness < f {
                    (p.best_position.clone(), p.best_fitness)
                } else {
                    (x, f)
                }
            },
        );

        let (c1, c2) = (self.config.cognitive, self.config.social);
        let mut w = self.config.inertia;
        let mut convergence = Vec::with_capacity(self.config.iterations);

        for iteration in 0..self.config.iterations {
            for p in &mut particles {
                for d in 0..bounds.len() {
                    let r1 = self.rng.gen_f64();
                    let r2 = self.rng.gen_f64();
                    let v = w * p.velocity[d]
                        + c1 * r1 * (p.best_position[d] - p.position[d])
                        + c2 * r2 * (global_best[d] - p.position[d]);
                    p.velocity[d] = v.clamp(-v_max[d], v_max[d]);
                    p.position[d] += p.velocity[d];
                }
                clamp_to_bounds(&mut p.position, bounds);

                let fitness = guard.fitness(objective.evaluate(&p.position), "particle_swarm");
                n_evaluations += 1;
                if fitness < p.best_fitness {
                    p.best_fitness = fitness;
                    p.best_position.clone_from(&p.position);
                }
                if fitness < global_fitness {
                    global_fitness = fitness;
                    global_best.clone_from(&p.position);
                }
            }

            convergence.push(global_fitness);
            tracing::trace!(iteration, best = global_fitness, inertia = w, "swarm iteration");
            w = (w - self.config.inertia_decay).max(self.config.inertia_min);
        }

        tracing::debug!(best_fitness = global_fitness, n_evaluations, "particle swarm finished");
        Ok(OptimizationResult {
            best_x: global_best,
            best_fitness: global_fitness,
            n_evaluations,
            iterations: self.config.iterations,
            convergence,
            non_finite_evaluations: guard.sanitized_count(),
        })
    }

    /// Maximize a weighted combination of process scores.
    ///
    /// The returned `best_fitness` is the negated weighted score.
    ///
    /// # Errors
    ///
    /// Returns `InvalidBounds` for malformed bounds and a configuration error
    /// for negative or non-finite custom weights.
    pub fn optimize_weighted<F>(
        &mut self,
        scores: F,
        mode: ObjectiveMode,
        bounds: &Bounds,
    ) -> TuneResult<OptimizationResult>
    where
        F: Fn(&[f64]) -> SubObjectives,
    {
        let weights = mode.weights();
        if !weights.is_valid() {
            return Err(TuneError::config(
                "objective weights must be finite and non-negative",
            ));
        }
        let fitness = |x: &[f64]| -weights.score(&scores(x));
        self.optimize(&fitness, bounds)
    }

    /// Settings in use.
    #[must_use]
    pub const fn config(&self) -> &SwarmConfig {
        &self.config
    }
}
