//! Configuration system with YAML schema and validation.
//!
//! One [`TuneConfig`] document carries the settings of every engine:
//!
//! ```yaml
//! schema_version: "1.0"
//! seed: 7
//! bayesian:
//!   bounds: [[100.0, 400.0], [0.05, 0.3]]
//!   direction: maximize
//! differential_evolution:
//!   population_size: 40
//! kalman:
//!   measurement_noise: 0.005
//! ```
//!
//! Every section is optional and falls back to its component defaults.
//! Loading runs three layers of checks: serde (`deny_unknown_fields`),
//! `validator` field ranges, then cross-field semantic rules.
//!
//! The top-level `seed` is authoritative: each stochastic component receives
//! its own stream derived from it, overriding any per-section `seed`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::Validate;

use crate::domains::annealing::{AnnealingConfig, SimulatedAnnealing};
use crate::domains::colony::{AntColony, ColonyConfig};
use crate::domains::evolution::{CmaConfig, CmaLite, DifferentialEvolution, EvolutionConfig};
use crate::domains::gaussian_process::{GaussianProcess, GpConfig};
use crate::domains::kalman::{KalmanConfig, KalmanFilter};
use crate::domains::optimization::{BayesianOptimizer, Direction, OptimizerConfig};
use crate::domains::swarm::{ParticleSwarm, SwarmConfig};
use crate::domains::validate_bounds;
use crate::engine::rng::TuneRng;
use crate::error::{TuneError, TuneResult};

/// Streams forked from the master seed, one per stochastic component.
mod stream {
    pub const BAYESIAN: u64 = 0;
    pub const ANNEALING: u64 = 1;
    pub const EVOLUTION: u64 = 2;
    pub const CMA: u64 = 3;
    pub const SWARM: u64 = 4;
    pub const COLONY: u64 = 5;
}

/// Top-level tuning configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct TuneConfig {
    /// Schema version for forward compatibility.
    #[validate(length(min = 1))]
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    /// Master seed for every stochastic component.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Standalone surrogate model.
    #[validate(nested)]
    #[serde(default)]
    pub gaussian_process: GpConfig,

    /// Bayesian optimizer (carries its own surrogate settings).
    #[validate(nested)]
    #[serde(default)]
    pub bayesian: OptimizerConfig,

    /// Simulated annealing schedule.
    #[validate(nested)]
    #[serde(default)]
    pub annealing: AnnealingConfig,

    /// Differential evolution.
    #[validate(nested)]
    #[serde(default)]
    pub differential_evolution: EvolutionConfig,

    /// CMA-lite.
    #[validate(nested)]
    #[serde(default)]
    pub cma: CmaConfig,

    /// Particle swarm.
    #[validate(nested)]
    #[serde(default)]
    pub swarm: SwarmConfig,

    /// Ant colony sequencing.
    #[validate(nested)]
    #[serde(default)]
    pub colony: ColonyConfig,

    /// Drift tracker.
    #[validate(nested)]
    #[serde(default)]
    pub kalman: KalmanConfig,
}

fn default_schema_version() -> String {
    "1.0".to_string()
}

const fn default_seed() -> u64 {
    42
}

impl TuneConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - YAML parsing fails
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(path: P) -> TuneResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns error if parsing or validation fails.
    pub fn from_yaml(yaml: &str) -> TuneResult<Self> {
        let mut config: Self = serde_yaml::from_str(yaml)?;
        config.propagate_seed();
        config.check()?;
        tracing::debug!(seed = config.seed, "loaded tuning configuration");
        Ok(config)
    }

    /// Serialize to YAML.
    ///
    /// # Errors
    ///
    /// Returns `YamlParse` if serialization fails.
    pub fn to_yaml(&self) -> TuneResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Create a builder for configuration.
    #[must_use]
    pub fn builder() -> TuneConfigBuilder {
        TuneConfigBuilder::default()
    }

    /// Run field-range and semantic validation.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn check(&self) -> TuneResult<()> {
        self.validate()?;
        self.validate_semantic()
    }

    /// Validate semantic constraints beyond schema.
    fn validate_semantic(&self) -> TuneResult<()> {
        validate_bounds(&self.bayesian.bounds)?;

        if self.differential_evolution.population_size < 4 {
            return Err(TuneError::config(format!(
                "differential evolution requires a population of at least 4, got {}",
                self.differential_evolution.population_size
            )));
        }

        if self.annealing.min_temperature >= self.annealing.initial_temperature {
            return Err(TuneError::config(
                "annealing min_temperature must be below initial_temperature",
            ));
        }

        self.swarm.check()?;

        if let Some(x0) = &self.cma.x0 {
            if x0.iter().any(|v| !v.is_finite()) {
                return Err(TuneError::config("cma x0 must be finite"));
            }
        }

        Ok(())
    }

    /// Give each stochastic component its own stream of the master seed.
    pub fn propagate_seed(&mut self) {
        let master = TuneRng::new(self.seed);
        self.bayesian.seed = master.fork(stream::BAYESIAN).seed();
        self.annealing.seed = master.fork(stream::ANNEALING).seed();
        self.differential_evolution.seed = master.fork(stream::EVOLUTION).seed();
        self.cma.seed = master.fork(stream::CMA).seed();
        self.swarm.seed = master.fork(stream::SWARM).seed();
        self.colony.seed = master.fork(stream::COLONY).seed();
    }

    /// Standalone Gaussian Process.
    #[must_use]
    pub fn gaussian_process(&self) -> GaussianProcess {
        GaussianProcess::new(self.gaussian_process)
    }

    /// Bayesian optimizer over `bayesian.bounds`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidBounds` for malformed bounds.
    pub fn bayesian_optimizer(&self) -> TuneResult<BayesianOptimizer> {
        BayesianOptimizer::new(self.bayesian.clone())
    }

    /// Simulated annealer.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an invalid schedule.
    pub fn annealer(&self) -> TuneResult<SimulatedAnnealing> {
        SimulatedAnnealing::new(self.annealing.clone())
    }

    /// Differential evolution optimizer.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid population or rate.
    pub fn differential_evolution(&self) -> TuneResult<DifferentialEvolution> {
        DifferentialEvolution::new(self.differential_evolution.clone())
    }

    /// CMA-lite optimizer.
    ///
    /// # Errors
    ///
    /// Returns a validation error for invalid settings.
    pub fn cma(&self) -> TuneResult<CmaLite> {
        CmaLite::new(self.cma.clone())
    }

    /// Particle swarm.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid settings.
    pub fn particle_swarm(&self) -> TuneResult<ParticleSwarm> {
        ParticleSwarm::new(self.swarm.clone())
    }

    /// Ant colony sequencer.
    ///
    /// # Errors
    ///
    /// Returns a validation error for invalid settings.
    pub fn ant_colony(&self) -> TuneResult<AntColony> {
        AntColony::new(self.colony.clone())
    }

    /// 2-state drift tracker.
    ///
    /// # Errors
    ///
    /// Returns a validation error for invalid noise settings.
    pub fn drift_tracker(&self) -> TuneResult<KalmanFilter> {
        KalmanFilter::drift_tracker(&self.kalman)
    }
}

impl Default for TuneConfig {
    fn default() -> Self {
        let mut config = Self {
            schema_version: default_schema_version(),
            seed: default_seed(),
            gaussian_process: GpConfig::default(),
            bayesian: OptimizerConfig::default(),
            annealing: AnnealingConfig::default(),
            differential_evolution: EvolutionConfig::default(),
            cma: CmaConfig::default(),
            swarm: SwarmConfig::default(),
            colony: ColonyConfig::default(),
            kalman: KalmanConfig::default(),
        };
        config.propagate_seed();
        config
    }
}

/// Configuration builder for programmatic construction.
#[derive(Debug, Default)]
pub struct TuneConfigBuilder {
    seed: Option<u64>,
    bounds: Option<Vec<(f64, f64)>>,
    direction: Option<Direction>,
    gaussian_process: Option<GpConfig>,
    differential_evolution: Option<EvolutionConfig>,
    swarm: Option<SwarmConfig>,
    kalman: Option<KalmanConfig>,
}

impl TuneConfigBuilder {
    /// Set the master seed.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the Bayesian optimizer's search bounds.
    #[must_use]
    pub fn bounds(mut self, bounds: Vec<(f64, f64)>) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// Set the Bayesian optimizer's direction.
    #[must_use]
    pub const fn direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    /// Set kernel hyperparameters for both the standalone GP and the optimizer's surrogate.
    #[must_use]
    pub const fn gaussian_process(mut self, gp: GpConfig) -> Self {
        self.gaussian_process = Some(gp);
        self
    }

    /// Set differential evolution settings.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn differential_evolution(mut self, config: EvolutionConfig) -> Self {
        self.differential_evolution = Some(config);
        self
    }

    /// Set particle swarm settings.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn swarm(mut self, config: SwarmConfig) -> Self {
        self.swarm = Some(config);
        self
    }

    /// Set drift tracker settings.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn kalman(mut self, config: KalmanConfig) -> Self {
        self.kalman = Some(config);
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> TuneConfig {
        let mut config = TuneConfig::default();

        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(bounds) = self.bounds {
            config.bayesian.bounds = bounds;
        }
        if let Some(direction) = self.direction {
            config.bayesian.direction = direction;
        }
        if let Some(gp) = self.gaussian_process {
            config.gaussian_process = gp;
            config.bayesian.gp = gp;
        }
        if let Some(de) = self.differential_evolution {
            config.differential_evolution = de;
        }
        if let Some(swarm) = self.swarm {
            config.swarm = swarm;
        }
        if let Some(kalman) = self.kalman {
            config.kalman = kalman;
        }

        config.propagate_seed();
        config
    }
}
