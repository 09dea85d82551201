//! Thompson sampling over Bernoulli-reward arms.
//!
//! Each arm keeps a `Beta(alpha, beta)` posterior over its success rate,
//! starting from the uniform prior `(1, 1)`. Selection draws one sample per
//! arm and plays the largest; rewards above 0.5 count as successes.
//!
//! Selection is stochastic by nature. Tests assert on long-run behavior
//! with statistical tolerances, never on a single draw.

use serde::{Deserialize, Serialize};

use crate::engine::rng::TuneRng;
use crate::error::{TuneError, TuneResult};

/// Rewards strictly above this threshold count as a success.
pub const SUCCESS_THRESHOLD: f64 = 0.5;

/// Posterior pseudo-counts of one arm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct Arm {
    alpha: f64,
    beta: f64,
    pulls: u64,
}

impl Arm {
    const PRIOR: Self = Self {
        alpha: 1.0,
        beta: 1.0,
        pulls: 0,
    };

    fn expected(&self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }
}

/// Per-arm introspection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArmStatistics {
    /// Successes plus prior.
    pub alpha: f64,
    /// Failures plus prior.
    pub beta: f64,
    /// Posterior mean `alpha / (alpha + beta)`.
    pub expected: f64,
    /// Number of rewards recorded.
    pub pulls: u64,
}

/// Beta-Bernoulli Thompson sampler.
#[derive(Debug, Clone)]
pub struct ThompsonSampler {
    arms: Vec<Arm>,
    rng: TuneRng,
}

impl ThompsonSampler {
    /// Create a sampler with `n_arms` uniform priors.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `n_arms == 0`.
    pub fn new(n_arms: usize, seed: u64) -> TuneResult<Self> {
        Self::with_rng(n_arms, TuneRng::new(seed))
    }

    /// Create a sampler drawing from an existing generator.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `n_arms == 0`.
    pub fn with_rng(n_arms: usize, rng: TuneRng) -> TuneResult<Self> {
        if n_arms == 0 {
            return Err(TuneError::config("Thompson sampler needs at least one arm"));
        }
        Ok(Self {
            arms: vec![Arm::PRIOR; n_arms],
            rng,
        })
    }

    /// Draw from every arm's posterior and return the arm with the largest sample.
    pub fn select(&mut self) -> usize {
        let mut best_arm = 0;
        let mut best_sample = f64::NEG_INFINITY;
        for (i, arm) in self.arms.iter().enumerate() {
            let sample = self.rng.gen_beta(arm.alpha, arm.beta);
            if sample > best_sample {
                best_sample = sample;
                best_arm = i;
            }
        }
        best_arm
    }

    /// Record a reward in `[0, 1]` for an arm.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArm` if `arm` is out of range.
    pub fn update(&mut self, arm: usize, reward: f64) -> TuneResult<()> {
        let n_arms = self.arms.len();
        let state = self
            .arms
            .get_mut(arm)
            .ok_or(TuneError::InvalidArm { arm, n_arms })?;

        if reward > SUCCESS_THRESHOLD {
            state.alpha += 1.0;
        } else {
            state.beta += 1.0;
        }
        state.pulls += 1;
        Ok(())
    }

    /// Posterior mean `alpha / (alpha + beta)` for every arm.
    #[must_use]
    pub fn expected(&self) -> Vec<f64> {
        self.arms.iter().map(Arm::expected).collect()
    }

    /// Arm with the highest posterior mean (first on ties).
    #[must_use]
    pub fn best_arm(&self) -> usize {
        let mut best = 0;
        for (i, arm) in self.arms.iter().enumerate() {
            if arm.expected() > self.arms[best].expected() {
                best = i;
            }
        }
        best
    }

    /// Full per-arm statistics.
    #[must_use]
    pub fn statistics(&self) -> Vec<ArmStatistics> {
        self.arms
            .iter()
            .map(|a| ArmStatistics {
                alpha: a.alpha,
                beta: a.beta,
                expected: a.expected(),
                pulls: a.pulls,
            })
            .collect()
    }

    /// Number of arms.
    #[must_use]
    pub fn n_arms(&self) -> usize {
        self.arms.len()
    }

    /// Restore every arm to the uniform prior.
    pub fn reset(&mut self) {
        self.arms.fill(Arm::PRIOR);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_requires_arms() {
        assert!(ThompsonSampler::new(0, 1).is_err());
        let sampler = ThompsonSampler::new(3, 1).expect("new");
        assert_eq!(sampler.n_arms(), 3);
        assert_eq!(sampler.expected(), vec![0.5; 3]);
    }

    #[test]
    fn test_update_threshold() {
        let mut sampler = ThompsonSampler::new(2, 1).expect("new");
        sampler.update(0, 1.0).expect("update");
        sampler.update(0, 0.5).expect("update"); // not a success
        sampler.update(1, 0.51).expect("update");

        let stats = sampler.statistics();
        assert!((stats[0].alpha - 2.0).abs() < f64::EPSILON);
        assert!((stats[0].beta - 2.0).abs() < f64::EPSILON);
        assert_eq!(stats[0].pulls, 2);
        assert!((stats[1].alpha - 2.0).abs() < f64::EPSILON);
        assert!((stats[1].beta - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_update_invalid_arm() {
        let mut sampler = ThompsonSampler::new(2, 1).expect("new");
        let err = sampler.update(2, 1.0).err();
        assert!(matches!(err, Some(TuneError::InvalidArm { arm: 2, n_arms: 2 })));
    }

    #[test]
    fn test_expected_converges() {
        let mut sampler = ThompsonSampler::new(2, 7).expect("new");
        for _ in 0..200 {
            sampler.update(0, 1.0).expect("update");
            sampler.update(1, 0.0).expect("update");
        }
        let expected = sampler.expected();
        assert!(expected[0] > 0.98, "always-rewarded arm: {}", expected[0]);
        assert!(expected[1] < 0.02, "never-rewarded arm: {}", expected[1]);
        assert_eq!(sampler.best_arm(), 0);
    }

    #[test]
    fn test_select_concentrates_on_best_arm() {
        let mut sampler = ThompsonSampler::new(3, 42).expect("new");
        let success_rates = [0.2, 0.8, 0.4];
        let mut env = TuneRng::new(99);
        let mut pulls = [0usize; 3];

        for _ in 0..2000 {
            let arm = sampler.select();
            pulls[arm] += 1;
            let reward = if env.gen_f64() < success_rates[arm] { 1.0 } else { 0.0 };
            sampler.update(arm, reward).expect("update");
        }

        assert!(pulls[1] > 1400, "best arm pulled {} times", pulls[1]);
        let stats = sampler.statistics();
        assert!((stats[1].expected - 0.8).abs() < 0.05);
    }

    #[test]
    fn test_select_reproducible() {
        let run = || {
            let mut sampler = ThompsonSampler::new(4, 5).expect("new");
            (0..50).map(|_| sampler.select()).collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_reset() {
        let mut sampler = ThompsonSampler::new(2, 1).expect("new");
        sampler.update(1, 1.0).expect("update");
        sampler.reset();
        assert_eq!(sampler.expected(), vec![0.5, 0.5]);
        assert_eq!(sampler.statistics()[1].pulls, 0);
    }
}
