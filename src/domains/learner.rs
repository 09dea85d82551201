//! Conjugate Gaussian learner for named scalar multipliers.
//!
//! Each parameter carries a Gaussian belief `N(mean, variance)`. A labeled
//! observation `z` with known noise variance `r` updates it in closed form:
//!
//! ```text
//! precision' = 1/variance + 1/r
//! mean'      = (mean/variance + z/r) / precision'
//! variance'  = 1 / precision'
//! ```
//!
//! The set of parameters is fixed at construction and kept in insertion
//! order. Beliefs only change through [`ParameterLearner::observe`] and are
//! restored to their priors by [`ParameterLearner::reinitialize`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::engine::guard::NumericGuard;
use crate::engine::rng::TuneRng;
use crate::error::{TuneError, TuneResult};

/// Gaussian belief over one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Belief {
    /// Posterior mean.
    pub mean: f64,
    /// Posterior variance (always positive).
    pub variance: f64,
    /// Observations absorbed since the prior.
    pub observations: u64,
}

impl Belief {
    /// Posterior standard deviation.
    #[must_use]
    pub fn std_dev(&self) -> f64 {
        self.variance.sqrt()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    prior: Belief,
    posterior: Belief,
}

/// Named Gaussian beliefs with conjugate updates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterLearner {
    entries: IndexMap<String, Entry>,
}

impl ParameterLearner {
    /// Create an empty learner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parameter with its prior.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a non-positive or non-finite
    /// variance, a non-finite mean, or a duplicate name.
    pub fn with_prior(mut self, name: impl Into<String>, mean: f64, variance: f64) -> TuneResult<Self> {
        let name = name.into();
        if !mean.is_finite() || !variance.is_finite() || variance <= 0.0 {
            return Err(TuneError::config(format!(
                "prior for '{name}' needs finite mean and positive variance"
            )));
        }
        if self.entries.contains_key(&name) {
            return Err(TuneError::config(format!("parameter '{name}' registered twice")));
        }
        let prior = Belief {
            mean,
            variance,
            observations: 0,
        };
        self.entries.insert(
            name,
            Entry {
                prior,
                posterior: prior,
            },
        );
        Ok(self)
    }

    /// Absorb one observation of a parameter.
    ///
    /// # Errors
    ///
    /// Returns `UnknownParameter` for an unregistered name, `NonFiniteValue`
    /// for a non-finite observation, and a configuration error for a
    /// non-positive noise variance.
    pub fn observe(&mut self, name: &str, value: f64, noise_variance: f64) -> TuneResult<Belief> {
        NumericGuard::new().check_value(value, name)?;
        if !(noise_variance > 0.0 && noise_variance.is_finite()) {
            return Err(TuneError::config(format!(
                "noise variance for '{name}' must be positive, got {noise_variance}"
            )));
        }
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| TuneError::UnknownParameter(name.to_string()))?;

        let b = &mut entry.posterior;
        let precision = 1.0 / b.variance + 1.0 / noise_variance;
        b.mean = (b.mean / b.variance + value / noise_variance) / precision;
        b.variance = 1.0 / precision;
        b.observations += 1;
        Ok(*b)
    }

    /// Current belief for a parameter.
    #[must_use]
    pub fn belief(&self, name: &str) -> Option<Belief> {
        self.entries.get(name).map(|e| e.posterior)
    }

    /// Posterior mean for a parameter.
    #[must_use]
    pub fn mean(&self, name: &str) -> Option<f64> {
        self.belief(name).map(|b| b.mean)
    }

    /// Draw a plausible value from the posterior.
    ///
    /// # Errors
    ///
    /// Returns `UnknownParameter` for an unregistered name.
    pub fn sample(&self, name: &str, rng: &mut TuneRng) -> TuneResult<f64> {
        let b = self
            .belief(name)
            .ok_or_else(|| TuneError::UnknownParameter(name.to_string()))?;
        Ok(rng.gen_normal(b.mean, b.std_dev()))
    }

    /// All beliefs in registration order.
    pub fn beliefs(&self) -> impl Iterator<Item = (&str, Belief)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), e.posterior))
    }

    /// Number of registered parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no parameters are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Restore every belief to its prior.
    pub fn reinitialize(&mut self) {
        for entry in self.entries.values_mut() {
            entry.posterior = entry.prior;
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Variance never increases and stays positive.
        #[test]
        fn prop_variance_shrinks(
            values in prop::collection::vec((-10.0f64..10.0, 1e-3f64..10.0), 1..50),
        ) {
            let mut l = ParameterLearner::new().with_prior("k", 0.0, 4.0).expect("prior");
            let mut last = 4.0;
            for (z, r) in values {
                let b = l.observe("k", z, r).expect("observe");
                prop_assert!(b.variance > 0.0);
                prop_assert!(b.variance <= last);
                last = b.variance;
            }
        }
    }
}
