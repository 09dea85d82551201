//! Gaussian Process regression with a squared-exponential kernel.
//!
//! # Model
//!
//! ```text
//! k(x1, x2) = s² · exp(−‖x1 − x2‖² / (2ℓ²))
//! K         = [k(xi, xj)] + σn² I
//! μ(x*)     = k*ᵀ K⁻¹ y
//! σ²(x*)    = k(x*, x*) − k*ᵀ K⁻¹ k*        (clamped at 0)
//! ```
//!
//! `K⁻¹` is computed by Gauss-Jordan elimination (see [`crate::linalg`]) and
//! cached. Adding an observation invalidates the cache; the next prediction
//! rebuilds it from the full observation set. Each rebuild is O(n³) and the
//! observation set is never windowed, so this model is meant for the small
//! sample counts of expensive physical experiments.
//!
//! # Example
//!
//! ```rust
//! use paramtune::domains::gaussian_process::{GaussianProcess, GpConfig};
//!
//! let mut gp = GaussianProcess::new(GpConfig::default());
//! gp.fit(&[vec![0.0], vec![1.0], vec![2.0]], &[0.0, 1.0, 4.0]).unwrap();
//!
//! let p = gp.predict_point(&[1.5]);
//! assert!(p.mean > 1.0 && p.mean < 4.0);
//! assert!(p.variance >= 0.0);
//! ```

use std::cell::OnceCell;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::engine::guard::NumericGuard;
use crate::error::{TuneError, TuneResult};
use crate::linalg::{self, Matrix};

/// z-score of a two-sided 95% interval.
const Z_95: f64 = 1.96;

/// Kernel hyperparameters. Fixed for the lifetime of a GP instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct GpConfig {
    /// RBF length scale ℓ.
    #[validate(range(exclusive_min = 0.0))]
    #[serde(default = "default_length_scale")]
    pub length_scale: f64,
    /// Signal variance s² (prior variance of the latent function).
    #[validate(range(exclusive_min = 0.0))]
    #[serde(default = "default_signal_variance")]
    pub signal_variance: f64,
    /// Observation noise variance σn², added to the covariance diagonal.
    #[validate(range(exclusive_min = 0.0))]
    #[serde(default = "default_noise_variance")]
    pub noise_variance: f64,
}

const fn default_length_scale() -> f64 {
    1.0
}

const fn default_signal_variance() -> f64 {
    1.0
}

const fn default_noise_variance() -> f64 {
    1e-4
}

impl Default for GpConfig {
    fn default() -> Self {
        Self {
            length_scale: default_length_scale(),
            signal_variance: default_signal_variance(),
            noise_variance: default_noise_variance(),
        }
    }
}

/// Posterior prediction at one query point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Posterior mean.
    pub mean: f64,
    /// Posterior variance (never negative).
    pub variance: f64,
    /// Posterior standard deviation.
    pub std_dev: f64,
    /// Lower end of the 95% interval.
    pub lower: f64,
    /// Upper end of the 95% interval.
    pub upper: f64,
}

impl Prediction {
    /// Build a prediction, clamping the variance at zero.
    #[must_use]
    pub fn new(mean: f64, variance: f64) -> Self {
        let variance = variance.max(0.0);
        let std_dev = variance.sqrt();
        Self {
            mean,
            variance,
            std_dev,
            lower: mean - Z_95 * std_dev,
            upper: mean + Z_95 * std_dev,
        }
    }
}

/// Cached solve of the covariance system.
#[derive(Debug, Clone)]
struct Posterior {
    k_inv: Matrix,
    k_inv_y: Vec<f64>,
    log_abs_det: f64,
}

/// Gaussian Process surrogate model.
#[derive(Debug, Clone)]
pub struct GaussianProcess {
    config: GpConfig,
    /// Training inputs, in arrival order.
    x_train: Vec<Vec<f64>>,
    /// Training outputs.
    y_train: Vec<f64>,
    /// Lazily rebuilt after every change to the training set.
    posterior: OnceCell<Posterior>,
}

impl GaussianProcess {
    /// Create an empty Gaussian Process.
    #[must_use]
    pub fn new(config: GpConfig) -> Self {
        Self {
            config,
            x_train: Vec::new(),
            y_train: Vec::new(),
            posterior: OnceCell::new(),
        }
    }

    /// Create from raw hyperparameters.
    #[must_use]
    pub fn with_params(length_scale: f64, signal_variance: f64, noise_variance: f64) -> Self {
        Self::new(GpConfig {
            length_scale,
            signal_variance,
            noise_variance,
        })
    }

    /// Replace the training set and solve the covariance system.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if `x` and `y` differ in length or the
    /// rows of `x` differ in dimension, and `NonFiniteValue` if any input
    /// or target is NaN or infinite. The model is left unchanged on error.
    pub fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> TuneResult<()> {
        if x.len() != y.len() {
            return Err(TuneError::dimension_mismatch("gp.fit targets", x.len(), y.len()));
        }
        if let Some(first) = x.first() {
            let d = first.len();
            if let Some(bad) = x.iter().find(|row| row.len() != d) {
                return Err(TuneError::dimension_mismatch("gp.fit inputs", d, bad.len()));
            }
        }
        let mut guard = NumericGuard::new();
        for row in x {
            guard.check_values(row, "gp.fit inputs")?;
        }
        guard.check_values(y, "gp.fit targets")?;

        self.x_train = x.to_vec();
        self.y_train = y.to_vec();
        self.posterior = OnceCell::new();
        if !self.x_train.is_empty() {
            // Solve eagerly so fit() carries the O(n³) cost, not the first predict.
            let _ = self.posterior();
        }
        Ok(())
    }

    /// Append one observation. The covariance inverse is rebuilt from the
    /// full training set on the next prediction.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if `x` differs in dimension from earlier
    /// observations, and `NonFiniteValue` for a NaN or infinite `x` or `y`.
    pub fn update(&mut self, x: Vec<f64>, y: f64) -> TuneResult<()> {
        if let Some(d) = self.dimension() {
            if x.len() != d {
                return Err(TuneError::dimension_mismatch("gp.update", d, x.len()));
            }
        }
        let mut guard = NumericGuard::new();
        guard.check_values(&x, "gp.update input")?;
        guard.check_value(y, "gp.update target")?;
        self.x_train.push(x);
        self.y_train.push(y);
        self.posterior = OnceCell::new();
        Ok(())
    }

    /// Predict at each query point.
    #[must_use]
    pub fn predict(&self, queries: &[Vec<f64>]) -> Vec<Prediction> {
        queries.iter().map(|q| self.predict_point(q)).collect()
    }

    /// Predict at a single point.
    ///
    /// With no observations this is the prior: mean 0, variance `s²`.
    #[must_use]
    pub fn predict_point(&self, x: &[f64]) -> Prediction {
        if self.x_train.is_empty() {
            return Prediction::new(0.0, self.config.signal_variance);
        }
        let posterior = self.posterior();

        let k_star: Vec<f64> = self.x_train.iter().map(|xi| self.kernel(xi, x)).collect();
        let mean = linalg::dot(&k_star, &posterior.k_inv_y);

        let v = linalg::mat_vec(&posterior.k_inv, &k_star);
        let variance = self.kernel(x, x) - linalg::dot(&k_star, &v);

        Prediction::new(mean, variance)
    }

    /// Log marginal likelihood `log p(y | X)` of the training data.
    ///
    /// Uses the log-determinant from the elimination pivots; only meaningful
    /// when the covariance is well conditioned. `None` with no observations.
    #[must_use]
    pub fn log_marginal_likelihood(&self) -> Option<f64> {
        if self.x_train.is_empty() {
            return None;
        }
        let posterior = self.posterior();
        let n = self.y_train.len() as f64;
        let data_fit = linalg::dot(&self.y_train, &posterior.k_inv_y);
        Some(
            -0.5 * data_fit
                - 0.5 * posterior.log_abs_det
                - 0.5 * n * (2.0 * std::f64::consts::PI).ln(),
        )
    }

    /// Covariance matrix `K + σn² I` of the current training set.
    #[must_use]
    pub fn covariance_matrix(&self) -> Matrix {
        let n = self.x_train.len();
        let mut k = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in 0..=i {
                let v = self.kernel(&self.x_train[i], &self.x_train[j]);
                k[i][j] = v;
                k[j][i] = v;
            }
            k[i][i] += self.config.noise_variance;
        }
        k
    }

    /// RBF (squared exponential) kernel.
    #[must_use]
    pub fn kernel(&self, x1: &[f64], x2: &[f64]) -> f64 {
        let sq_dist: f64 = x1.iter().zip(x2).map(|(a, b)| (a - b).powi(2)).sum();
        self.config.signal_variance
            * (-sq_dist / (2.0 * self.config.length_scale.powi(2))).exp()
    }

    fn posterior(&self) -> &Posterior {
        self.posterior.get_or_init(|| {
            let inversion = linalg::gauss_jordan(&self.covariance_matrix());
            if !inversion.is_full_rank() {
                tracing::debug!(
                    n = self.x_train.len(),
                    skipped = inversion.skipped_pivots,
                    "covariance matrix is ill-conditioned; using best-effort inverse"
                );
            }
            let k_inv_y = linalg::mat_vec(&inversion.inverse, &self.y_train);
            Posterior {
                k_inv: inversion.inverse,
                k_inv_y,
                log_abs_det: inversion.log_abs_det,
            }
        })
    }

    /// Input dimension, once any observation exists.
    #[must_use]
    pub fn dimension(&self) -> Option<usize> {
        self.x_train.first().map(Vec::len)
    }

    /// Get number of training points.
    #[must_use]
    pub fn n_observations(&self) -> usize {
        self.x_train.len()
    }

    /// Training observations in arrival order.
    pub fn observations(&self) -> impl Iterator<Item = (&[f64], f64)> {
        self.x_train
            .iter()
            .map(Vec::as_slice)
            .zip(self.y_train.iter().copied())
    }

    /// Kernel hyperparameters.
    #[must_use]
    pub const fn config(&self) -> &GpConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quadratic_gp() -> GaussianProcess {
        let mut gp = GaussianProcess::with_params(1.0, 1.0, 1e-6);
        gp.fit(
            &[vec![0.0], vec![1.0], vec![2.0], vec![3.0]],
            &[0.0, 1.0, 4.0, 9.0],
        )
        .expect("fit");
        gp
    }

    #[test]
    fn test_gp_create() {
        let gp = GaussianProcess::new(GpConfig::default());
        assert_eq!(gp.n_observations(), 0);
        assert_eq!(gp.dimension(), None);
        assert!(gp.log_marginal_likelihood().is_none());
    }

    #[test]
    fn test_gp_predict_empty_is_prior() {
        let gp = GaussianProcess::with_params(1.0, 2.5, 1e-6);
        let p = gp.predict_point(&[0.5]);

        assert!(p.mean.abs() < f64::EPSILON);
        assert!((p.variance - 2.5).abs() < f64::EPSILON);
        assert!((p.upper - (1.96 * 2.5_f64.sqrt())).abs() < 1e-12);
    }

    #[test]
    fn test_gp_interpolates_training_points() {
        let gp = quadratic_gp();
        for (x, y) in [(0.0, 0.0), (1.0, 1.0), (2.0, 4.0), (3.0, 9.0)] {
            let p = gp.predict_point(&[x]);
            assert!((p.mean - y).abs() < 1e-3, "mean at {x}: {}", p.mean);
            assert!(p.variance < 1e-4, "variance at {x}: {}", p.variance);
        }
    }

    #[test]
    fn test_gp_between_points() {
        let gp = quadratic_gp();
        let preds = gp.predict(&[vec![1.5]]);
        assert_eq!(preds.len(), 1);
        let p = preds[0];
        assert!(p.mean > 1.0 && p.mean < 4.0, "mean {}", p.mean);
        assert!(p.variance > 0.0 && p.variance.is_finite());
        assert!(p.lower < p.mean && p.mean < p.upper);
    }

    #[test]
    fn test_gp_variance_decreases_near_data() {
        let mut gp = GaussianProcess::with_params(1.0, 1.0, 1e-6);
        gp.fit(&[vec![0.0]], &[0.0]).expect("fit");

        let near = gp.predict_point(&[0.0]);
        let far = gp.predict_point(&[5.0]);
        assert!(near.variance < far.variance);
    }

    #[test]
    fn test_gp_variance_shrinks_with_data() {
        let mut gp = GaussianProcess::new(GpConfig::default());
        let prior = gp.predict_point(&[1.0]).variance;

        gp.update(vec![0.5], 0.25).expect("update");
        let after_one = gp.predict_point(&[1.0]).variance;
        gp.update(vec![1.2], 1.44).expect("update");
        let after_two = gp.predict_point(&[1.0]).variance;

        assert!(prior >= after_one);
        assert!(after_one >= after_two);
    }

    #[test]
    fn test_gp_update_matches_fit() {
        let mut incremental = GaussianProcess::with_params(0.8, 1.0, 1e-4);
        for (x, y) in [(0.0, 1.0), (0.7, 0.2), (1.9, -0.4)] {
            incremental.update(vec![x], y).expect("update");
        }
        let mut batch = GaussianProcess::with_params(0.8, 1.0, 1e-4);
        batch
            .fit(&[vec![0.0], vec![0.7], vec![1.9]], &[1.0, 0.2, -0.4])
            .expect("fit");

        let a = incremental.predict_point(&[1.1]);
        let b = batch.predict_point(&[1.1]);
        assert!((a.mean - b.mean).abs() < 1e-12);
        assert!((a.variance - b.variance).abs() < 1e-12);
    }

    #[test]
    fn test_gp_dimension_mismatch() {
        let mut gp = GaussianProcess::new(GpConfig::default());
        assert!(gp.fit(&[vec![0.0]], &[1.0, 2.0]).is_err());
        assert!(gp.fit(&[vec![0.0], vec![0.0, 1.0]], &[1.0, 2.0]).is_err());

        gp.update(vec![0.0, 0.0], 1.0).expect("first update");
        assert!(gp.update(vec![1.0], 1.0).is_err());
        assert_eq!(gp.n_observations(), 1);
    }

    #[test]
    fn test_gp_rejects_non_finite_data() {
        let mut gp = GaussianProcess::new(GpConfig::default());
        gp.fit(&[vec![0.0], vec![1.0]], &[0.5, 1.5]).expect("fit");

        assert!(matches!(
            gp.fit(&[vec![0.0], vec![1.0]], &[0.5, f64::NAN]),
            Err(TuneError::NonFiniteValue { .. })
        ));
        assert!(gp.fit(&[vec![f64::INFINITY], vec![1.0]], &[0.5, 1.5]).is_err());
        assert!(gp.update(vec![2.0], f64::NAN).is_err());
        assert!(gp.update(vec![f64::NAN], 1.0).is_err());

        assert_eq!(gp.n_observations(), 2);
        assert!(gp.predict_point(&[0.5]).mean.is_finite());
    }

    #[test]
    fn test_covariance_symmetric_with_noise_diagonal() {
        let gp = quadratic_gp();
        let k = gp.covariance_matrix();
        assert!(linalg::is_symmetric(&k, 0.0));
        for row in k.iter().enumerate() {
            let (i, r) = row;
            assert!((r[i] - (1.0 + 1e-6)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_duplicate_points_do_not_break_prediction() {
        let mut gp = GaussianProcess::with_params(1.0, 1.0, 1e-12);
        gp.fit(&[vec![1.0], vec![1.0], vec![1.0]], &[2.0, 2.0, 2.0])
            .expect("fit");
        let p = gp.predict_point(&[1.0]);
        assert!(p.mean.is_finite());
        assert!(p.variance >= 0.0);
    }

    #[test]
    fn test_log_marginal_likelihood_prefers_smooth_fit() {
        let x: Vec<Vec<f64>> = (0..8).map(|i| vec![f64::from(i) * 0.5]).collect();
        let y: Vec<f64> = x.iter().map(|v| v[0].sin()).collect();

        let mut smooth = GaussianProcess::with_params(1.0, 1.0, 1e-3);
        smooth.fit(&x, &y).expect("fit");
        let mut rough = GaussianProcess::with_params(0.01, 1.0, 1e-3);
        rough.fit(&x, &y).expect("fit");

        let (a, b) = (
            smooth.log_marginal_likelihood().expect("lml"),
            rough.log_marginal_likelihood().expect("lml"),
        );
        assert!(a > b, "smooth {a} should beat rough {b}");
    }

    #[test]
    fn test_observations_iterator() {
        let gp = quadratic_gp();
        let obs: Vec<(Vec<f64>, f64)> = gp.observations().map(|(x, y)| (x.to_vec(), y)).collect();
        assert_eq!(obs.len(), 4);
        assert_eq!(obs[2], (vec![2.0], 4.0));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// GP variance is always non-negative and never exceeds the prior.
        #[test]
        fn prop_gp_variance_bounded(
            x in -10.0f64..10.0,
            obs in prop::collection::vec((-10.0f64..10.0, -10.0f64..10.0), 1..8),
        ) {
            let mut gp = GaussianProcess::with_params(1.0, 1.0, 1e-4);
            for (xi, yi) in &obs {
                gp.update(vec![*xi], *yi).expect("update");
            }

            let p = gp.predict_point(&[x]);
            prop_assert!(p.variance >= 0.0, "Variance must be non-negative");
            prop_assert!(p.variance <= 1.0 + 1e-6, "Variance must not exceed the prior");
            prop_assert!(p.mean.is_finite());
        }
    }
}
