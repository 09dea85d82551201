//! Kalman filtering for slowly drifting process state.
//!
//! Three flavors share one predict/update contract:
//!
//! - [`KalmanFilter`]: linear, matrix form. [`KalmanFilter::drift_tracker`]
//!   builds the 2-state (value, rate) constant-velocity model used for
//!   tool wear.
//! - [`ScalarKalmanFilter`]: 1-state random walk, i.e. exponential smoothing
//!   whose gain adapts to the noise ratio.
//! - [`ExtendedKalmanFilter`]: nonlinear transition and measurement through
//!   a [`StateModel`] with caller-supplied Jacobians.
//!
//! # Equations
//!
//! ```text
//! predict:  x ← F x              P ← F P Fᵀ + Q
//! update:   y = z − H x          S = H P Hᵀ + R
//!           K = P Hᵀ S⁻¹         x ← x + K y        P ← (I − K H) P
//! ```
//!
//! `S⁻¹` uses [`crate::linalg::invert`], so a degenerate innovation
//! covariance degrades the gain instead of failing.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::engine::guard::NumericGuard;
use crate::error::{TuneError, TuneResult};
use crate::linalg::{
    diagonal, identity, invert, mat_add, mat_mul, mat_sub, mat_vec, shape, transpose, Matrix,
};

/// Settings for the 2-state drift tracker.
///
/// Defaults start from state `[0, 0]` with covariance `diag(1, 1)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct KalmanConfig {
    /// Time between measurements.
    #[validate(range(exclusive_min = 0.0))]
    #[serde(default = "default_dt")]
    pub dt: f64,
    /// Process noise on the value.
    #[validate(range(min = 0.0))]
    #[serde(default = "default_value_noise")]
    pub value_noise: f64,
    /// Process noise on the rate.
    #[validate(range(min = 0.0))]
    #[serde(default = "default_rate_noise")]
    pub rate_noise: f64,
    /// Measurement noise variance R.
    #[validate(range(exclusive_min = 0.0))]
    #[serde(default = "default_measurement_noise")]
    pub measurement_noise: f64,
    /// Initial value estimate.
    #[serde(default)]
    pub initial_value: f64,
    /// Initial rate estimate.
    #[serde(default)]
    pub initial_rate: f64,
    /// Initial variance on the value.
    #[validate(range(exclusive_min = 0.0))]
    #[serde(default = "default_initial_variance")]
    pub initial_value_variance: f64,
    /// Initial variance on the rate.
    #[validate(range(exclusive_min = 0.0))]
    #[serde(default = "default_initial_variance")]
    pub initial_rate_variance: f64,
}

const fn default_dt() -> f64 {
    1.0
}

const fn default_value_noise() -> f64 {
    1e-4
}

const fn default_rate_noise() -> f64 {
    1e-6
}

const fn default_measurement_noise() -> f64 {
    1e-2
}

const fn default_initial_variance() -> f64 {
    1.0
}

impl Default for KalmanConfig {
    fn default() -> Self {
        Self {
            dt: default_dt(),
            value_noise: default_value_noise(),
            rate_noise: default_rate_noise(),
            measurement_noise: default_measurement_noise(),
            initial_value: 0.0,
            initial_rate: 0.0,
            initial_value_variance: default_initial_variance(),
            initial_rate_variance: default_initial_variance(),
        }
    }
}

/// Linear Kalman filter.
#[derive(Debug, Clone, Serialize)]
pub struct KalmanFilter {
    f: Matrix,
    h: Matrix,
    q: Matrix,
    r: Matrix,
    x: Vec<f64>,
    p: Matrix,
    x0: Vec<f64>,
    p0: Matrix,
}

impl KalmanFilter {
    /// Build a filter from its model matrices and initial state.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if any matrix disagrees with the state
    /// dimension `x0.len()` or the measurement dimension `h.len()`.
    pub fn new(
        f: Matrix,
        h: Matrix,
        q: Matrix,
        r: Matrix,
        x0: Vec<f64>,
        p0: Matrix,
    ) -> TuneResult<Self> {
        let n = x0.len();
        let m = h.len();
        if n == 0 || m == 0 {
            return Err(TuneError::filter("state and measurement must be non-empty"));
        }
        check_shape("F", &f, n, n)?;
        check_shape("H", &h, m, n)?;
        check_shape("Q", &q, n, n)?;
        check_shape("R", &r, m, m)?;
        check_shape("P0", &p0, n, n)?;

        Ok(Self {
            f,
            h,
            q,
            r,
            x: x0.clone(),
            p: p0.clone(),
            x0,
            p0,
        })
    }

    /// Constant-velocity tracker over `[value, rate]` observing the value.
    ///
    /// # Errors
    ///
    /// Returns a validation error for non-positive noise or `dt`.
    pub fn drift_tracker(config: &KalmanConfig) -> TuneResult<Self> {
        config.validate()?;
        Self::new(
            vec![vec![1.0, config.dt], vec![0.0, 1.0]],
            vec![vec![1.0, 0.0]],
            diagonal(&[config.value_noise, config.rate_noise]),
            vec![vec![config.measurement_noise]],
            vec![config.initial_value, config.initial_rate],
            diagonal(&[config.initial_value_variance, config.initial_rate_variance]),
        )
    }

    /// Propagate state and covariance one step.
    pub fn predict(&mut self) {
        self.x = mat_vec(&self.f, &self.x);
        self.p = propagate(&self.f, &self.p, &self.q);
    }

    /// Correct the state with a measurement.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` for a wrongly sized measurement and
    /// `NonFiniteValue` for NaN or infinite entries; the state is unchanged.
    pub fn update(&mut self, z: &[f64]) -> TuneResult<()> {
        check_measurement(z, self.h.len())?;
        let predicted = mat_vec(&self.h, &self.x);
        correct(&mut self.x, &mut self.p, &self.h, &self.r, z, &predicted);
        Ok(())
    }

    /// Predict then update; returns the new state estimate.
    ///
    /// # Errors
    ///
    /// See [`KalmanFilter::update`].
    pub fn step(&mut self, z: &[f64]) -> TuneResult<&[f64]> {
        check_measurement(z, self.h.len())?;
        self.predict();
        self.update(z)?;
        Ok(self.x.as_slice())
    }

    /// Restore the initial state and covariance.
    pub fn reset(&mut self) {
        self.x.clone_from(&self.x0);
        self.p.clone_from(&self.p0);
    }

    /// Current state estimate.
    #[must_use]
    pub fn state(&self) -> &[f64] {
        &self.x
    }

    /// Current state covariance.
    #[must_use]
    pub fn covariance(&self) -> &Matrix {
        &self.p
    }

    /// First state component (the tracked value for a drift tracker).
    #[must_use]
    pub fn value(&self) -> f64 {
        self.x[0]
    }
}

/// One-state random-walk filter (adaptive exponential smoothing).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarKalmanFilter {
    estimate: f64,
    variance: f64,
    process_noise: f64,
    measurement_noise: f64,
    gain: f64,
    initial_estimate: f64,
    initial_variance: f64,
}

impl ScalarKalmanFilter {
    /// Create a filter.
    ///
    /// # Errors
    ///
    /// Returns a filter error for a non-finite estimate, negative process
    /// noise, or non-positive variance or measurement noise.
    pub fn new(
        initial_estimate: f64,
        initial_variance: f64,
        process_noise: f64,
        measurement_noise: f64,
    ) -> TuneResult<Self> {
        let valid = initial_estimate.is_finite()
            && initial_variance.is_finite()
            && initial_variance > 0.0
            && process_noise.is_finite()
            && process_noise >= 0.0
            && measurement_noise.is_finite()
            && measurement_noise > 0.0;
        if !valid {
            return Err(TuneError::filter(
                "scalar filter needs a finite estimate and positive variances",
            ));
        }
        Ok(Self {
            estimate: initial_estimate,
            variance: initial_variance,
            process_noise,
            measurement_noise,
            gain: 0.0,
            initial_estimate,
            initial_variance,
        })
    }

    /// Absorb a measurement; returns the new estimate.
    ///
    /// # Errors
    ///
    /// Returns `NonFiniteValue` for NaN or infinite input; the state is unchanged.
    pub fn update(&mut self, z: f64) -> TuneResult<f64> {
        NumericGuard::new().check_value(z, "scalar_kalman.measurement")?;
        self.variance += self.process_noise;
        self.gain = self.variance / (self.variance + self.measurement_noise);
        self.estimate += self.gain * (z - self.estimate);
        self.variance *= 1.0 - self.gain;
        Ok(self.estimate)
    }

    /// Gain used by the last update (0 before the first).
    #[must_use]
    pub const fn gain(&self) -> f64 {
        self.gain
    }

    /// Current estimate.
    #[must_use]
    pub const fn estimate(&self) -> f64 {
        self.estimate
    }

    /// Current variance.
    #[must_use]
    pub const fn variance(&self) -> f64 {
        self.variance
    }

    /// Restore the initial estimate and variance.
    pub fn reset(&mut self) {
        self.estimate = self.initial_estimate;
        self.variance = self.initial_variance;
        self.gain = 0.0;
    }
}

/// Nonlinear process and measurement model for [`ExtendedKalmanFilter`].
pub trait StateModel {
    /// State dimension n.
    fn state_dim(&self) -> usize;
    /// Measurement dimension m.
    fn measurement_dim(&self) -> usize;
    /// Next state `f(x)`.
    fn transition(&self, x: &[f64]) -> Vec<f64>;
    /// `∂f/∂x` at `x` (n×n).
    fn transition_jacobian(&self, x: &[f64]) -> Matrix;
    /// Expected measurement `h(x)`.
    fn measure(&self, x: &[f64]) -> Vec<f64>;
    /// `∂h/∂x` at `x` (m×n).
    fn measurement_jacobian(&self, x: &[f64]) -> Matrix;
}

/// Extended Kalman filter linearizing a [`StateModel`] at the current estimate.
#[derive(Debug, Clone)]
pub struct ExtendedKalmanFilter<M: StateModel> {
    model: M,
    q: Matrix,
    r: Matrix,
    x: Vec<f64>,
    p: Matrix,
    x0: Vec<f64>,
    p0: Matrix,
}

impl<M: StateModel> ExtendedKalmanFilter<M> {
    /// Build a filter around `model`.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if `q`, `r`, `x0` or `p0` disagree with
    /// the model's dimensions.
    pub fn new(model: M, q: Matrix, r: Matrix, x0: Vec<f64>, p0: Matrix) -> TuneResult<Self> {
        let n = model.state_dim();
        let m = model.measurement_dim();
        if n == 0 || m == 0 {
            return Err(TuneError::filter("state and measurement must be non-empty"));
        }
        if x0.len() != n {
            return Err(TuneError::dimension_mismatch("EKF x0", n, x0.len()));
        }
        check_shape("Q", &q, n, n)?;
        check_shape("R", &r, m, m)?;
        check_shape("P0", &p0, n, n)?;

        Ok(Self {
            model,
            q,
            r,
            x: x0.clone(),
            p: p0.clone(),
            x0,
            p0,
        })
    }

    /// Propagate through the nonlinear transition.
    pub fn predict(&mut self) {
        let f = self.model.transition_jacobian(&self.x);
        self.x = self.model.transition(&self.x);
        self.p = propagate(&f, &self.p, &self.q);
    }

    /// Correct with a measurement, linearizing `h` at the current estimate.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` or `NonFiniteValue` for a malformed
    /// measurement; the state is unchanged.
    pub fn update(&mut self, z: &[f64]) -> TuneResult<()> {
        check_measurement(z, self.model.measurement_dim())?;
        let h = self.model.measurement_jacobian(&self.x);
        let predicted = self.model.measure(&self.x);
        correct(&mut self.x, &mut self.p, &h, &self.r, z, &predicted);
        Ok(())
    }

    /// Predict then update; returns the new state estimate.
    ///
    /// # Errors
    ///
    /// See [`ExtendedKalmanFilter::update`].
    pub fn step(&mut self, z: &[f64]) -> TuneResult<&[f64]> {
        check_measurement(z, self.model.measurement_dim())?;
        self.predict();
        self.update(z)?;
        Ok(self.x.as_slice())
    }

    /// Restore the initial state and covariance.
    pub fn reset(&mut self) {
        self.x.clone_from(&self.x0);
        self.p.clone_from(&self.p0);
    }

    /// Current state estimate.
    #[must_use]
    pub fn state(&self) -> &[f64] {
        &self.x
    }

    /// Current state covariance.
    #[must_use]
    pub fn covariance(&self) -> &Matrix {
        &self.p
    }

    /// The process/measurement model.
    #[must_use]
    pub const fn model(&self) -> &M {
        &self.model
    }
}

/// `F P Fᵀ + Q`.
fn propagate(f: &[Vec<f64>], p: &[Vec<f64>], q: &[Vec<f64>]) -> Matrix {
    mat_add(&mat_mul(&mat_mul(f, p), &transpose(f)), q)
}

/// Measurement correction shared by the linear and extended filters.
fn correct(
    x: &mut [f64],
    p: &mut Matrix,
    h: &[Vec<f64>],
    r: &[Vec<f64>],
    z: &[f64],
    predicted: &[f64],
) {
    let innovation: Vec<f64> = z.iter().zip(predicted).map(|(a, b)| a - b).collect();
    let ht = transpose(h);
    let p_ht = mat_mul(&*p, &ht);
    let s = mat_add(&mat_mul(h, &p_ht), r);
    let gain = mat_mul(&p_ht, &invert(&s));

    for (xi, dx) in x.iter_mut().zip(mat_vec(&gain, &innovation)) {
        *xi += dx;
    }
    let kh = mat_mul(&gain, h);
    *p = mat_mul(&mat_sub(&identity(x.len()), &kh), &*p);
    tracing::trace!(innovation = ?innovation, "kalman correction");
}

fn check_shape(name: &str, m: &[Vec<f64>], rows: usize, cols: usize) -> TuneResult<()> {
    let (r, c) = shape(m);
    if r != rows {
        return Err(TuneError::dimension_mismatch(format!("{name} rows"), rows, r));
    }
    if c != cols || m.iter().any(|row| row.len() != cols) {
        return Err(TuneError::dimension_mismatch(format!("{name} columns"), cols, c));
    }
    Ok(())
}

fn check_measurement(z: &[f64], expected: usize) -> TuneResult<()> {
    if z.len() != expected {
        return Err(TuneError::dimension_mismatch("kalman measurement", expected, z.len()));
    }
    NumericGuard::new().check_values(z, "kalman.measurement")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drift_tracker_initial_state() {
        let kf = KalmanFilter::drift_tracker(&KalmanConfig::default()).expect("tracker");
        assert_eq!(kf.state(), &[0.0, 0.0]);
        assert_eq!(kf.covariance(), &vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_measurement_above_estimate_increases_it() {
        let mut kf = KalmanFilter::drift_tracker(&KalmanConfig::default()).expect("tracker");
        let before = kf.value();
        kf.update(&[0.5]).expect("update");
        assert!(kf.value() > before);
        assert!(kf.value() <= 0.5);
    }

    #[test]
    fn test_filter_state_serializes() {
        // Filters are only built through the shape-checked constructors;
        // serialization is one-way for snapshots.
        let mut kf = KalmanFilter::drift_tracker(&KalmanConfig::default()).expect("kf");
        kf.step(&[0.5]).expect("step");
        let json = serde_json::to_value(&kf).expect("serialize");
        assert_eq!(json["x"].as_array().map(Vec::len), Some(2));
        assert!(kf.value().is_finite());
    }

    #[test]
    fn test_reset_restores_exact_initial_state() {
        let config = KalmanConfig {
            initial_value: 0.1,
            initial_rate: 0.01,
            initial_value_variance: 0.5,
            initial_rate_variance: 0.2,
            ..Default::default()
        };
        let mut kf = KalmanFilter::drift_tracker(&config).expect("tracker");
        for z in [0.12, 0.15, 0.2, 0.22] {
            kf.step(&[z]).expect("step");
        }
        assert!(kf.value() > 0.1);

        kf.reset();
        assert_eq!(kf.state(), &[0.1, 0.01]);
        assert_eq!(kf.covariance(), &vec![vec![0.5, 0.0], vec![0.0, 0.2]]);
    }

    #[test]
    fn test_tracks_linear_drift() {
        let mut kf = KalmanFilter::drift_tracker(&KalmanConfig::default()).expect("tracker");
        for k in 1..=100 {
            let z = 0.02 * f64::from(k);
            kf.step(&[z]).expect("step");
        }
        let state = kf.state();
        assert!((state[0] - 2.0).abs() < 0.05, "value {}", state[0]);
        assert!((state[1] - 0.02).abs() < 0.005, "rate {}", state[1]);
    }

    #[test]
    fn test_predict_grows_uncertainty() {
        let mut kf = KalmanFilter::drift_tracker(&KalmanConfig::default()).expect("tracker");
        let before = kf.covariance()[0][0];
        kf.predict();
        assert!(kf.covariance()[0][0] > before);
    }

    #[test]
    fn test_shape_validation() {
        let bad_f = KalmanFilter::new(
            identity(3),
            vec![vec![1.0, 0.0]],
            identity(2),
            vec![vec![1.0]],
            vec![0.0, 0.0],
            identity(2),
        );
        assert!(matches!(bad_f, Err(TuneError::DimensionMismatch { .. })));

        let mut kf = KalmanFilter::drift_tracker(&KalmanConfig::default()).expect("tracker");
        assert!(kf.update(&[1.0, 2.0]).is_err());
        assert!(kf.update(&[f64::NAN]).is_err());
        assert_eq!(kf.state(), &[0.0, 0.0]);
    }

    #[test]
    fn test_invalid_config() {
        let config = KalmanConfig {
            measurement_noise: 0.0,
            ..Default::default()
        };
        assert!(KalmanFilter::drift_tracker(&config).is_err());
    }

    #[test]
    fn test_scalar_smoothing() {
        let mut kf = ScalarKalmanFilter::new(0.0, 1.0, 1e-4, 0.1).expect("new");
        assert!(kf.gain().abs() < f64::EPSILON);

        let first = kf.update(1.0).expect("update");
        assert!(first > 0.0 && first < 1.0);
        let first_gain = kf.gain();

        for _ in 0..200 {
            kf.update(1.0).expect("update");
        }
        assert!((kf.estimate() - 1.0).abs() < 1e-3);
        // Gain settles well below its first value.
        assert!(kf.gain() < first_gain);
        assert!(kf.gain() > 0.0);

        kf.reset();
        assert!(kf.estimate().abs() < f64::EPSILON);
        assert!((kf.variance() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_scalar_rejects_bad_input() {
        assert!(ScalarKalmanFilter::new(0.0, 0.0, 1e-4, 0.1).is_err());
        assert!(ScalarKalmanFilter::new(0.0, 1.0, -1.0, 0.1).is_err());
        let mut kf = ScalarKalmanFilter::new(0.0, 1.0, 1e-4, 0.1).expect("new");
        assert!(kf.update(f64::INFINITY).is_err());
        assert!(kf.estimate().abs() < f64::EPSILON);
    }

    /// Constant scalar state observed through its square.
    struct Squared;

    impl StateModel for Squared {
        fn state_dim(&self) -> usize {
            1
        }
        fn measurement_dim(&self) -> usize {
            1
        }
        fn transition(&self, x: &[f64]) -> Vec<f64> {
            x.to_vec()
        }
        fn transition_jacobian(&self, _x: &[f64]) -> Matrix {
            vec![vec![1.0]]
        }
        fn measure(&self, x: &[f64]) -> Vec<f64> {
            vec![x[0] * x[0]]
        }
        fn measurement_jacobian(&self, x: &[f64]) -> Matrix {
            vec![vec![2.0 * x[0]]]
        }
    }

    /// The drift tracker's model expressed through the trait.
    struct ConstantVelocity;

    impl StateModel for ConstantVelocity {
        fn state_dim(&self) -> usize {
            2
        }
        fn measurement_dim(&self) -> usize {
            1
        }
        fn transition(&self, x: &[f64]) -> Vec<f64> {
            vec![x[0] + x[1], x[1]]
        }
        fn transition_jacobian(&self, _x: &[f64]) -> Matrix {
            vec![vec![1.0, 1.0], vec![0.0, 1.0]]
        }
        fn measure(&self, x: &[f64]) -> Vec<f64> {
            vec![x[0]]
        }
        fn measurement_jacobian(&self, _x: &[f64]) -> Matrix {
            vec![vec![1.0, 0.0]]
        }
    }

    #[test]
    fn test_ekf_nonlinear_measurement() {
        let mut ekf = ExtendedKalmanFilter::new(
            Squared,
            vec![vec![1e-6]],
            vec![vec![0.01]],
            vec![1.5],
            vec![vec![1.0]],
        )
        .expect("new");
        for _ in 0..20 {
            ekf.step(&[4.0]).expect("step");
        }
        assert!((ekf.state()[0] - 2.0).abs() < 1e-2, "x = {}", ekf.state()[0]);

        ekf.reset();
        assert_eq!(ekf.state(), &[1.5]);
        assert_eq!(ekf.covariance(), &vec![vec![1.0]]);
    }

    #[test]
    fn test_ekf_matches_linear_filter_on_linear_model() {
        let config = KalmanConfig::default();
        let mut kf = KalmanFilter::drift_tracker(&config).expect("tracker");
        let mut ekf = ExtendedKalmanFilter::new(
            ConstantVelocity,
            diagonal(&[config.value_noise, config.rate_noise]),
            vec![vec![config.measurement_noise]],
            vec![0.0, 0.0],
            identity(2),
        )
        .expect("new");

        for z in [0.1, 0.3, 0.2, 0.5, 0.45] {
            kf.step(&[z]).expect("kf");
            ekf.step(&[z]).expect("ekf");
        }
        for (a, b) in kf.state().iter().zip(ekf.state()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_ekf_shape_validation() {
        let r = ExtendedKalmanFilter::new(
            Squared,
            vec![vec![1e-6]],
            vec![vec![0.01]],
            vec![1.0, 2.0],
            vec![vec![1.0]],
        );
        assert!(r.is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// An update never increases the value variance.
        #[test]
        fn prop_update_shrinks_variance(zs in prop::collection::vec(-10.0f64..10.0, 1..30)) {
            let mut kf = KalmanFilter::drift_tracker(&KalmanConfig::default()).expect("tracker");
            for z in zs {
                kf.predict();
                let before = kf.covariance()[0][0];
                kf.update(&[z]).expect("update");
                let after = kf.covariance()[0][0];
                prop_assert!(after <= before + 1e-12);
                prop_assert!(after >= 0.0);
            }
        }
    }
}
