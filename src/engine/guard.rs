//! Numeric guard for objective values and state vectors.
//!
//! Optimizers never fail on a bad objective evaluation. A non-finite
//! fitness is replaced by `+inf` so it can never become the incumbent,
//! and the substitution is counted and reported in run diagnostics.
//! Filters and learners use the strict checks to reject non-finite
//! inputs at their boundary.

use crate::error::{TuneError, TuneResult};

/// Detects and neutralizes non-finite values.
///
/// # Example
///
/// ```rust
/// use paramtune::engine::guard::NumericGuard;
///
/// let mut guard = NumericGuard::new();
/// assert!((guard.fitness(2.5, "sphere") - 2.5).abs() < f64::EPSILON);
/// assert!(guard.fitness(f64::NAN, "sphere").is_infinite());
/// assert_eq!(guard.sanitized_count(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct NumericGuard {
    /// Number of values replaced since the last reset.
    sanitized: u64,
}

impl NumericGuard {
    /// Create a guard with a zero counter.
    #[must_use]
    pub const fn new() -> Self {
        Self { sanitized: 0 }
    }

    /// Pass a finite fitness through; map NaN and +/-inf to `+inf`.
    pub fn fitness(&mut self, value: f64, location: &str) -> f64 {
        if value.is_finite() {
            return value;
        }
        self.sanitized += 1;
        tracing::warn!(
            location,
            value = %value,
            "non-finite objective value treated as worst fitness"
        );
        f64::INFINITY
    }

    /// Check a single value.
    ///
    /// # Errors
    ///
    /// Returns `NonFiniteValue` if the value is NaN or infinite.
    pub fn check_value(&mut self, value: f64, location: &str) -> TuneResult<()> {
        if value.is_finite() {
            Ok(())
        } else {
            self.sanitized += 1;
            Err(TuneError::NonFiniteValue {
                location: location.to_string(),
            })
        }
    }

    /// Check every element of a slice.
    ///
    /// # Errors
    ///
    /// Returns `NonFiniteValue` naming the first offending index.
    pub fn check_values(&mut self, values: &[f64], location: &str) -> TuneResult<()> {
        for (i, v) in values.iter().enumerate() {
            if !v.is_finite() {
                self.sanitized += 1;
                return Err(TuneError::NonFiniteValue {
                    location: format!("{location}[{i}]"),
                });
            }
        }
        Ok(())
    }

    /// Number of non-finite values seen since construction or reset.
    #[must_use]
    pub const fn sanitized_count(&self) -> u64 {
        self.sanitized
    }

    /// Reset the counter.
    pub fn reset_count(&mut self) {
        self.sanitized = 0;
    }
}
