//! Error types for paramtune.
//!
//! The numerical path never fails: degraded conditions (singular pivots,
//! zero standard deviation, negative variance) fall back silently. Errors
//! are reserved for malformed inputs rejected at component boundaries.

use thiserror::Error;

/// Result type alias for paramtune operations.
pub type TuneResult<T> = Result<T, TuneError>;

/// Unified error type for all paramtune operations.
#[derive(Debug, Error)]
pub enum TuneError {
    // ===== Input Errors =====
    /// Vector or matrix dimensions do not agree.
    #[error("Dimension mismatch in {context}: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Where the mismatch was detected.
        context: String,
        /// Expected length.
        expected: usize,
        /// Actual length.
        found: usize,
    },

    /// Search bounds are empty, inverted or non-finite.
    #[error("Invalid bounds: {reason}")]
    InvalidBounds {
        /// Why the bounds were rejected.
        reason: String,
    },

    /// Bandit arm index out of range.
    #[error("Invalid arm {arm}: sampler has {n_arms} arms")]
    InvalidArm {
        /// Requested arm.
        arm: usize,
        /// Number of arms available.
        n_arms: usize,
    },

    /// Parameter name not registered with the learner.
    #[error("Unknown parameter '{0}'")]
    UnknownParameter(String),

    /// Non-finite value where a finite one is required.
    #[error("Non-finite value detected at {location}")]
    NonFiniteValue {
        /// Location where the non-finite value was detected.
        location: String,
    },

    // ===== Configuration Errors =====
    /// Invalid configuration parameter.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// YAML parsing error.
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// Validation error.
    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    // ===== I/O Errors =====
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ===== Domain Errors =====
    /// Filter construction or model error.
    #[error("Filter error: {0}")]
    Filter(String),
}

impl TuneError {
    /// Create a configuration error with a message.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a filter error.
    #[must_use]
    pub fn filter(message: impl Into<String>) -> Self {
        Self::Filter(message.into())
    }

    /// Create an invalid-bounds error.
    #[must_use]
    pub fn invalid_bounds(reason: impl Into<String>) -> Self {
        Self::InvalidBounds {
            reason: reason.into(),
        }
    }

    /// Create a dimension mismatch error.
    #[must_use]
    pub fn dimension_mismatch(context: impl Into<String>, expected: usize, found: usize) -> Self {
        Self::DimensionMismatch {
            context: context.into(),
            expected,
            found,
        }
    }

    /// Check if this error was caused by caller input rather than configuration.
    #[must_use]
    pub const fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::DimensionMismatch { .. }
                | Self::InvalidBounds { .. }
                | Self::InvalidArm { .. }
                | Self::UnknownParameter(_)
                | Self::NonFiniteValue { .. }
        )
    }
}
