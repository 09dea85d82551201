//! Deterministic random number generation.
//!
//! Every stochastic component (initial exploration, bandit sampling,
//! metaheuristic populations) draws from a [`TuneRng`] injected at
//! construction, so runs are bitwise-reproducible from a seed.
//!
//! Non-uniform variates are built from the uniform stream:
//! - normal: Box-Muller transform
//! - gamma: Marsaglia-Tsang rejection on top of the normal sampler
//! - beta: ratio of two gamma draws

use rand::prelude::*;
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

/// Deterministic, reproducible random number generator (PCG64).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuneRng {
    /// Seed the generator was created from.
    seed: u64,
    /// Internal PCG state.
    rng: Pcg64,
}

impl TuneRng {
    /// Create a new RNG with the given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: Pcg64::seed_from_u64(seed),
        }
    }

    /// Get the seed.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Derive an independent generator for a sub-component.
    ///
    /// The derived seed depends only on this generator's seed and `stream`,
    /// never on how many values have been drawn.
    #[must_use]
    pub fn fork(&self, stream: u64) -> Self {
        Self::new(
            self.seed
                .wrapping_add(stream.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15)),
        )
    }

    /// Generate a random f64 in [0, 1).
    pub fn gen_f64(&mut self) -> f64 {
        self.rng.gen()
    }

    /// Generate a random f64 in `[min, max)`.
    ///
    /// A degenerate range (`min == max`) returns `min`; callers validate
    /// bounds before sampling.
    pub fn gen_range_f64(&mut self, min: f64, max: f64) -> f64 {
        min + (max - min) * self.gen_f64()
    }

    /// Generate a random index in `[0, n)`. Returns 0 when `n == 0`.
    pub fn gen_index(&mut self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        self.rng.gen_range(0..n)
    }

    /// Generate a standard normal sample using Box-Muller transform.
    pub fn gen_standard_normal(&mut self) -> f64 {
        let u1 = self.gen_f64();
        let u2 = self.gen_f64();

        // Avoid log(0)
        let u1 = if u1 < f64::EPSILON { f64::EPSILON } else { u1 };

        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }

    /// Generate a normal sample with given mean and std.
    pub fn gen_normal(&mut self, mean: f64, std: f64) -> f64 {
        mean + std * self.gen_standard_normal()
    }

    /// Generate a `Gamma(shape, 1)` sample (Marsaglia-Tsang).
    ///
    /// Shapes below 1 use the boosting identity
    /// `Gamma(a) = Gamma(a + 1) * U^(1/a)`. Non-positive shapes return 0.
    pub fn gen_gamma(&mut self, shape: f64) -> f64 {
        if shape <= 0.0 || !shape.is_finite() {
            return 0.0;
        }
        if shape < 1.0 {
            let boosted = self.gen_gamma(shape + 1.0);
            let u = self.gen_f64();
            return boosted * u.powf(1.0 / shape);
        }

        let d = shape - 1.0 / 3.0;
        let c = 1.0 / (9.0 * d).sqrt();
        loop {
            let x = self.gen_standard_normal();
            let v = 1.0 + c * x;
            if v <= 0.0 {
                continue;
            }
            let v = v * v * v;
            let u = self.gen_f64();
            let x2 = x * x;
            if u < 1.0 - 0.0331 * x2 * x2 {
                return d * v;
            }
            if u.ln() < 0.5 * x2 + d * (1.0 - v + v.ln()) {
                return d * v;
            }
        }
    }

    /// Generate a `Beta(alpha, beta)` sample from two gamma draws.
    pub fn gen_beta(&mut self, alpha: f64, beta: f64) -> f64 {
        let x = self.gen_gamma(alpha);
        let y = self.gen_gamma(beta);
        let total = x + y;
        if total > 0.0 && total.is_finite() {
            x / total
        } else {
            0.5
        }
    }
}
