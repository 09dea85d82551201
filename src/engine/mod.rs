//! Shared runtime services for every component.
//!
//! - Deterministic RNG (PCG64) with normal, gamma and beta variates
//! - Numeric guard that keeps non-finite objective values out of the search

pub mod guard;
pub mod rng;

pub use guard::NumericGuard;
pub use rng::TuneRng;
