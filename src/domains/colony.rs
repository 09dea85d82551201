//! Ant colony optimization for operation sequencing.
//!
//! Finds an ordering of `n` operations (a Hamiltonian path, no return leg)
//! minimizing the summed transition cost. Each ant starts at a random
//! operation and repeatedly picks an unvisited one with probability
//! proportional to
//!
//! ```text
//! tau(i, j)^alpha · (1 / cost(i, j))^beta
//! ```
//!
//! After every ant has finished, all pheromone evaporates by `(1 − rho)` and
//! each ant deposits `q / path_cost` on both directions of every edge it
//! used. The best ordering over all iterations is returned.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::engine::rng::TuneRng;
use crate::error::{TuneError, TuneResult};

/// Costs below this are treated as this value when inverted.
pub const COST_EPSILON: f64 = 1e-6;

/// Dense transition-cost matrix (flattened n×n, row = from).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostMatrix {
    n: usize,
    costs: Vec<f64>,
}

impl CostMatrix {
    /// Build from rows.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` for a non-square matrix and
    /// `NonFiniteValue` for negative or non-finite entries.
    pub fn new(rows: &[Vec<f64>]) -> TuneResult<Self> {
        let n = rows.len();
        let mut costs = Vec::with_capacity(n * n);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n {
                return Err(TuneError::dimension_mismatch(
                    format!("cost matrix row {i}"),
                    n,
                    row.len(),
                ));
            }
            for (j, c) in row.iter().enumerate() {
                if !c.is_finite() || *c < 0.0 {
                    return Err(TuneError::NonFiniteValue {
                        location: format!("cost[{i}][{j}]"),
                    });
                }
            }
            costs.extend_from_slice(row);
        }
        Ok(Self { n, costs })
    }

    /// Tool-change style costs: free within a group, `change_cost` across groups.
    ///
    /// # Errors
    ///
    /// Returns `NonFiniteValue` if `change_cost` is negative or non-finite.
    pub fn from_groups(groups: &[usize], change_cost: f64) -> TuneResult<Self> {
        if !change_cost.is_finite() || change_cost < 0.0 {
            return Err(TuneError::NonFiniteValue {
                location: "change_cost".to_string(),
            });
        }
        let n = groups.len();
        let mut costs = Vec::with_capacity(n * n);
        for a in groups {
            for b in groups {
                costs.push(if a == b { 0.0 } else { change_cost });
            }
        }
        Ok(Self { n, costs })
    }

    /// Cost of moving from `from` to `to`.
    #[must_use]
    pub fn get(&self, from: usize, to: usize) -> f64 {
        self.costs[from * self.n + to]
    }

    /// Total cost of visiting `order` front to back.
    #[must_use]
    pub fn path_cost(&self, order: &[usize]) -> f64 {
        order.windows(2).map(|w| self.get(w[0], w[1])).sum()
    }

    /// Number of operations.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.n
    }

    /// True if there is nothing to sequence.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.n == 0
    }
}

/// Ant colony settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ColonyConfig {
    /// Ants per iteration.
    #[validate(range(min = 1))]
    #[serde(default = "default_n_ants")]
    pub n_ants: usize,
    /// Construction/update rounds.
    #[validate(range(min = 1))]
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    /// Pheromone exponent.
    #[validate(range(min = 0.0))]
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    /// Heuristic (inverse cost) exponent.
    #[validate(range(min = 0.0))]
    #[serde(default = "default_beta")]
    pub beta: f64,
    /// Evaporation rate rho.
    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    #[serde(default = "default_evaporation")]
    pub evaporation: f64,
    /// Deposit constant Q.
    #[validate(range(exclusive_min = 0.0))]
    #[serde(default = "default_deposit")]
    pub deposit: f64,
    /// Uniform starting pheromone level.
    #[validate(range(exclusive_min = 0.0))]
    #[serde(default = "default_initial_pheromone")]
    pub initial_pheromone: f64,
    /// RNG seed.
    #[serde(default)]
    pub seed: u64,
}

const fn default_n_ants() -> usize {
    20
}

const fn default_iterations() -> usize {
    100
}

const fn default_alpha() -> f64 {
    1.0
}

const fn default_beta() -> f64 {
    2.0
}

const fn default_evaporation() -> f64 {
    0.1
}

const fn default_deposit() -> f64 {
    1.0
}

const fn default_initial_pheromone() -> f64 {
    1.0
}

impl Default for ColonyConfig {
    fn default() -> Self {
        Self {
            n_ants: default_n_ants(),
            iterations: default_iterations(),
            alpha: default_alpha(),
            beta: default_beta(),
            evaporation: default_evaporation(),
            deposit: default_deposit(),
            initial_pheromone: default_initial_pheromone(),
            seed: 42,
        }
    }
}

/// Best sequence found by the colony.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceResult {
    /// Visiting order (a permutation of `0..n`).
    pub best_order: Vec<usize>,
    /// Path cost of `best_order`.
    pub best_cost: f64,
    /// Iterations run.
    pub iterations: usize,
    /// Best cost after each iteration.
    pub convergence: Vec<f64>,
}

/// Ant colony sequencer.
#[derive(Debug, Clone)]
pub struct AntColony {
    config: ColonyConfig,
    rng: TuneRng,
}

impl AntColony {
    /// Create a colony.
    ///
    /// # Errors
    ///
    /// Returns a validation error for out-of-range settings.
    pub fn new(config: ColonyConfig) -> TuneResult<Self> {
        config.validate()?;
        let rng = TuneRng::new(config.seed);
        Ok(Self { config, rng })
    }

    /// Search for the cheapest ordering of every operation in `costs`.
    pub fn optimize(&mut self, costs: &CostMatrix) -> SequenceResult {
        let n = costs.len();
        if n < 2 {
            return SequenceResult {
                best_order: (0..n).collect(),
                best_cost: 0.0,
                iterations: 0,
                convergence: Vec::new(),
            };
        }

        let mut pheromone = vec![self.config.initial_pheromone; n * n];
        let mut best_order: Vec<usize> = Vec::new();
        let mut best_cost = f64::INFINITY;
        let mut convergence = Vec::with_capacity(self.config.iterations);

        for iteration in 0..self.config.iterations {
            let tours: Vec<Vec<usize>> = (0..self.config.n_ants)
                .map(|_| self.construct(costs, &pheromone))
                .collect();

            let keep = 1.0 - self.config.evaporation;
            for tau in &mut pheromone {
                *tau *= keep;
            }

            for tour in &tours {
                let cost = costs.path_cost(tour);
                let amount = self.config.deposit / cost.max(COST_EPSILON);
                for w in tour.windows(2) {
                    pheromone[w[0] * n + w[1]] += amount;
                    pheromone[w[1] * n + w[0]] += amount;
                }
                if cost < best_cost {
                    best_cost = cost;
                    best_order.clone_from(tour);
                }
            }

            convergence.push(best_cost);
            tracing::trace!(iteration, best_cost, "ant colony iteration");
        }

        tracing::debug!(best_cost, n_operations = n, "ant colony finished");
        SequenceResult {
            best_order,
            best_cost,
            iterations: self.config.iterations,
            convergence,
        }
    }

    /// One ant's tour.
    fn construct(&mut self, costs: &CostMatrix, pheromone: &[f64]) -> Vec<usize> {
        let n = costs.len();
        let mut visited = vec![false; n];
        let start = self.rng.gen_index(n);
        visited[start] = true;
        let mut tour = Vec::with_capacity(n);
        tour.push(start);

        let mut weights = Vec::with_capacity(n);
        while tour.len() < n {
            let current = tour[tour.len() - 1];
            weights.clear();
            for next in (0..n).filter(|j| !visited[*j]) {
                let tau = pheromone[current * n + next].powf(self.config.alpha);
                let eta = (1.0 / costs.get(current, next).max(COST_EPSILON)).powf(self.config.beta);
                weights.push((next, tau * eta));
            }

            let total: f64 = weights.iter().map(|(_, w)| w).sum();
            let chosen = if total > 0.0 && total.is_finite() {
                let mut r = self.rng.gen_f64() * total;
                let mut pick = weights[weights.len() - 1].0;
                for (j, w) in &weights {
                    if r < *w {
                        pick = *j;
                        break;
                    }
                    r -= w;
                }
                pick
            } else {
                weights[self.rng.gen_index(weights.len())].0
            };

            visited[chosen] = true;
            tour.push(chosen);
        }
        tour
    }

    /// Settings in use.
    #[must_use]
    pub const fn config(&self) -> &ColonyConfig {
        &self.config
    }
}
