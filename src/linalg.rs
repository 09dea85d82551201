//! Dense linear algebra on row-major `Vec<Vec<f64>>` matrices.
//!
//! Sized for the small systems this crate produces (GP covariance with a
//! few hundred observations at most, Kalman matrices of dimension 1-4).
//!
//! # Inversion
//!
//! [`invert`] is Gauss-Jordan elimination with partial pivoting. A pivot
//! whose magnitude falls below [`PIVOT_EPSILON`] is skipped instead of
//! divided by, so singular or ill-conditioned input yields a best-effort
//! inverse rather than an error or a matrix full of infinities. This is
//! not a pseudo-inverse; accuracy degrades along the skipped directions.

/// Row-major dense matrix.
pub type Matrix = Vec<Vec<f64>>;

/// Pivots with smaller magnitude are treated as singular directions.
pub const PIVOT_EPSILON: f64 = 1e-10;

/// Result of a Gauss-Jordan inversion with diagnostics.
#[derive(Debug, Clone)]
pub struct Inversion {
    /// Best-effort inverse.
    pub inverse: Matrix,
    /// Sum of `ln |pivot|` over the pivots actually used.
    pub log_abs_det: f64,
    /// Number of columns whose pivot was skipped.
    pub skipped_pivots: usize,
}

impl Inversion {
    /// True when every pivot was usable.
    #[must_use]
    pub const fn is_full_rank(&self) -> bool {
        self.skipped_pivots == 0
    }
}

/// Invert a square matrix, returning diagnostics alongside the inverse.
#[must_use]
pub fn gauss_jordan(a: &[Vec<f64>]) -> Inversion {
    let n = a.len();
    let mut aug: Matrix = a
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut r = Vec::with_capacity(2 * n);
            r.extend_from_slice(row);
            r.resize(n, 0.0);
            r.extend((0..n).map(|j| if i == j { 1.0 } else { 0.0 }));
            r
        })
        .collect();

    let mut log_abs_det = 0.0;
    let mut skipped_pivots = 0;

    for col in 0..n {
        let mut pivot_row = col;
        let mut pivot_abs = aug[col][col].abs();
        for r in (col + 1)..n {
            let v = aug[r][col].abs();
            if v > pivot_abs {
                pivot_abs = v;
                pivot_row = r;
            }
        }
        aug.swap(col, pivot_row);

        let pivot = aug[col][col];
        if pivot.abs() < PIVOT_EPSILON {
            skipped_pivots += 1;
            tracing::trace!(col, pivot, "skipping near-zero pivot");
            continue;
        }
        log_abs_det += pivot.abs().ln();

        for v in &mut aug[col] {
            *v /= pivot;
        }
        let pivot_values = aug[col].clone();
        for (r, row) in aug.iter_mut().enumerate() {
            if r == col {
                continue;
            }
            let factor = row[col];
            if factor == 0.0 {
                continue;
            }
            for (v, p) in row.iter_mut().zip(&pivot_values) {
                *v -= factor * p;
            }
        }
    }

    let inverse = aug.into_iter().map(|row| row[n..].to_vec()).collect();
    Inversion {
        inverse,
        log_abs_det,
        skipped_pivots,
    }
}

/// Best-effort inverse of a square matrix. Never fails.
#[must_use]
pub fn invert(a: &[Vec<f64>]) -> Matrix {
    gauss_jordan(a).inverse
}

/// `n x n` identity matrix.
#[must_use]
pub fn identity(n: usize) -> Matrix {
    (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect()
}

/// Square matrix with `diag` on the diagonal.
#[must_use]
pub fn diagonal(diag: &[f64]) -> Matrix {
    let n = diag.len();
    (0..n)
        .map(|i| (0..n).map(|j| if i == j { diag[i] } else { 0.0 }).collect())
        .collect()
}

/// Matrix transpose.
#[must_use]
pub fn transpose(a: &[Vec<f64>]) -> Matrix {
    let rows = a.len();
    let cols = a.first().map_or(0, Vec::len);
    (0..cols)
        .map(|j| (0..rows).map(|i| a[i][j]).collect())
        .collect()
}

/// Matrix product `A * B`.
#[must_use]
pub fn mat_mul(a: &[Vec<f64>], b: &[Vec<f64>]) -> Matrix {
    let inner = b.len();
    let cols = b.first().map_or(0, Vec::len);
    a.iter()
        .map(|row| {
            (0..cols)
                .map(|j| (0..inner).map(|k| row[k] * b[k][j]).sum())
                .collect()
        })
        .collect()
}

/// Matrix-vector product `A * v`.
#[must_use]
pub fn mat_vec(a: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
    a.iter().map(|row| dot(row, v)).collect()
}

/// Element-wise `A + B`.
#[must_use]
pub fn mat_add(a: &[Vec<f64>], b: &[Vec<f64>]) -> Matrix {
    a.iter()
        .zip(b)
        .map(|(ra, rb)| ra.iter().zip(rb).map(|(x, y)| x + y).collect())
        .collect()
}

/// Element-wise `A - B`.
#[must_use]
pub fn mat_sub(a: &[Vec<f64>], b: &[Vec<f64>]) -> Matrix {
    a.iter()
        .zip(b)
        .map(|(ra, rb)| ra.iter().zip(rb).map(|(x, y)| x - y).collect())
        .collect()
}

/// Dot product.
#[must_use]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Symmetry check with absolute tolerance.
#[must_use]
pub fn is_symmetric(a: &[Vec<f64>], tol: f64) -> bool {
    let n = a.len();
    a.iter().all(|row| row.len() == n)
        && (0..n).all(|i| (0..i).all(|j| (a[i][j] - a[j][i]).abs() <= tol))
}

/// Shape of a matrix as `(rows, cols)`; ragged rows report the first row's length.
#[must_use]
pub fn shape(a: &[Vec<f64>]) -> (usize, usize) {
    (a.len(), a.first().map_or(0, Vec::len))
}
