// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Crosstalk matrix and its inversion.
//!
//! Inversion is Gauss-Jordan elimination with partial pivoting on the
//! augmented matrix `[M | I]`. Crosstalk matrices are small (one row per
//! flux line), so the dense O(n^3) solve is negligible next to mixing
//! every sample.

use ndarray::{s, Array2};
use serde::Serialize;
use tracing::debug;

use crate::error::{PulseError, Result, ValidationError};

/// Tolerance on the unit diagonal.
pub const DIAGONAL_TOLERANCE: f64 = 1e-9;

/// Pivot threshold relative to the matrix 1-norm.
pub const PIVOT_TOLERANCE: f64 = 1e-12;

/// Default upper bound on the 1-norm condition number.
pub const DEFAULT_MAX_CONDITION_NUMBER: f64 = 1e8;

/// Linear model of leakage between control lines.
///
/// Entry `(i, j)` is the fraction of line `j`'s drive that appears on
/// line `i`. Rows and columns are labelled by qubit id.
///
/// # Invariants
///
/// - square, one row per entry of `qubits`
/// - qubit ids unique
/// - all entries finite, diagonal equal to 1 within [`DIAGONAL_TOLERANCE`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrosstalkMatrix {
    qubits: Vec<usize>,
    matrix: Array2<f64>,
    max_condition_number: f64,
}

impl CrosstalkMatrix {
    /// Create a matrix over `qubits`.
    ///
    /// # Errors
    ///
    /// `Validation` if the shape, labels or entries break an invariant.
    pub fn new(qubits: Vec<usize>, matrix: Array2<f64>) -> Result<Self> {
        let n = qubits.len();
        if matrix.nrows() != n || matrix.ncols() != n {
            return Err(ValidationError::field(
                "crosstalk.matrix",
                format!(
                    "expected {n} x {n} for {n} qubits, got {} x {}",
                    matrix.nrows(),
                    matrix.ncols()
                ),
            )
            .into());
        }
        let mut sorted = qubits.clone();
        sorted.sort_unstable();
        sorted.dedup();
        if sorted.len() != n {
            return Err(
                ValidationError::field("crosstalk.qubits", "qubit ids must be unique").into(),
            );
        }
        if let Some(((i, j), v)) = matrix.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(ValidationError::field(
                "crosstalk.matrix",
                format!("entry ({i}, {j}) is not finite: {v}"),
            )
            .into());
        }
        for i in 0..n {
            let d = matrix[[i, i]];
            if (d - 1.0).abs() > DIAGONAL_TOLERANCE {
                return Err(ValidationError::field(
                    "crosstalk.matrix",
                    format!("diagonal entry for qubit {} must be 1, got {d}", qubits[i]),
                )
                .into());
            }
        }
        Ok(Self {
            qubits,
            matrix,
            max_condition_number: DEFAULT_MAX_CONDITION_NUMBER,
        })
    }

    /// Matrix over qubits `0..rows.len()`.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let n = rows.len();
        if let Some(row) = rows.iter().find(|r| r.len() != n) {
            return Err(ValidationError::field(
                "crosstalk.matrix",
                format!("row of length {} in a {n}-row matrix", row.len()),
            )
            .into());
        }
        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        let matrix = Array2::from_shape_vec((n, n), flat)
            .map_err(|e| ValidationError::field("crosstalk.matrix", e.to_string()))?;
        Self::new((0..n).collect(), matrix)
    }

    /// No crosstalk between `n` lines.
    pub fn identity(n: usize) -> Self {
        Self {
            qubits: (0..n).collect(),
            matrix: Array2::eye(n),
            max_condition_number: DEFAULT_MAX_CONDITION_NUMBER,
        }
    }

    /// Override the condition-number bound used by [`inverse`](Self::inverse).
    pub fn with_max_condition_number(mut self, bound: f64) -> Self {
        self.max_condition_number = bound;
        self
    }

    pub fn qubits(&self) -> &[usize] {
        &self.qubits
    }

    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    pub fn max_condition_number(&self) -> f64 {
        self.max_condition_number
    }

    pub fn len(&self) -> usize {
        self.qubits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.qubits.is_empty()
    }

    /// Row/column index of `qubit`.
    pub fn index_of(&self, qubit: usize) -> Option<usize> {
        self.qubits.iter().position(|&q| q == qubit)
    }

    /// Inverse matrix.
    ///
    /// # Errors
    ///
    /// `SingularCrosstalkMatrix` if a pivot vanishes or the 1-norm
    /// condition number exceeds the configured bound.
    pub fn inverse(&self) -> Result<Array2<f64>> {
        let inv = gauss_jordan_inverse(&self.matrix)?;
        let kappa = matrix_1_norm(&self.matrix) * matrix_1_norm(&inv);
        debug!(size = self.len(), condition_number = kappa, "Inverted crosstalk matrix");
        if !kappa.is_finite() || kappa > self.max_condition_number {
            return Err(PulseError::SingularCrosstalkMatrix(format!(
                "condition number {kappa:.3e} exceeds limit {:.3e}",
                self.max_condition_number
            ))
            .into());
        }
        Ok(inv)
    }

    /// 1-norm condition number `||M||_1 * ||M^-1||_1`.
    pub fn condition_number(&self) -> Result<f64> {
        let inv = gauss_jordan_inverse(&self.matrix)?;
        Ok(matrix_1_norm(&self.matrix) * matrix_1_norm(&inv))
    }
}

/// Invert `a` by Gauss-Jordan elimination with partial pivoting.
fn gauss_jordan_inverse(a: &Array2<f64>) -> Result<Array2<f64>> {
    let n = a.nrows();
    let threshold = PIVOT_TOLERANCE * matrix_1_norm(a).max(f64::MIN_POSITIVE);

    // Augmented matrix [A | I]
    let mut aug = Array2::<f64>::zeros((n, 2 * n));
    aug.slice_mut(s![.., ..n]).assign(a);
    aug.slice_mut(s![.., n..]).assign(&Array2::<f64>::eye(n));

    for col in 0..n {
        // Find pivot
        let mut max_val = 0.0;
        let mut max_row = col;
        for row in col..n {
            let val = aug[[row, col]].abs();
            if val > max_val {
                max_val = val;
                max_row = row;
            }
        }

        if max_val < threshold {
            return Err(PulseError::SingularCrosstalkMatrix(format!(
                "zero pivot in column {col} (|pivot| = {max_val:.3e})"
            ))
            .into());
        }

        // Swap rows
        if max_row != col {
            for j in 0..(2 * n) {
                aug.swap([col, j], [max_row, j]);
            }
        }

        // Normalize pivot row
        let pivot = aug[[col, col]];
        for j in 0..(2 * n) {
            aug[[col, j]] /= pivot;
        }

        // Eliminate above and below
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = aug[[row, col]];
            if factor == 0.0 {
                continue;
            }
            for j in 0..(2 * n) {
                let val = aug[[col, j]];
                aug[[row, j]] -= factor * val;
            }
        }
    }

    Ok(aug.slice(s![.., n..]).to_owned())
}

/// Max column sum of absolute values.
fn matrix_1_norm(a: &Array2<f64>) -> f64 {
    a.columns()
        .into_iter()
        .map(|col| col.iter().map(|v| v.abs()).sum::<f64>())
        .fold(0.0, f64::max)
}
