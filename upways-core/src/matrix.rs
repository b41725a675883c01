//! Dense matrix arithmetic for the chain models.
//!
//! Matrices here are small (bounded by the Markov range limit, nine states in
//! the reference domain), so everything is a plain row-major `Vec<f64>` with
//! O(n³) multiplication. All operations are pure: inputs are borrowed and a
//! new matrix is returned.
//!
//! Constructors and the inversions report bad shapes as [`MatrixError`].
//! The arithmetic operators and the small accessors panic on a shape
//! mismatch, like slice indexing does.

use std::ops::{Add, Index, IndexMut, Mul, Sub};

use thiserror::Error;

/// Pivot magnitude below which Gauss-Jordan elimination gives up.
pub const PIVOT_EPSILON: f64 = 1e-10;

/// Largest power entry at which the Neumann series is considered converged.
pub const NEUMANN_TOLERANCE: f64 = 1e-10;

/// Convergence of the Neumann series is only checked every this many terms.
pub const NEUMANN_CHECK_INTERVAL: usize = 1_000;

/// Hard ceiling on Neumann series terms.
pub const NEUMANN_MAX_TERMS: usize = 50_000;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MatrixError {
    #[error("singular matrix: pivot {pivot:e} in column {column}")]
    Singular { column: usize, pivot: f64 },
    #[error("neumann series did not converge after {iterations} terms")]
    NotConverged { iterations: usize },
    #[error("row {row} has {found} columns, expected {expected}")]
    Ragged { row: usize, expected: usize, found: usize },
    #[error("expected a square matrix, got {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },
}

/// Row-major dense matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m[(i, i)] = 1.0;
        }
        m
    }

    /// Builds a matrix from nested rows; every row must have the length of
    /// the first.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, MatrixError> {
        let n_rows = rows.len();
        let n_cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(n_rows * n_cols);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != n_cols {
                return Err(MatrixError::Ragged {
                    row: i,
                    expected: n_cols,
                    found: row.len(),
                });
            }
            data.extend(row);
        }
        Ok(Self {
            rows: n_rows,
            cols: n_cols,
            data,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Copies the top-left `rows × cols` block.
    ///
    /// # Panics
    ///
    /// If the block is larger than `self`.
    pub fn block(&self, rows: usize, cols: usize) -> Matrix {
        assert!(rows <= self.rows && cols <= self.cols, "block out of bounds");
        let mut out = Matrix::zeros(rows, cols);
        for i in 0..rows {
            out.data[i * cols..(i + 1) * cols].copy_from_slice(&self.row(i)[..cols]);
        }
        out
    }

    pub fn scale(&self, factor: f64) -> Matrix {
        self.map(|v| v * factor)
    }

    /// Element-wise (Hadamard) square.
    pub fn hadamard_square(&self) -> Matrix {
        self.map(|v| v * v)
    }

    /// Matrix holding only the diagonal of `self`.
    ///
    /// # Panics
    ///
    /// If `self` is not square.
    pub fn diagonal(&self) -> Matrix {
        assert!(self.is_square(), "diagonal of a non-square matrix");
        let mut out = Matrix::zeros(self.rows, self.cols);
        for i in 0..self.rows {
            out[(i, i)] = self[(i, i)];
        }
        out
    }

    /// Largest absolute entry, `0.0` for an empty matrix.
    pub fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()))
    }

    /// Row vector times matrix: `v · self`.
    ///
    /// # Panics
    ///
    /// If `v.len()` differs from the row count.
    pub fn left_multiply(&self, v: &[f64]) -> Vec<f64> {
        assert_eq!(v.len(), self.rows, "vector length must match row count");
        let mut out = vec![0.0; self.cols];
        for (i, &vi) in v.iter().enumerate() {
            if vi == 0.0 {
                continue;
            }
            for (o, &m) in out.iter_mut().zip(self.row(i)) {
                *o += vi * m;
            }
        }
        out
    }

    /// Gauss-Jordan inversion with partial pivoting.
    ///
    /// At every column the row holding the largest-magnitude entry is swapped
    /// into the pivot position; a pivot below [`PIVOT_EPSILON`] fails with
    /// [`MatrixError::Singular`].
    pub fn inverse(&self) -> Result<Matrix, MatrixError> {
        self.ensure_square()?;
        let n = self.rows;
        let width = 2 * n;

        // Augmented [A | I]
        let mut aug = vec![0.0; n * width];
        for i in 0..n {
            aug[i * width..i * width + n].copy_from_slice(self.row(i));
            aug[i * width + n + i] = 1.0;
        }

        for col in 0..n {
            let mut pivot_row = col;
            for r in col + 1..n {
                if aug[r * width + col].abs() > aug[pivot_row * width + col].abs() {
                    pivot_row = r;
                }
            }
            if pivot_row != col {
                for j in 0..width {
                    aug.swap(col * width + j, pivot_row * width + j);
                }
            }

            let pivot = aug[col * width + col];
            if pivot.abs() < PIVOT_EPSILON {
                return Err(MatrixError::Singular { column: col, pivot });
            }
            for j in 0..width {
                aug[col * width + j] /= pivot;
            }

            for r in 0..n {
                if r == col {
                    continue;
                }
                let factor = aug[r * width + col];
                if factor == 0.0 {
                    continue;
                }
                for j in 0..width {
                    aug[r * width + j] -= factor * aug[col * width + j];
                }
            }
        }

        let mut out = Matrix::zeros(n, n);
        for i in 0..n {
            out.data[i * n..(i + 1) * n].copy_from_slice(&aug[i * width + n..(i + 1) * width]);
        }
        Ok(out)
    }

    /// Truncated Neumann series `Σ_{k=0}^{K} selfᵏ`, an approximation of
    /// `(I - self)⁻¹` for a substochastic `self`.
    ///
    /// Returns the sum and the number of terms accumulated. Convergence is
    /// tested every [`NEUMANN_CHECK_INTERVAL`] terms against
    /// [`NEUMANN_TOLERANCE`]; after [`NEUMANN_MAX_TERMS`] the series is
    /// abandoned with [`MatrixError::NotConverged`].
    pub fn neumann_series(&self) -> Result<(Matrix, usize), MatrixError> {
        self.ensure_square()?;
        let n = self.rows;
        let mut sum = Matrix::identity(n);
        let mut power = Matrix::identity(n);

        for k in 1..=NEUMANN_MAX_TERMS {
            power = &power * self;
            sum = &sum + &power;
            if k % NEUMANN_CHECK_INTERVAL == 0 && power.max_abs() < NEUMANN_TOLERANCE {
                return Ok((sum, k));
            }
        }

        Err(MatrixError::NotConverged {
            iterations: NEUMANN_MAX_TERMS,
        })
    }

    fn ensure_square(&self) -> Result<(), MatrixError> {
        if self.is_square() {
            Ok(())
        } else {
            Err(MatrixError::NotSquare {
                rows: self.rows,
                cols: self.cols,
            })
        }
    }

    fn map(&self, f: impl Fn(f64) -> f64) -> Matrix {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    fn zip_with(&self, other: &Matrix, f: impl Fn(f64, f64) -> f64) -> Matrix {
        assert_eq!(
            (self.rows, self.cols),
            (other.rows, other.cols),
            "matrix dimensions must match"
        );
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(&a, &b)| f(a, b))
                .collect(),
        }
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, (i, j): (usize, usize)) -> &f64 {
        &self.data[i * self.cols + j]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut f64 {
        &mut self.data[i * self.cols + j]
    }
}

impl Add for &Matrix {
    type Output = Matrix;

    fn add(self, rhs: &Matrix) -> Matrix {
        self.zip_with(rhs, |a, b| a + b)
    }
}

impl Sub for &Matrix {
    type Output = Matrix;

    fn sub(self, rhs: &Matrix) -> Matrix {
        self.zip_with(rhs, |a, b| a - b)
    }
}

impl Mul for &Matrix {
    type Output = Matrix;

    fn mul(self, rhs: &Matrix) -> Matrix {
        assert_eq!(self.cols, rhs.rows, "inner dimensions must match");
        let mut out = Matrix::zeros(self.rows, rhs.cols);
        for i in 0..self.rows {
            for k in 0..self.cols {
                let a = self[(i, k)];
                if a == 0.0 {
                    continue;
                }
                for j in 0..rhs.cols {
                    out.data[i * rhs.cols + j] += a * rhs[(k, j)];
                }
            }
        }
        out
    }
}
