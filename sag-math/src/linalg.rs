//! Dense least-squares solving shared by the plane removal and the mode
//! decomposition.
//!
//! Solves min ||A·x − b||₂ through SVD with an explicit rank check, so a
//! rank-deficient system surfaces as a typed error instead of the silent
//! minimum-norm answer the factorization would otherwise hand back.

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

/// Error when a least-squares system has no unique solution.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("least-squares system is rank-deficient: rank {rank} for {cols} columns ({rows} rows)")]
pub struct SingularMatrixError {
    /// Numerical rank of the design matrix.
    pub rank: usize,
    /// Number of rows (samples).
    pub rows: usize,
    /// Number of columns (unknowns).
    pub cols: usize,
}

/// Solve the linear least-squares problem min ||A·x − b||₂.
///
/// # Arguments
/// * `design` - design matrix A, one row per sample
/// * `rhs` - observation vector b, one entry per sample
///
/// # Returns
/// * `Ok(DVector<f64>)` - the unique least-squares solution
/// * `Err(SingularMatrixError)` - if A is numerically rank-deficient
pub fn solve_least_squares(
    design: &DMatrix<f64>,
    rhs: &DVector<f64>,
) -> Result<DVector<f64>, SingularMatrixError> {
    let rows = design.nrows();
    let cols = design.ncols();

    let svd = design.clone().svd(true, true);
    let sigma_max = svd
        .singular_values
        .iter()
        .cloned()
        .fold(0.0_f64, f64::max);
    // Same rank tolerance convention as numpy's lstsq default.
    let tol = sigma_max * rows.max(cols) as f64 * f64::EPSILON;
    let rank = svd
        .singular_values
        .iter()
        .filter(|&&s| s > tol)
        .count();

    if rank < cols {
        return Err(SingularMatrixError { rank, rows, cols });
    }

    svd.solve(rhs, tol)
        .map_err(|_| SingularMatrixError { rank, rows, cols })
}
