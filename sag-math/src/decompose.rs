//! Least-squares Zernike mode decomposition.
//!
//! Solves min ||B·c − z||₂ for the coefficient vector c over the full basis
//! matrix B. The system is re-solved from scratch every time a basis column
//! is appended, so the fit after k columns is the joint fit over modes 0..k
//! rather than a per-mode orthogonal projection. The two differ on sampled
//! apertures, where the discrete basis columns are not orthogonal, and the
//! joint-fit numbers are the ones every downstream report is calibrated
//! against. The reported coefficients and contribution maps come from the
//! final solve over all requested modes.

use log::debug;
use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coords::InvalidInputError;
use crate::linalg::{solve_least_squares, SingularMatrixError};

/// Errors from the mode decomposition.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecomposeError {
    /// The basis matrix is rank-deficient for some prefix of modes.
    #[error(transparent)]
    Singular(#[from] SingularMatrixError),

    /// The height array does not match the basis matrix rows.
    #[error(transparent)]
    InvalidInput(#[from] InvalidInputError),
}

/// Result of decomposing a sag map into Zernike modes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecompositionResult {
    /// One coefficient per mode, in enumeration order.
    pub coefficients: Array1<f64>,
    /// Per-mode contribution maps: column i is coefficient i times basis
    /// column i, index-aligned with the samples.
    pub contributions: Array2<f64>,
    /// Sum of all contributions.
    pub reconstruction: Array1<f64>,
    /// Heights minus the reconstruction.
    pub residual: Array1<f64>,
}

/// Decompose the as-measured heights over the given basis matrix.
///
/// # Arguments
/// * `basis` - dense basis matrix, one row per sample and one column per mode
/// * `z` - as-measured heights (plane not removed), one per sample
///
/// # Errors
/// * `DecomposeError::InvalidInput` - `z` length differs from the basis rows
/// * `DecomposeError::Singular` - the basis is rank-deficient, e.g. fewer
///   distinct samples than modes
pub fn decompose(
    basis: &Array2<f64>,
    z: &Array1<f64>,
) -> Result<DecompositionResult, DecomposeError> {
    let (n_samples, n_modes) = basis.dim();
    if z.len() != n_samples {
        return Err(InvalidInputError::MismatchedLengths {
            x_len: n_samples,
            y_len: n_samples,
            z_len: z.len(),
        }
        .into());
    }

    let full = DMatrix::from_row_iterator(n_samples, n_modes, basis.iter().cloned());
    let rhs = DVector::from_iterator(n_samples, z.iter().cloned());

    // Joint re-solve after every appended column. Intentionally quadratic in
    // the mode count; see the module docs.
    let mut solution = DVector::<f64>::zeros(0);
    for k in 1..=n_modes {
        let prefix = full.columns(0, k).into_owned();
        solution = solve_least_squares(&prefix, &rhs)?;
    }
    debug!(
        "decomposed {} samples into {} modes",
        n_samples, n_modes
    );

    let coefficients = Array1::from_iter(solution.iter().cloned());
    let mut contributions = Array2::<f64>::zeros((n_samples, n_modes));
    for col in 0..n_modes {
        for row in 0..n_samples {
            contributions[(row, col)] = coefficients[col] * basis[(row, col)];
        }
    }

    let mut reconstruction = Array1::<f64>::zeros(n_samples);
    for row in 0..n_samples {
        let mut sum = 0.0;
        for col in 0..n_modes {
            sum += contributions[(row, col)];
        }
        reconstruction[row] = sum;
    }
    let residual = z - &reconstruction;

    Ok(DecompositionResult {
        coefficients,
        contributions,
        reconstruction,
        residual,
    })
}
