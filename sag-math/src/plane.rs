//! Piston/tip/tilt removal.
//!
//! Fits the best plane z ≈ piston + tip·x + tilt·y by linear least squares
//! and subtracts it, leaving the surface-form content the Zernike and conic
//! analyses operate on.

use nalgebra::{DMatrix, DVector};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::linalg::{solve_least_squares, SingularMatrixError};

/// Coefficients of the best-fit plane.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlaneFit {
    /// Constant offset.
    pub piston: f64,
    /// Slope along x.
    pub tip: f64,
    /// Slope along y.
    pub tilt: f64,
}

impl PlaneFit {
    /// Evaluate the plane at a sample position.
    pub fn evaluate(&self, x: f64, y: f64) -> f64 {
        self.piston + self.tip * x + self.tilt * y
    }
}

/// Result of removing the best-fit plane from a sag map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaneRemoval {
    /// The fitted plane.
    pub fit: PlaneFit,
    /// Heights with the fitted plane subtracted, index-aligned with the input.
    pub residual: Array1<f64>,
}

/// Remove the best-fit piston/tip/tilt plane from the heights.
///
/// The residual has zero best-fit-plane component by construction, so
/// applying this twice changes the result only by floating-point noise.
///
/// # Arguments
/// * `x` - centered sample x coordinates
/// * `y` - centered sample y coordinates
/// * `z` - sag values
///
/// # Errors
/// * `SingularMatrixError` - samples are collinear, so tip and tilt are not
///   separable
pub fn remove_plane(
    x: &Array1<f64>,
    y: &Array1<f64>,
    z: &Array1<f64>,
) -> Result<PlaneRemoval, SingularMatrixError> {
    let n = x.len();

    let mut design = DMatrix::<f64>::zeros(n, 3);
    for i in 0..n {
        design[(i, 0)] = 1.0;
        design[(i, 1)] = x[i];
        design[(i, 2)] = y[i];
    }
    let rhs = DVector::from_iterator(n, z.iter().cloned());

    let solution = solve_least_squares(&design, &rhs)?;
    let fit = PlaneFit {
        piston: solution[0],
        tip: solution[1],
        tilt: solution[2],
    };

    let residual = Array1::from_iter(
        x.iter()
            .zip(y.iter())
            .zip(z.iter())
            .map(|((&xi, &yi), &zi)| zi - fit.evaluate(xi, yi)),
    );

    Ok(PlaneRemoval { fit, residual })
}
