//! Best-fit sphere and conic asphere for plane-removed sag data.
//!
//! Both models are fitted by Levenberg–Marquardt. The sag equations are
//! ill-conditioned to the sign of the curvature, so the initial radius is
//! seeded by the `sag_sign` heuristic: resample the radius/sag relationship
//! onto a uniform 100-point grid, sum the finite-difference slopes, and take
//! the sign. Without a correctly-signed seed the solver frequently settles
//! into a non-physical local minimum.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::interp::{resample_uniform, InterpError};
use crate::levmar::{levenberg_marquardt, FitConvergenceError, LevMarOptions};

/// Number of grid points the sign heuristic resamples onto.
const SIGN_GRID_POINTS: usize = 100;

/// Seed radius scale: sign × max radius × 10.
const SEED_RADIUS_SCALE: f64 = 10.0;

/// Errors from the conic fitter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConicFitError {
    /// Radius and sag arrays disagree in length.
    #[error("sample arrays have mismatched lengths: r={r_len}, dz={dz_len}")]
    MismatchedLengths {
        /// Length of the radius array.
        r_len: usize,
        /// Length of the sag array.
        dz_len: usize,
    },

    /// All samples sit at the same radius; no profile to fit.
    #[error("radial span is degenerate: min {min:.3e}, max {max:.3e}")]
    DegenerateRadialSpan {
        /// Smallest sample radius.
        min: f64,
        /// Largest sample radius.
        max: f64,
    },

    /// The sign-heuristic resample failed.
    #[error(transparent)]
    Interpolation(#[from] InterpError),

    /// The nonlinear solver failed.
    #[error(transparent)]
    Convergence(#[from] FitConvergenceError),
}

/// A fitted sphere or conic asphere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConicFitResult {
    /// Fitted curvature radius Rc, in the sample length unit.
    pub radius: f64,
    /// Fitted conic constant k; `None` for the sphere model.
    pub conic_constant: Option<f64>,
    /// Fitted vertical offset.
    pub offset: f64,
    /// Model sag evaluated at every sample radius.
    pub sag: Array1<f64>,
    /// Data minus the fitted sag.
    pub residual: Array1<f64>,
}

/// Sphere sag at radius `r`: C·r² / (1 + √(1 − C²r²)) + offset, C = 1/Rc.
pub fn sphere_sag(r: f64, rc: f64, offset: f64) -> f64 {
    let c = 1.0 / rc;
    c * r * r / (1.0 + (1.0 - c * c * r * r).sqrt()) + offset
}

/// Conic asphere sag at radius `r`:
/// r² / \[Rc·(1 + √(1 − (1+k)(r/Rc)²))\] + offset.
pub fn asphere_sag(r: f64, rc: f64, k: f64, offset: f64) -> f64 {
    let ratio = r / rc;
    r * r / (rc * (1.0 + (1.0 - (1.0 + k) * ratio * ratio).sqrt())) + offset
}

/// Sign of the overall radial slope of the sag profile: +1.0 or −1.0.
///
/// Resamples (r, dz) onto a uniform grid, takes finite-difference
/// derivatives, and returns the sign of their sum. Zero for a perfectly
/// flat profile.
///
/// # Errors
/// * `ConicFitError::MismatchedLengths` - array lengths differ
/// * `ConicFitError::DegenerateRadialSpan` - all radii equal
pub fn sag_sign(r: &Array1<f64>, dz: &Array1<f64>) -> Result<f64, ConicFitError> {
    if r.len() != dz.len() {
        return Err(ConicFitError::MismatchedLengths {
            r_len: r.len(),
            dz_len: dz.len(),
        });
    }

    let mut pairs: Vec<(f64, f64)> = r.iter().cloned().zip(dz.iter().cloned()).collect();
    pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    let xs: Vec<f64> = pairs.iter().map(|p| p.0).collect();
    let ys: Vec<f64> = pairs.iter().map(|p| p.1).collect();

    let span = xs.last().copied().unwrap_or(0.0) - xs.first().copied().unwrap_or(0.0);
    if !(span > 0.0) {
        return Err(ConicFitError::DegenerateRadialSpan {
            min: xs.first().copied().unwrap_or(0.0),
            max: xs.last().copied().unwrap_or(0.0),
        });
    }

    let (grid, values) = resample_uniform(&xs, &ys, SIGN_GRID_POINTS)?;
    let slope_sum: f64 = grid
        .windows(2)
        .zip(values.windows(2))
        .map(|(x, y)| (y[1] - y[0]) / (x[1] - x[0]))
        .sum();
    if slope_sum == 0.0 {
        return Ok(0.0);
    }
    Ok(slope_sum.signum())
}

/// Seed radius for the nonlinear fits: sag sign × max radius × 10.
///
/// The sign is taken from the as-measured heights, matching the calibration
/// of the seed scale.
///
/// # Errors
/// Same conditions as [`sag_sign`].
pub fn initial_radius(r: &Array1<f64>, dz: &Array1<f64>) -> Result<f64, ConicFitError> {
    let sign = sag_sign(r, dz)?;
    let r_max = r.iter().cloned().fold(0.0_f64, f64::max);
    Ok(sign * r_max * SEED_RADIUS_SCALE)
}

fn validate_profile(r: &Array1<f64>, dz: &Array1<f64>) -> Result<(), ConicFitError> {
    if r.len() != dz.len() {
        return Err(ConicFitError::MismatchedLengths {
            r_len: r.len(),
            dz_len: dz.len(),
        });
    }
    Ok(())
}

/// Fit the sphere model to a plane-removed sag profile.
///
/// # Arguments
/// * `r` - sample radii
/// * `dz` - plane-removed sag values
/// * `radius_seed` - signed initial curvature radius, from [`initial_radius`]
///
/// # Errors
/// * `ConicFitError::MismatchedLengths` - array lengths differ
/// * `ConicFitError::Convergence` - solver failure or unreliable covariance
pub fn fit_sphere(
    r: &Array1<f64>,
    dz: &Array1<f64>,
    radius_seed: f64,
) -> Result<ConicFitResult, ConicFitError> {
    validate_profile(r, dz)?;

    let r_data: Vec<f64> = r.to_vec();
    let dz_data: Vec<f64> = dz.to_vec();
    let fit = levenberg_marquardt(
        move |p: &[f64]| {
            r_data
                .iter()
                .zip(dz_data.iter())
                .map(|(&ri, &zi)| zi - sphere_sag(ri, p[0], p[1]))
                .collect()
        },
        &[radius_seed, -1.0],
        &LevMarOptions::default(),
    )?;

    let (rc, offset) = (fit.parameters[0], fit.parameters[1]);
    let sag = r.mapv(|ri| sphere_sag(ri, rc, offset));
    let residual = dz - &sag;
    Ok(ConicFitResult {
        radius: rc,
        conic_constant: None,
        offset,
        sag,
        residual,
    })
}

/// Fit the conic-asphere model to a plane-removed sag profile.
///
/// # Arguments
/// * `r` - sample radii
/// * `dz` - plane-removed sag values
/// * `radius_seed` - signed initial curvature radius, from [`initial_radius`]
///
/// # Errors
/// * `ConicFitError::MismatchedLengths` - array lengths differ
/// * `ConicFitError::Convergence` - solver failure or unreliable covariance
pub fn fit_asphere(
    r: &Array1<f64>,
    dz: &Array1<f64>,
    radius_seed: f64,
) -> Result<ConicFitResult, ConicFitError> {
    validate_profile(r, dz)?;

    let r_data: Vec<f64> = r.to_vec();
    let dz_data: Vec<f64> = dz.to_vec();
    let fit = levenberg_marquardt(
        move |p: &[f64]| {
            r_data
                .iter()
                .zip(dz_data.iter())
                .map(|(&ri, &zi)| zi - asphere_sag(ri, p[0], p[1], p[2]))
                .collect()
        },
        &[radius_seed, 0.0, 0.0],
        &LevMarOptions::default(),
    )?;

    let (rc, k, offset) = (fit.parameters[0], fit.parameters[1], fit.parameters[2]);
    let sag = r.mapv(|ri| asphere_sag(ri, rc, k, offset));
    let residual = dz - &sag;
    Ok(ConicFitResult {
        radius: rc,
        conic_constant: Some(k),
        offset,
        sag,
        residual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array1;

    fn radial_profile(n: usize, r_max: f64) -> Array1<f64> {
        Array1::from_iter((0..n).map(|i| r_max * i as f64 / (n - 1) as f64))
    }

    #[test]
    fn test_sag_sign_monotonic_profiles() {
        let r = radial_profile(40, 50.0);
        let rising = r.mapv(|ri| 1e-4 * ri * ri);
        let falling = r.mapv(|ri| -1e-4 * ri * ri);

        assert_eq!(sag_sign(&r, &rising).unwrap(), 1.0);
        assert_eq!(sag_sign(&r, &falling).unwrap(), -1.0);
    }

    #[test]
    fn test_sag_sign_unsorted_input() {
        // Heuristic sorts by radius internally.
        let r = Array1::from_vec(vec![3.0, 1.0, 4.0, 2.0, 5.0]);
        let dz = r.mapv(|ri| 0.1 * ri);
        assert_eq!(sag_sign(&r, &dz).unwrap(), 1.0);
    }

    #[test]
    fn test_sag_sign_degenerate_span() {
        let r = Array1::from_vec(vec![2.0, 2.0, 2.0]);
        let dz = Array1::from_vec(vec![0.0, 1.0, 2.0]);
        assert!(matches!(
            sag_sign(&r, &dz),
            Err(ConicFitError::DegenerateRadialSpan { .. })
        ));
    }

    #[test]
    fn test_initial_radius_scale() {
        let r = radial_profile(40, 50.0);
        let dz = r.mapv(|ri| 1e-4 * ri * ri);
        assert_relative_eq!(initial_radius(&r, &dz).unwrap(), 500.0, epsilon = 1e-9);

        let dz_down = r.mapv(|ri| -1e-4 * ri * ri);
        assert_relative_eq!(
            initial_radius(&r, &dz_down).unwrap(),
            -500.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_sphere_fit_recovers_radius() {
        let r = radial_profile(80, 50.0);
        let dz = r.mapv(|ri| sphere_sag(ri, 500.0, 0.0));

        let seed = initial_radius(&r, &dz).unwrap();
        let fit = fit_sphere(&r, &dz, seed).unwrap();

        assert!((fit.radius - 500.0).abs() / 500.0 < 1e-3);
        assert_relative_eq!(fit.offset, 0.0, epsilon = 1e-6);
        for &res in fit.residual.iter() {
            assert!(res.abs() < 1e-9);
        }
    }

    #[test]
    fn test_sphere_fit_concave_radius() {
        let r = radial_profile(80, 25.0);
        let dz = r.mapv(|ri| sphere_sag(ri, -300.0, 2.0e-3));

        let seed = initial_radius(&r, &dz).unwrap();
        assert!(seed < 0.0);
        let fit = fit_sphere(&r, &dz, seed).unwrap();
        assert!((fit.radius + 300.0).abs() / 300.0 < 1e-3);
    }

    #[test]
    fn test_asphere_fit_recovers_conic_constant() {
        let r = radial_profile(120, 40.0);
        let dz = r.mapv(|ri| asphere_sag(ri, 400.0, -0.6, 1.0e-3));

        let seed = initial_radius(&r, &dz).unwrap();
        let fit = fit_asphere(&r, &dz, seed).unwrap();

        assert!((fit.radius - 400.0).abs() / 400.0 < 1e-3);
        let k = fit.conic_constant.unwrap();
        assert!((k + 0.6).abs() < 1e-2);
        assert_relative_eq!(fit.offset, 1.0e-3, epsilon = 1e-6);
    }

    #[test]
    fn test_sphere_fit_near_flat_profile_converges() {
        // What plane removal leaves of a pure-tilt surface: sag that is
        // numerically zero. The curvature is unconstrained but the fit must
        // still converge rather than run out of iterations.
        let r = radial_profile(60, 25.0);
        let dz = r.mapv(|ri| 1e-12 * (0.3 * ri).sin());

        let fit = fit_sphere(&r, &dz, 250.0).unwrap();
        assert!(fit.offset.abs() < 1e-9);
        for &res in fit.residual.iter() {
            assert!(res.abs() < 1e-9);
        }
    }

    #[test]
    fn test_sphere_fit_with_measurement_noise() {
        use rand::prelude::*;

        let r = radial_profile(200, 50.0);
        let mut rng = StdRng::seed_from_u64(42);
        let dz = r.mapv(|ri| sphere_sag(ri, 500.0, 0.0) + (rng.gen::<f64>() - 0.5) * 2e-4);

        let seed = initial_radius(&r, &dz).unwrap();
        let fit = fit_sphere(&r, &dz, seed).unwrap();
        assert!((fit.radius - 500.0).abs() / 500.0 < 1e-3);
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let r = radial_profile(10, 1.0);
        let dz = Array1::zeros(9);
        assert!(matches!(
            fit_sphere(&r, &dz, 10.0),
            Err(ConicFitError::MismatchedLengths { .. })
        ));
    }
}
