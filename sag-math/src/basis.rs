//! Zernike basis evaluation.
//!
//! Builds the dense basis matrix with one row per sample and one column per
//! mode. The radial polynomial uses the standard factorial sum
//!
//! R_n^|m|(rho) = Σ_k (−1)^k (n−k)! / \[k! ((n+|m|)/2 − k)! ((n−|m|)/2 − k)!\] rho^(n−2k)
//!
//! with k running to (n−|m|)/2, and the angular term is cos(|m|·phi) for
//! m ≥ 0 and sin(|m|·phi) for m < 0. The |m| = n case is the same sum with
//! a single k = 0 iteration, not a separate closed form, so it is numerically
//! identical to the general path.

use ndarray::{Array1, Array2};
use thiserror::Error;

use crate::modes::ZernikeMode;

/// Error for a mode index pair outside the mathematically valid range.
///
/// The enumerator never produces such a pair; this guards direct callers.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("invalid Zernike index pair m={m}, n={n}: n - |m| must be even and non-negative")]
pub struct DomainError {
    /// Azimuthal index of the offending mode.
    pub m: i32,
    /// Radial order of the offending mode.
    pub n: u32,
}

/// Exact integer factorial, widened to f64 at the end.
///
/// Radial orders stay small (≤ 13 by construction), far below u128 overflow.
fn factorial(k: u32) -> f64 {
    (1..=k as u128).product::<u128>() as f64
}

/// Polynomial coefficients of R_n^|m|, paired with their rho exponents.
fn radial_coefficients(mode: &ZernikeMode) -> Result<Vec<(f64, i32)>, DomainError> {
    let m_abs = mode.m.unsigned_abs();
    if m_abs > mode.n || (mode.n - m_abs) % 2 != 0 {
        return Err(DomainError {
            m: mode.m,
            n: mode.n,
        });
    }

    let k_max = (mode.n - m_abs) / 2;
    let mut coeffs = Vec::with_capacity(k_max as usize + 1);
    for k in 0..=k_max {
        let sign = if k % 2 == 0 { 1.0 } else { -1.0 };
        let numerator = factorial(mode.n - k);
        let denominator = factorial(k)
            * factorial((mode.n + m_abs) / 2 - k)
            * factorial((mode.n - m_abs) / 2 - k);
        coeffs.push((sign * numerator / denominator, (mode.n - 2 * k) as i32));
    }
    Ok(coeffs)
}

/// Evaluate the radial polynomial R_n^|m| at a normalized radius.
///
/// # Errors
/// * `DomainError` - n − |m| is negative or odd
pub fn radial_polynomial(mode: &ZernikeMode, rho: f64) -> Result<f64, DomainError> {
    let coeffs = radial_coefficients(mode)?;
    Ok(coeffs
        .iter()
        .map(|&(c, power)| c * rho.powi(power))
        .sum())
}

/// Evaluate one mode's basis function at a sample position.
///
/// # Errors
/// * `DomainError` - n − |m| is negative or odd
pub fn evaluate_mode(mode: &ZernikeMode, rho: f64, phi: f64) -> Result<f64, DomainError> {
    let radial = radial_polynomial(mode, rho)?;
    let m_abs = mode.m.unsigned_abs() as f64;
    let angular = if mode.m >= 0 {
        (m_abs * phi).cos()
    } else {
        (m_abs * phi).sin()
    };
    Ok(radial * angular)
}

/// Build the dense basis matrix: one row per sample, one column per mode.
///
/// Column order follows the mode list, which must be the enumeration order
/// the coefficients and statistics will be indexed by.
///
/// # Errors
/// * `DomainError` - a mode's index pair is outside the valid range
pub fn build_basis(
    modes: &[ZernikeMode],
    rho: &Array1<f64>,
    phi: &Array1<f64>,
) -> Result<Array2<f64>, DomainError> {
    let n_samples = rho.len();
    let mut basis = Array2::<f64>::zeros((n_samples, modes.len()));

    for (col, mode) in modes.iter().enumerate() {
        let coeffs = radial_coefficients(mode)?;
        let m_abs = mode.m.unsigned_abs() as f64;
        for (row, (&rho_i, &phi_i)) in rho.iter().zip(phi.iter()).enumerate() {
            let radial: f64 = coeffs
                .iter()
                .map(|&(c, power)| c * rho_i.powi(power))
                .sum();
            let angular = if mode.m >= 0 {
                (m_abs * phi_i).cos()
            } else {
                (m_abs * phi_i).sin()
            };
            basis[(row, col)] = radial * angular;
        }
    }
    Ok(basis)
}
