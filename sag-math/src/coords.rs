//! Coordinate normalization for sag maps over a circular aperture.
//!
//! Raw (x, y, z) samples are centered and converted to the polar
//! representation (radius, angle, normalized radius) that the Zernike basis
//! is evaluated on. The normalization radius max(R) is computed once per
//! surface and frozen for that surface.
//!
//! Two conventions in this module are load-bearing for every downstream
//! angle and statistic and must not be changed independently:
//!
//! - y is centered by the mean of x, not by its own mean,
//! - the sample angle is atan2(x, y), measured from the +y axis.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from malformed or degenerate sample arrays.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidInputError {
    /// Sample arrays disagree in length.
    #[error("sample arrays have mismatched lengths: x={x_len}, y={y_len}, z={z_len}")]
    MismatchedLengths {
        /// Length of the x array.
        x_len: usize,
        /// Length of the y array.
        y_len: usize,
        /// Length of the z array.
        z_len: usize,
    },

    /// Fewer samples than any fit can be anchored on.
    #[error("need at least 3 samples, got {0}")]
    TooFewSamples(usize),

    /// Every sample sits at the aperture center after centering.
    #[error("all sample radii are zero after centering")]
    DegenerateAperture,
}

/// Raw surface samples: aligned (x, y, z) arrays of equal length.
///
/// z is the sag (height) value at each (x, y) position, in the length unit
/// declared by the analysis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceSamples {
    /// Sample x coordinates.
    pub x: Array1<f64>,
    /// Sample y coordinates.
    pub y: Array1<f64>,
    /// Sag values, index-aligned with x and y.
    pub z: Array1<f64>,
}

impl SurfaceSamples {
    /// Bundle aligned coordinate and sag arrays, validating their shapes.
    ///
    /// # Errors
    /// * `InvalidInputError::MismatchedLengths` - arrays disagree in length
    /// * `InvalidInputError::TooFewSamples` - fewer than 3 samples
    pub fn new(
        x: Array1<f64>,
        y: Array1<f64>,
        z: Array1<f64>,
    ) -> Result<Self, InvalidInputError> {
        if x.len() != y.len() || x.len() != z.len() {
            return Err(InvalidInputError::MismatchedLengths {
                x_len: x.len(),
                y_len: y.len(),
                z_len: z.len(),
            });
        }
        if x.len() < 3 {
            return Err(InvalidInputError::TooFewSamples(x.len()));
        }
        Ok(Self { x, y, z })
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Whether the sample set is empty.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// A surface after centering, with derived polar coordinates.
///
/// All arrays are index-aligned with the samples the surface was built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedSurface {
    /// Centered x coordinates (x minus mean of x).
    pub x: Array1<f64>,
    /// Centered y coordinates (y minus mean of x).
    pub y: Array1<f64>,
    /// Sag values, carried through unchanged.
    pub z: Array1<f64>,
    /// Radius of each sample from the aperture center.
    pub r: Array1<f64>,
    /// Sample angle, atan2(x, y).
    pub phi: Array1<f64>,
    /// Radius normalized to the unit disk: r / max(r).
    pub rho: Array1<f64>,
    /// The normalization radius max(r), frozen at construction.
    pub r_max: f64,
}

impl NormalizedSurface {
    /// Center the samples and derive polar coordinates.
    ///
    /// # Errors
    /// * `InvalidInputError::DegenerateAperture` - every centered radius is zero
    pub fn new(samples: &SurfaceSamples) -> Result<Self, InvalidInputError> {
        let n = samples.len() as f64;
        let mean_x = samples.x.sum() / n;

        let x = samples.x.mapv(|v| v - mean_x);
        // Deliberately the mean of x, not of y. Matches the measurement
        // convention every existing dataset was reduced with.
        let y = samples.y.mapv(|v| v - mean_x);

        let r = Array1::from_iter(
            x.iter()
                .zip(y.iter())
                .map(|(&xi, &yi)| (xi * xi + yi * yi).sqrt()),
        );
        // Angle measured from the +y axis: atan2(x, y).
        let phi = Array1::from_iter(
            x.iter().zip(y.iter()).map(|(&xi, &yi)| xi.atan2(yi)),
        );

        let r_max = r.iter().cloned().fold(0.0_f64, f64::max);
        if r_max <= 0.0 {
            return Err(InvalidInputError::DegenerateAperture);
        }
        let rho = r.mapv(|v| v / r_max);

        Ok(Self {
            x,
            y,
            z: samples.z.clone(),
            r,
            phi,
            rho,
            r_max,
        })
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Whether the surface holds no samples.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use std::f64::consts::FRAC_PI_2;

    fn samples(x: Array1<f64>, y: Array1<f64>) -> SurfaceSamples {
        let z = Array1::zeros(x.len());
        SurfaceSamples::new(x, y, z).unwrap()
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let result = SurfaceSamples::new(
            array![1.0, 2.0, 3.0],
            array![1.0, 2.0],
            array![0.0, 0.0, 0.0],
        );
        assert!(matches!(
            result,
            Err(InvalidInputError::MismatchedLengths { .. })
        ));
    }

    #[test]
    fn test_too_few_samples_rejected() {
        let result = SurfaceSamples::new(array![1.0, 2.0], array![1.0, 2.0], array![0.0, 0.0]);
        assert_eq!(result.unwrap_err(), InvalidInputError::TooFewSamples(2));
    }

    #[test]
    fn test_degenerate_aperture_rejected() {
        // All points at the same location collapse to the center.
        let s = samples(array![2.0, 2.0, 2.0], array![2.0, 2.0, 2.0]);
        assert_eq!(
            NormalizedSurface::new(&s).unwrap_err(),
            InvalidInputError::DegenerateAperture
        );
    }

    #[test]
    fn test_x_centered_on_own_mean() {
        let s = samples(array![1.0, 2.0, 3.0], array![0.0, 0.0, 0.0]);
        let surface = NormalizedSurface::new(&s).unwrap();
        assert_relative_eq!(surface.x[0], -1.0, epsilon = 1e-12);
        assert_relative_eq!(surface.x[1], 0.0, epsilon = 1e-12);
        assert_relative_eq!(surface.x[2], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_y_centered_on_x_mean() {
        // mean(x) = 2, mean(y) = 10: y must be shifted by 2, not by 10.
        let s = samples(array![1.0, 2.0, 3.0], array![9.0, 10.0, 11.0]);
        let surface = NormalizedSurface::new(&s).unwrap();
        assert_relative_eq!(surface.y[0], 7.0, epsilon = 1e-12);
        assert_relative_eq!(surface.y[1], 8.0, epsilon = 1e-12);
        assert_relative_eq!(surface.y[2], 9.0, epsilon = 1e-12);
    }

    #[test]
    fn test_angle_measured_from_y_axis() {
        // A point on the +x axis has phi = atan2(1, 0) = pi/2.
        let s = samples(array![1.0, -1.0, 0.0], array![0.0, 0.0, 0.0]);
        let surface = NormalizedSurface::new(&s).unwrap();
        assert_relative_eq!(surface.phi[0], FRAC_PI_2, epsilon = 1e-12);
        assert_relative_eq!(surface.phi[1], -FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn test_rho_normalized_to_unit_disk() {
        let s = samples(array![2.0, -2.0, 0.0, 1.0], array![0.0, 0.0, 0.0, 0.0]);
        let surface = NormalizedSurface::new(&s).unwrap();
        let rho_max = surface.rho.iter().cloned().fold(0.0_f64, f64::max);
        assert_relative_eq!(rho_max, 1.0, epsilon = 1e-12);
        for &rho in surface.rho.iter() {
            assert!((0.0..=1.0).contains(&rho));
        }
    }
}
