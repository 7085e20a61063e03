//! End-to-end surface analysis.
//!
//! Wires the pipeline together: normalize coordinates, remove the best-fit
//! plane, decompose the as-measured heights into Zernike modes, and fit the
//! sphere and conic-asphere models to the plane-removed heights. One call,
//! one fully populated result; any failure surfaces as a typed error with
//! nothing partial returned.

use log::debug;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::basis::{build_basis, DomainError};
use crate::config::{AnalysisConfig, ConfigurationError};
use crate::conic::{fit_asphere, fit_sphere, initial_radius, ConicFitError, ConicFitResult};
use crate::coords::{InvalidInputError, NormalizedSurface, SurfaceSamples};
use crate::decompose::{decompose, DecomposeError};
use crate::linalg::SingularMatrixError;
use crate::modes::{enumerate_modes, mode_name, ZernikeMode};
use crate::plane::{remove_plane, PlaneRemoval};
use crate::stats::{per_mode_stats, sfe_descending_order, surface_stats, SurfaceStats};

/// Errors from a full analysis run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Malformed or degenerate sample arrays.
    #[error(transparent)]
    InvalidInput(#[from] InvalidInputError),

    /// Unrecognized unit or mode-count selection.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Mode index outside the valid range (defensive; the enumerator cannot
    /// produce one).
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Plane removal failed on collinear samples.
    #[error(transparent)]
    Singular(#[from] SingularMatrixError),

    /// Mode decomposition failed.
    #[error(transparent)]
    Decompose(#[from] DecomposeError),

    /// Sphere or asphere fit failed.
    #[error(transparent)]
    ConicFit(#[from] ConicFitError),
}

/// One mode's entry in the decomposition report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeReport {
    /// The mode's (m, n) indices.
    pub mode: ZernikeMode,
    /// Display label in the `Z[m][n]` convention.
    pub label: String,
    /// Classical mode name, when the mode has one.
    pub name: Option<String>,
    /// Fitted coefficient.
    pub coefficient: f64,
    /// PV and SFE of this mode's contribution map.
    pub stats: SurfaceStats,
}

/// The Zernike branch of an analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZernikeAnalysis {
    /// Per-mode reports in enumeration order.
    pub reports: Vec<ModeReport>,
    /// Per-mode contribution maps, one column per mode, sample-aligned rows.
    pub contributions: Array2<f64>,
    /// Heights minus the sum of all mode contributions.
    pub residual: Array1<f64>,
    /// Report order: descending SFE when sorting is requested, otherwise
    /// enumeration order.
    pub display_order: Vec<usize>,
}

/// Full analysis result: both branches plus the shared preprocessing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceAnalysis {
    /// Centered samples with polar coordinates.
    pub surface: NormalizedSurface,
    /// Best-fit plane and plane-removed heights.
    pub plane: PlaneRemoval,
    /// PV/SFE of the as-measured heights.
    pub raw_stats: SurfaceStats,
    /// PV/SFE of the plane-removed heights.
    pub plane_removed_stats: SurfaceStats,
    /// Zernike decomposition branch.
    pub zernike: ZernikeAnalysis,
    /// Best-fit sphere against the plane-removed heights.
    pub sphere: ConicFitResult,
    /// Best-fit conic asphere against the plane-removed heights.
    pub asphere: ConicFitResult,
}

/// Run the full analysis on a set of surface samples.
///
/// The Zernike decomposition consumes the as-measured heights; both conic
/// fits consume the plane-removed heights, with the seed sign taken from the
/// as-measured heights.
///
/// # Errors
/// Any of the component errors, forwarded unchanged; no retries happen here.
pub fn run_analysis(
    samples: &SurfaceSamples,
    config: &AnalysisConfig,
) -> Result<SurfaceAnalysis, AnalysisError> {
    let n_max = config.max_radial_order()?;
    let unit_factor = config.units.unit_factor();

    let surface = NormalizedSurface::new(samples)?;
    let plane = remove_plane(&surface.x, &surface.y, &surface.z)?;
    debug!(
        "analysis: {} samples, {} modes requested, unit factor {:e}",
        surface.len(),
        config.mode_count,
        unit_factor
    );

    let raw_stats = surface_stats(surface.z.view(), unit_factor);
    let plane_removed_stats = surface_stats(plane.residual.view(), unit_factor);

    // Zernike branch: joint fit against the as-measured heights.
    let modes = enumerate_modes(n_max);
    let basis = build_basis(&modes, &surface.rho, &surface.phi)?;
    let decomposition = decompose(&basis, &surface.z)?;
    let mode_stats = per_mode_stats(&decomposition.contributions, unit_factor);

    let reports: Vec<ModeReport> = modes
        .iter()
        .enumerate()
        .map(|(i, &mode)| ModeReport {
            mode,
            label: mode.label(),
            name: mode_name(i).map(str::to_string),
            coefficient: decomposition.coefficients[i],
            stats: mode_stats[i],
        })
        .collect();
    let display_order = if config.sort_by_sfe {
        sfe_descending_order(&mode_stats)
    } else {
        (0..reports.len()).collect()
    };

    let zernike = ZernikeAnalysis {
        reports,
        contributions: decomposition.contributions,
        residual: decomposition.residual,
        display_order,
    };

    // Conic branch: fits against the plane-removed heights, seeded from the
    // as-measured sag profile.
    let radius_seed = initial_radius(&surface.r, &surface.z)?;
    let sphere = fit_sphere(&surface.r, &plane.residual, radius_seed)?;
    let asphere = fit_asphere(&surface.r, &plane.residual, radius_seed)?;

    Ok(SurfaceAnalysis {
        surface,
        plane,
        raw_stats,
        plane_removed_stats,
        zernike,
        sphere,
        asphere,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SampleUnits;
    use ndarray::Array1;
    use std::f64::consts::TAU;

    fn disk_samples<F>(sag: F) -> SurfaceSamples
    where
        F: Fn(f64, f64) -> f64,
    {
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        let mut zs = Vec::new();
        for ring in 1..=10 {
            let radius = 25.0 * ring as f64 / 10.0;
            for step in 0..36 {
                let theta = TAU * step as f64 / 36.0;
                let x = radius * theta.cos();
                let y = radius * theta.sin();
                xs.push(x);
                ys.push(y);
                zs.push(sag(x, y));
            }
        }
        SurfaceSamples::new(
            Array1::from_vec(xs),
            Array1::from_vec(ys),
            Array1::from_vec(zs),
        )
        .unwrap()
    }

    #[test]
    fn test_invalid_mode_count_rejected() {
        let samples = disk_samples(|_, _| 0.0);
        let config = AnalysisConfig {
            mode_count: 7,
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            run_analysis(&samples, &config),
            Err(AnalysisError::Configuration(_))
        ));
    }

    #[test]
    fn test_full_run_populates_all_branches() {
        // Gentle spherical surface in millimeters.
        let samples = disk_samples(|x, y| {
            let r2 = x * x + y * y;
            r2 / (2.0 * 5000.0)
        });
        let config = AnalysisConfig {
            units: SampleUnits::Millimeters,
            mode_count: 6,
            sort_by_sfe: true,
        };

        let analysis = run_analysis(&samples, &config).unwrap();
        assert_eq!(analysis.zernike.reports.len(), 6);
        assert_eq!(analysis.zernike.display_order.len(), 6);
        assert_eq!(analysis.sphere.conic_constant, None);
        assert!(analysis.asphere.conic_constant.is_some());
        assert!(analysis.raw_stats.pv > 0.0);
    }

    #[test]
    fn test_display_order_sorted_by_sfe() {
        let samples = disk_samples(|x, y| 1e-4 * x + 2e-5 * (x * x + y * y));
        let config = AnalysisConfig {
            units: SampleUnits::Millimeters,
            mode_count: 10,
            sort_by_sfe: true,
        };

        let analysis = run_analysis(&samples, &config).unwrap();
        let order = &analysis.zernike.display_order;
        for pair in order.windows(2) {
            let a = analysis.zernike.reports[pair[0]].stats.sfe;
            let b = analysis.zernike.reports[pair[1]].stats.sfe;
            assert!(a >= b);
        }
    }

    #[test]
    fn test_unsorted_display_order_is_enumeration_order() {
        let samples = disk_samples(|x, _| 1e-4 * x);
        let config = AnalysisConfig {
            units: SampleUnits::Millimeters,
            mode_count: 6,
            sort_by_sfe: false,
        };

        let analysis = run_analysis(&samples, &config).unwrap();
        assert_eq!(analysis.zernike.display_order, vec![0, 1, 2, 3, 4, 5]);
    }
}
