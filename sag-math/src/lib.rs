//! sag-math - Zernike decomposition and conic fitting for sag maps of
//! circular optics.
//!
//! This crate is the numerical engine behind a surface-form analysis tool:
//! it takes already-ingested (x, y, z) height samples over a circular
//! aperture and produces
//!
//! - a Zernike mode decomposition with per-mode coefficients, contribution
//!   maps and PV/SFE statistics,
//! - best-fit sphere and conic-asphere models with residual maps.
//!
//! The pipeline stages are:
//!
//! 1. **Coords** - center the samples and derive polar coordinates.
//! 2. **Plane** - remove the best-fit piston/tip/tilt plane.
//! 3. **Modes / Basis / Decompose** - enumerate Zernike modes, evaluate the
//!    basis matrix, solve the joint least-squares decomposition.
//! 4. **Stats** - PV and SFE per mode and for the full surface.
//! 5. **Conic** - Levenberg–Marquardt sphere and asphere fits with a
//!    sign-aware initial guess.
//!
//! Every component is a pure function of its inputs: no state is kept
//! between runs, and identical inputs produce identical results. File
//! ingestion and presentation are external collaborators; this crate never
//! touches the filesystem or the network.
//!
//! # Example
//!
//! ```
//! use ndarray::Array1;
//! use sag_math::{run_analysis, AnalysisConfig, SampleUnits, SurfaceSamples};
//!
//! // A small spherical cap sampled on rings, coordinates in millimeters.
//! let mut xs = Vec::new();
//! let mut ys = Vec::new();
//! let mut zs = Vec::new();
//! for ring in 1..=6 {
//!     let r = 10.0 * ring as f64 / 6.0;
//!     for step in 0..18 {
//!         let theta = std::f64::consts::TAU * step as f64 / 18.0;
//!         let (x, y) = (r * theta.cos(), r * theta.sin());
//!         xs.push(x);
//!         ys.push(y);
//!         zs.push((x * x + y * y) / (2.0 * 2000.0));
//!     }
//! }
//! let samples = SurfaceSamples::new(
//!     Array1::from_vec(xs),
//!     Array1::from_vec(ys),
//!     Array1::from_vec(zs),
//! )?;
//!
//! let config = AnalysisConfig {
//!     units: SampleUnits::Millimeters,
//!     mode_count: 6,
//!     sort_by_sfe: true,
//! };
//! let analysis = run_analysis(&samples, &config)?;
//! assert_eq!(analysis.zernike.reports.len(), 6);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod analysis;
pub mod basis;
pub mod config;
pub mod conic;
pub mod coords;
pub mod decompose;
pub mod interp;
pub mod levmar;
pub mod linalg;
pub mod modes;
pub mod plane;
pub mod stats;

// Re-export the common entry points.
pub use analysis::{run_analysis, AnalysisError, ModeReport, SurfaceAnalysis, ZernikeAnalysis};
pub use basis::{build_basis, DomainError};
pub use config::{AnalysisConfig, ConfigurationError, SampleUnits};
pub use conic::{
    fit_asphere, fit_sphere, initial_radius, sag_sign, ConicFitError, ConicFitResult,
};
pub use coords::{InvalidInputError, NormalizedSurface, SurfaceSamples};
pub use decompose::{decompose, DecomposeError, DecompositionResult};
pub use levmar::FitConvergenceError;
pub use linalg::SingularMatrixError;
pub use modes::{
    enumerate_modes, max_radial_order, mode_name, supported_mode_counts, ZernikeMode,
};
pub use plane::{remove_plane, PlaneFit, PlaneRemoval};
pub use stats::{per_mode_stats, sfe_descending_order, surface_stats, SurfaceStats};
