//! Peak-to-valley and surface-form-error statistics.
//!
//! PV is (max − min) and SFE is the population standard deviation, both
//! scaled by the configured unit factor to nanometers and rounded to two
//! decimals for reporting.

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// PV and SFE of one height map, in nanometers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceStats {
    /// Peak-to-valley: (max − min) × unit factor, rounded to 2 decimals.
    pub pv: f64,
    /// Surface form error: standard deviation × unit factor, rounded to
    /// 2 decimals.
    pub sfe: f64,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Compute PV and SFE for a height map.
///
/// # Arguments
/// * `map` - height values
/// * `unit_factor` - scale from the sample unit to nanometers
pub fn surface_stats(map: ArrayView1<'_, f64>, unit_factor: f64) -> SurfaceStats {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    for &v in map.iter() {
        min = min.min(v);
        max = max.max(v);
        sum += v;
    }
    let n = map.len() as f64;
    let mean = sum / n;
    let variance = map.iter().map(|&v| (v - mean) * (v - mean)).sum::<f64>() / n;

    SurfaceStats {
        pv: round2((max - min) * unit_factor),
        sfe: round2(variance.sqrt() * unit_factor),
    }
}

/// Compute PV and SFE for each column of a per-mode contribution matrix.
pub fn per_mode_stats(contributions: &Array2<f64>, unit_factor: f64) -> Vec<SurfaceStats> {
    contributions
        .columns()
        .into_iter()
        .map(|col| surface_stats(col, unit_factor))
        .collect()
}

/// Mode indices ordered by descending SFE.
///
/// Exact ties are broken toward the higher mode index (an ascending sort
/// read back to front), so the ordering is deterministic.
pub fn sfe_descending_order(stats: &[SurfaceStats]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..stats.len()).collect();
    order.sort_by(|&a, &b| {
        stats[b]
            .sfe
            .partial_cmp(&stats[a].sfe)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.cmp(&a))
    });
    order
}
