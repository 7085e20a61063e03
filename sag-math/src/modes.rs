//! Zernike mode enumeration.
//!
//! Modes are identified by the azimuthal index m and radial order n, with
//! n − |m| even and non-negative. Enumeration is in pyramid order: all modes
//! of radial order 0 first, then order 1, order 2, and so on, with m
//! ascending from −n to n inside each order. Every array in a decomposition
//! (basis columns, coefficients, statistics) is indexed by this order.

use serde::{Deserialize, Serialize};

/// Largest radial order the enumeration tables cover.
pub const MAX_RADIAL_ORDER: u32 = 13;

/// Classical names for the low-order modes, indexed by enumeration position.
const MODE_NAMES: [&str; 13] = [
    "Piston",
    "Tip",
    "Tilt",
    "Astigmatism 1",
    "Defocus",
    "Astigmatism 2",
    "Trefoil 1",
    "Coma 1",
    "Coma 2",
    "Trefoil 2",
    "",
    "",
    "Spherical Aberration",
];

/// A single Zernike mode (m, n).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZernikeMode {
    /// Azimuthal index; negative values select the sine angular term.
    pub m: i32,
    /// Radial order.
    pub n: u32,
}

impl ZernikeMode {
    /// Display label in the `Z[m][n]` convention.
    pub fn label(&self) -> String {
        format!("Z[{}][{}]", self.m, self.n)
    }
}

/// Classical name of the mode at an enumeration position, if it has one.
pub fn mode_name(index: usize) -> Option<&'static str> {
    MODE_NAMES.get(index).copied().filter(|s| !s.is_empty())
}

/// Mode counts reachable by whole radial orders: 3, 6, 10, …, 105.
///
/// The count for maximum radial order n is the (n+1)-th triangular number.
pub fn supported_mode_counts() -> Vec<usize> {
    (2..=MAX_RADIAL_ORDER as usize + 1)
        .map(|k| k * (k + 1) / 2)
        .collect()
}

/// Maximum radial order whose full pyramid holds exactly `mode_count` modes.
///
/// Returns `None` when the count is not a triangular number in the supported
/// range.
pub fn max_radial_order(mode_count: usize) -> Option<u32> {
    (0..=MAX_RADIAL_ORDER).find(|&n| {
        let k = n as usize + 1;
        k * (k + 1) / 2 == mode_count
    })
}

/// Enumerate all modes up to and including radial order `n_max`, in pyramid
/// order.
pub fn enumerate_modes(n_max: u32) -> Vec<ZernikeMode> {
    let mut modes = Vec::with_capacity(((n_max as usize + 1) * (n_max as usize + 2)) / 2);
    for n in 0..=n_max {
        let mut m = -(n as i32);
        while m <= n as i32 {
            modes.push(ZernikeMode { m, n });
            m += 2;
        }
    }
    modes
}
