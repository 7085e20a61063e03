//! 1-D linear interpolation.
//!
//! Used by the conic fitter to resample the radius/sag relationship onto a
//! uniform grid before taking finite differences. Interval lookup is a
//! binary search, so a full resample is O(n log n).

use thiserror::Error;

/// Errors from interpolation operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InterpError {
    /// Query point outside the data range.
    #[error("value {0} is out of bounds for interpolation range [{1}, {2}]")]
    OutOfBounds(f64, f64, f64),
    /// Fewer than 2 data points.
    #[error("input arrays must have at least 2 points")]
    InsufficientData,
    /// Abscissa and ordinate arrays disagree in length.
    #[error("input arrays must have the same length")]
    MismatchedLengths,
    /// Abscissa values are not sorted ascending.
    #[error("x values must be sorted in ascending order")]
    UnsortedData,
}

fn validate(xs: &[f64], ys: &[f64]) -> Result<(), InterpError> {
    if xs.len() != ys.len() {
        return Err(InterpError::MismatchedLengths);
    }
    if xs.len() < 2 {
        return Err(InterpError::InsufficientData);
    }
    if xs.windows(2).any(|w| w[0] > w[1]) {
        return Err(InterpError::UnsortedData);
    }
    Ok(())
}

/// Linearly interpolate `ys` over sorted `xs` at position `x`.
///
/// Repeated abscissa values are tolerated; a zero-width interval returns its
/// left ordinate.
///
/// # Errors
/// * `InterpError::MismatchedLengths` - array lengths differ
/// * `InterpError::InsufficientData` - fewer than 2 points
/// * `InterpError::UnsortedData` - xs not ascending
/// * `InterpError::OutOfBounds` - x outside [xs\[0\], xs\[n−1\]]
pub fn interp_linear(x: f64, xs: &[f64], ys: &[f64]) -> Result<f64, InterpError> {
    validate(xs, ys)?;

    let n = xs.len();
    if x < xs[0] || x > xs[n - 1] {
        return Err(InterpError::OutOfBounds(x, xs[0], xs[n - 1]));
    }

    // Index of the first abscissa >= x.
    let upper = xs.partition_point(|&v| v < x);
    if upper == 0 {
        return Ok(ys[0]);
    }
    let (x0, x1) = (xs[upper - 1], xs[upper.min(n - 1)]);
    let (y0, y1) = (ys[upper - 1], ys[upper.min(n - 1)]);

    let dx = x1 - x0;
    if dx <= 0.0 {
        return Ok(y0);
    }
    Ok(y0 + (x - x0) / dx * (y1 - y0))
}

/// Resample (xs, ys) onto `count` uniformly spaced positions spanning the
/// data range, endpoints included.
///
/// # Errors
/// Same conditions as [`interp_linear`]; `count` must be at least 2 or
/// `InterpError::InsufficientData` is returned.
pub fn resample_uniform(
    xs: &[f64],
    ys: &[f64],
    count: usize,
) -> Result<(Vec<f64>, Vec<f64>), InterpError> {
    validate(xs, ys)?;
    if count < 2 {
        return Err(InterpError::InsufficientData);
    }

    let lo = xs[0];
    let hi = xs[xs.len() - 1];
    let step = (hi - lo) / (count - 1) as f64;

    let mut grid = Vec::with_capacity(count);
    let mut values = Vec::with_capacity(count);
    for i in 0..count {
        // Clamp the last point onto the upper bound against rounding drift.
        let x = if i + 1 == count { hi } else { lo + step * i as f64 };
        grid.push(x);
        values.push(interp_linear(x, xs, ys)?);
    }
    Ok((grid, values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_interpolates_midpoints() {
        let xs = [0.0, 1.0, 2.0];
        let ys = [0.0, 10.0, 40.0];
        assert_relative_eq!(interp_linear(0.5, &xs, &ys).unwrap(), 5.0);
        assert_relative_eq!(interp_linear(1.5, &xs, &ys).unwrap(), 25.0);
    }

    #[test]
    fn test_exact_nodes_returned() {
        let xs = [0.0, 1.0, 2.0];
        let ys = [3.0, 7.0, 11.0];
        for (&x, &y) in xs.iter().zip(ys.iter()) {
            assert_relative_eq!(interp_linear(x, &xs, &ys).unwrap(), y);
        }
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let xs = [0.0, 1.0];
        let ys = [0.0, 1.0];
        assert!(matches!(
            interp_linear(-0.1, &xs, &ys),
            Err(InterpError::OutOfBounds(..))
        ));
        assert!(matches!(
            interp_linear(1.1, &xs, &ys),
            Err(InterpError::OutOfBounds(..))
        ));
    }

    #[test]
    fn test_validation_errors() {
        assert_eq!(
            interp_linear(0.0, &[0.0, 1.0], &[0.0]),
            Err(InterpError::MismatchedLengths)
        );
        assert_eq!(
            interp_linear(0.0, &[0.0], &[0.0]),
            Err(InterpError::InsufficientData)
        );
        assert_eq!(
            interp_linear(0.5, &[1.0, 0.0], &[0.0, 1.0]),
            Err(InterpError::UnsortedData)
        );
    }

    #[test]
    fn test_duplicate_abscissa_tolerated() {
        let xs = [0.0, 1.0, 1.0, 2.0];
        let ys = [0.0, 5.0, 7.0, 9.0];
        // The zero-width interval yields its left ordinate.
        assert_relative_eq!(interp_linear(1.0, &xs, &ys).unwrap(), 5.0);
    }

    #[test]
    fn test_resample_uniform_grid() {
        let xs = [0.0, 2.0];
        let ys = [0.0, 4.0];
        let (grid, values) = resample_uniform(&xs, &ys, 5).unwrap();
        assert_eq!(grid.len(), 5);
        assert_relative_eq!(grid[0], 0.0);
        assert_relative_eq!(grid[4], 2.0);
        assert_relative_eq!(values[2], 2.0);
    }
}
