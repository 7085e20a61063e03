//! Analysis configuration.
//!
//! Every tunable the analysis reads arrives through [`AnalysisConfig`];
//! nothing is pulled from ambient state. The unit selector is restricted to
//! the two calibrated options: samples in meters report in nanometers via
//! 1e9, samples in millimeters report in nanometers via 1e6.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::modes::{max_radial_order, supported_mode_counts};

/// Errors from unrecognized configuration values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// Unit name is not one of the recognized options.
    #[error("unrecognized units {0:?}: expected \"meters\" or \"millimeters\"")]
    UnknownUnits(String),

    /// Unit factor is not one of the recognized options.
    #[error("unrecognized unit factor {0:e}: expected 1e9 (meters) or 1e6 (millimeters)")]
    UnknownUnitFactor(f64),

    /// Mode count is not reachable by whole radial orders.
    #[error("unsupported Zernike mode count {requested}: supported counts are {supported:?}")]
    UnsupportedModeCount {
        /// The requested mode count.
        requested: usize,
        /// The reachable counts (triangular numbers).
        supported: Vec<usize>,
    },
}

/// Length unit the samples are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleUnits {
    /// Samples in meters; statistics report in nanometers via 1e9.
    Meters,
    /// Samples in millimeters; statistics report in nanometers via 1e6.
    Millimeters,
}

impl SampleUnits {
    /// Scale factor from the sample unit to nanometers.
    pub fn unit_factor(self) -> f64 {
        match self {
            SampleUnits::Meters => 1e9,
            SampleUnits::Millimeters => 1e6,
        }
    }

    /// Recover the unit from a raw factor.
    ///
    /// # Errors
    /// * `ConfigurationError::UnknownUnitFactor` - factor is neither 1e9 nor 1e6
    pub fn from_factor(factor: f64) -> Result<Self, ConfigurationError> {
        if factor == 1e9 {
            Ok(SampleUnits::Meters)
        } else if factor == 1e6 {
            Ok(SampleUnits::Millimeters)
        } else {
            Err(ConfigurationError::UnknownUnitFactor(factor))
        }
    }
}

impl FromStr for SampleUnits {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "meters" => Ok(SampleUnits::Meters),
            "millimeters" => Ok(SampleUnits::Millimeters),
            other => Err(ConfigurationError::UnknownUnits(other.to_string())),
        }
    }
}

/// Configuration for one analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Unit the samples are expressed in.
    pub units: SampleUnits,
    /// Total number of Zernike modes to decompose into.
    pub mode_count: usize,
    /// Report modes ordered by descending SFE instead of enumeration order.
    pub sort_by_sfe: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            units: SampleUnits::Meters,
            mode_count: 6,
            sort_by_sfe: true,
        }
    }
}

impl AnalysisConfig {
    /// Validate the mode count and return the maximum radial order it maps to.
    ///
    /// # Errors
    /// * `ConfigurationError::UnsupportedModeCount` - count is not a
    ///   triangular number in the supported range
    pub fn max_radial_order(&self) -> Result<u32, ConfigurationError> {
        max_radial_order(self.mode_count).ok_or_else(|| {
            ConfigurationError::UnsupportedModeCount {
                requested: self.mode_count,
                supported: supported_mode_counts(),
            }
        })
    }
}
