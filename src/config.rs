//! Tolerance rules and parameters controlling a grouping run.

use mzpeaks::coordinate::SimpleInterval;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::isotopes::C13_MASS_SHIFT;

/// A two-sided m/z tolerance combining a proportional part and an absolute
/// floor.
///
/// The half-width of the window around a reference mass is the larger of
/// `ppm * 1e-6 * |mass|` and `absolute`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MzTolerance {
    /// Proportional part in parts per million
    pub ppm: f64,
    /// Absolute floor in m/z units
    pub absolute: f64,
}

impl MzTolerance {
    pub fn new(ppm: f64, absolute: f64) -> Self {
        Self { ppm, absolute }
    }

    /// Window half-width at `mz`
    pub fn delta_at(&self, mz: f64) -> f64 {
        (mz.abs() * self.ppm * 1e-6).max(self.absolute)
    }

    /// The window centered on `mz`
    pub fn bounds(&self, mz: f64) -> SimpleInterval<f64> {
        let delta = self.delta_at(mz);
        SimpleInterval::new(mz - delta, mz + delta)
    }

    /// Whether `query` falls inside the window centered on `reference`
    pub fn test(&self, reference: f64, query: f64) -> bool {
        (query - reference).abs() <= self.delta_at(reference)
    }
}

impl Default for MzTolerance {
    fn default() -> Self {
        Self {
            ppm: 5.0,
            absolute: 0.0,
        }
    }
}

/// Retention-time tolerance, either fixed or proportional to the reference
/// time.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RtTolerance {
    /// Fixed half-width in time units
    Absolute(f64),
    /// Half-width as a fraction of the reference time
    Relative(f64),
}

impl RtTolerance {
    /// Window half-width at `rt`
    pub fn delta_at(&self, rt: f64) -> f64 {
        match self {
            Self::Absolute(delta) => *delta,
            Self::Relative(fraction) => rt.abs() * fraction,
        }
    }

    /// The window centered on `rt`
    pub fn bounds(&self, rt: f64) -> SimpleInterval<f64> {
        let delta = self.delta_at(rt);
        SimpleInterval::new(rt - delta, rt + delta)
    }

    /// Whether `query` falls inside the window centered on `reference`
    pub fn test(&self, reference: f64, query: f64) -> bool {
        (query - reference).abs() <= self.delta_at(reference)
    }
}

impl Default for RtTolerance {
    fn default() -> Self {
        Self::Relative(1e-4)
    }
}

/// Parameters for isotope pair detection inside a clique.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IsotopeParams {
    /// Highest charge state tested for either member of a pair
    pub max_charge: i32,
    /// Mass accuracy of the instrument in parts per million
    pub ppm: f64,
    /// Expected mass difference between isotope neighbors
    pub mass_shift: f64,
}

impl Default for IsotopeParams {
    fn default() -> Self {
        Self {
            max_charge: 3,
            ppm: 10.0,
            mass_shift: C13_MASS_SHIFT,
        }
    }
}

/// Parameters for a full grouping run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CliqueParams {
    /// m/z window of the duplicate filter
    pub mz_tolerance: MzTolerance,
    /// Retention-time window of the duplicate filter
    pub rt_tolerance: RtTolerance,
    /// Highest relative intensity difference two duplicates may show
    pub intensity_tolerance: f64,
    /// Stop once the relative log-likelihood gain of a solver round drops
    /// below this
    pub convergence_tolerance: f64,
    /// Whether near-identical features are removed before clustering
    pub filter_duplicates: bool,
    /// Round budget of the clique network solver
    pub max_rounds: usize,
    pub isotopes: IsotopeParams,
}

impl Default for CliqueParams {
    fn default() -> Self {
        Self {
            mz_tolerance: MzTolerance::default(),
            rt_tolerance: RtTolerance::default(),
            intensity_tolerance: 1e-4,
            convergence_tolerance: 1e-6,
            filter_duplicates: true,
            max_rounds: 100,
            isotopes: IsotopeParams::default(),
        }
    }
}
