//! LodRange - bounded ideal detail level over a cell's visible footprint.

use crate::area::Area;
use crate::constants::HYSTERESIS_BAND;
use crate::geom::HeightRange;

/// Minimum, maximum and mean ideal level over a cell's visible footprint.
///
/// Invariant: `lower <= round(center) <= upper`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LodRange {
  /// Rounded minimum ideal level.
  pub lower: i32,
  /// Rounded maximum ideal level.
  pub upper: i32,
  /// Unrounded mean ideal level.
  pub center: f64,
}

impl LodRange {
  /// Build from unrounded bounds (bias already applied).
  pub fn from_bounds(min: f64, max: f64) -> Self {
    Self {
      lower: min.round() as i32,
      upper: max.round() as i32,
      center: (min + max) * 0.5,
    }
  }

  /// More than half the footprint wants a coarser level than `z`.
  #[inline]
  pub fn lower_half_dominant(&self, z: u8) -> bool {
    self.center - f64::from(z) < -HYSTERESIS_BAND
  }

  /// More than half the footprint wants a finer level than `z`.
  #[inline]
  pub fn upper_half_dominant(&self, z: u8) -> bool {
    self.center - f64::from(z) > HYSTERESIS_BAND
  }
}

/// Source of ideal-level estimates for cells.
///
/// `None` means the cell could not be bounded: degenerate camera geometry or
/// a cell outside the estimator's effective range.
pub trait LevelEstimator {
  /// Estimate the ideal level range of `area` with terrain `heights`.
  fn calculate(&self, area: &Area, heights: HeightRange) -> Option<LodRange>;
}
