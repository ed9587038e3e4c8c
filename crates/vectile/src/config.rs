//! WalkerConfig - configuration for level estimation and tile traversal.

use crate::constants::{
  DEFAULT_TILE_RESOLUTION, DELTA, ETA, MAX_ESTIMATE_LEVEL, PLANET_RADIUS, ZETA,
};
use crate::geom::HeightRange;

/// Subdivision thresholds of the level estimator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LodConfig {
  /// Regions coarser than this level are always split.
  pub zeta: u8,
  /// Coarseness tolerance: split when `leaf.z + eta < mean lod`.
  pub eta: f64,
  /// Spread tolerance: split when `lod_max - lod_min >= delta`.
  pub delta: f64,
  /// Leaves deeper than this are discarded.
  pub max_level: u8,
}

impl Default for LodConfig {
  fn default() -> Self {
    Self {
      zeta: ZETA,
      eta: ETA,
      delta: DELTA,
      max_level: MAX_ESTIMATE_LEVEL,
    }
  }
}

/// Configuration shared by every tile walker of a scene.
#[derive(Clone, Debug, PartialEq)]
pub struct WalkerConfig {
  /// Texels along one tile edge.
  pub tile_resolution: f64,

  /// Planet radius in meters.
  pub planet_radius: f64,

  /// Elevation assumed for cells whose terrain bounds are not known.
  pub default_heights: HeightRange,

  /// Level estimator thresholds.
  pub lod: LodConfig,
}

impl Default for WalkerConfig {
  fn default() -> Self {
    Self {
      tile_resolution: DEFAULT_TILE_RESOLUTION,
      planet_radius: PLANET_RADIUS,
      default_heights: HeightRange::CONSERVATIVE,
      lod: LodConfig::default(),
    }
  }
}
