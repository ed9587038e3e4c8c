//! Numeric constants shared by the level estimator and the tile walker.
//!
//! # Level estimation
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      LEVEL ESTIMATOR CONSTANTS                          │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ZETA   Minimum level of a sampling leaf. Regions coarser than this     │
//! │         are always split, since four corners cannot describe a tile     │
//! │         that covers a large part of the sphere.                         │
//! │                                                                         │
//! │  ETA    A leaf is too coarse when leaf.z + ETA < (lod_min+lod_max)/2.   │
//! │                                                                         │
//! │  DELTA  A leaf is too uneven when lod_max - lod_min >= DELTA.           │
//! │                                                                         │
//! │  MAX_ESTIMATE_LEVEL   Leaves deeper than this are discarded.            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::f64::consts::PI;

/// Mean equatorial radius of the planet in meters.
pub const PLANET_RADIUS: f64 = 6_378_137.0;

/// Minimum absolute level of a leaf region in the level estimator.
pub const ZETA: u8 = 6;

/// Coarseness tolerance between a leaf level and its mean ideal level.
pub const ETA: f64 = 2.0;

/// Maximum LOD spread accepted inside one leaf region.
pub const DELTA: f64 = 1.0;

/// Deepest leaf level the estimator is willing to sample.
pub const MAX_ESTIMATE_LEVEL: u8 = 30;

/// Deepest tile level addressable by [`crate::Area`].
pub const MAX_AREA_LEVEL: u8 = 31;

/// Default number of texels along one edge of a tile.
pub const DEFAULT_TILE_RESOLUTION: f64 = 256.0;

/// Half-width of the level hysteresis band.
///
/// A cell is rendered as-is while its mean ideal level stays within
/// `cell.z ± HYSTERESIS_BAND`.
pub const HYSTERESIS_BAND: f64 = 0.5;

/// Full turn of the normalized Mercator plane.
pub const MERCATOR_EXTENT: f64 = 2.0 * PI;

/// Conservative terrain height range used when a cell's elevation is unknown.
pub const DEFAULT_HEIGHT_MIN: f64 = -11_000.0;
/// Upper bound of [`DEFAULT_HEIGHT_MIN`]'s range.
pub const DEFAULT_HEIGHT_MAX: f64 = 9_000.0;

/// Level bias added to an estimated LOD for a given tile resolution.
///
/// `zbias = log2(2π / tile_resolution)`
#[inline]
pub fn level_bias(tile_resolution: f64) -> f64 {
  (MERCATOR_EXTENT / tile_resolution).log2()
}
