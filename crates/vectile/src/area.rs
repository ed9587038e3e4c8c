//! Area - immutable address of one cell in the spherical tile pyramid.
//!
//! Areas use the standard XYZ convention: `z` is the level, `x` grows
//! eastwards from the antimeridian and `y` grows southwards from the
//! northern Mercator limit.
//!
//! ```text
//!   my = +π ┌───────┬───────┐
//!           │ (1,0) │ (1,0) │      child(i): x' = 2x + (i & 1)
//!           │  ,0   │  ,1   │                y' = 2y + (i >> 1)
//!   my = 0  ├───────┼───────┤
//!           │ (1,0) │ (1,1) │
//!           │  ,1   │  ,1   │
//!   my = -π └───────┴───────┘
//!         mx = -π   0      +π
//! ```

use std::f64::consts::PI;

use crate::constants::{MAX_AREA_LEVEL, MERCATOR_EXTENT};

/// Address of one cell in the tile pyramid.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct Area {
  /// Level (0 = whole planet).
  pub z: u8,
  /// Column at this level, `0 <= x < 2^z`.
  pub x: u32,
  /// Row at this level, `0 <= y < 2^z`.
  pub y: u32,
}

impl Area {
  /// The level-0 cell covering the whole Mercator square.
  pub const ROOT: Self = Self { z: 0, x: 0, y: 0 };

  /// Create an area, returning `None` when the coordinates are out of range.
  pub fn new(z: u8, x: u32, y: u32) -> Option<Self> {
    if z > MAX_AREA_LEVEL {
      return None;
    }
    let size = 1u64 << z;
    if u64::from(x) >= size || u64::from(y) >= size {
      return None;
    }
    Some(Self { z, x, y })
  }

  /// Child `i` (0..4): bit 0 selects east, bit 1 selects south.
  ///
  /// Returns `None` at the deepest addressable level.
  pub fn child(&self, i: usize) -> Option<Self> {
    if self.z >= MAX_AREA_LEVEL || i >= 4 {
      return None;
    }
    Some(Self {
      z: self.z + 1,
      x: self.x * 2 + (i as u32 & 1),
      y: self.y * 2 + ((i as u32 >> 1) & 1),
    })
  }

  /// All four children in index order.
  pub fn children(&self) -> Option<[Self; 4]> {
    Some([self.child(0)?, self.child(1)?, self.child(2)?, self.child(3)?])
  }

  /// Parent cell, `None` for the root.
  pub fn parent(&self) -> Option<Self> {
    if self.z == 0 {
      return None;
    }
    Some(Self {
      z: self.z - 1,
      x: self.x / 2,
      y: self.y / 2,
    })
  }

  /// True when `other` is this area or lies inside it.
  pub fn contains(&self, other: &Area) -> bool {
    if other.z < self.z {
      return false;
    }
    let shift = other.z - self.z;
    (other.x >> shift) == self.x && (other.y >> shift) == self.y
  }

  /// Normalized Mercator region of this area.
  pub fn mercator(&self) -> MercatorRegion {
    let msize = MERCATOR_EXTENT / (1u64 << self.z) as f64;
    MercatorRegion {
      mx_min: -PI + f64::from(self.x) * msize,
      my_min: PI - f64::from(self.y + 1) * msize,
      msize,
    }
  }
}

impl std::fmt::Display for Area {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}/{}/{}", self.z, self.x, self.y)
  }
}

/// Square region in normalized Mercator coordinates (`[-π, π]²`).
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct MercatorRegion {
  /// Western edge (= longitude in radians).
  pub mx_min: f64,
  /// Southern edge in Mercator units.
  pub my_min: f64,
  /// Edge length.
  pub msize: f64,
}

impl MercatorRegion {
  /// Longitude range `(λmin, λmax)` in radians.
  #[inline]
  pub fn longitudes(&self) -> (f64, f64) {
    (self.mx_min, self.mx_min + self.msize)
  }

  /// Latitude range `(φmin, φmax)` in radians.
  #[inline]
  pub fn latitudes(&self) -> (f64, f64) {
    (gudermannian(self.my_min), gudermannian(self.my_min + self.msize))
  }

  /// Quadrant `i` of this region using the same indexing as [`Area::child`].
  #[inline]
  pub fn quadrant(&self, i: usize) -> Self {
    let half = self.msize * 0.5;
    let east = (i & 1) as f64;
    let north = 1.0 - ((i >> 1) & 1) as f64;
    Self {
      mx_min: self.mx_min + east * half,
      my_min: self.my_min + north * half,
      msize: half,
    }
  }
}

/// Latitude of a normalized Mercator ordinate.
#[inline]
pub fn gudermannian(my: f64) -> f64 {
  2.0 * my.exp().atan() - PI / 2.0
}

#[cfg(test)]
#[path = "area_test.rs"]
mod area_test;
