//! Geocentric bounding volumes of spherical tile regions.
//!
//! Culling works on a volume that encloses the shell patch
//! `λ ∈ [λmin, λmax], φ ∈ [φmin, φmax], ρ ∈ [R + hmin, R + hmax]`.
//!
//! ```text
//!   level 0        sphere of radius R + hmax
//!   level 1        half the planet: λ spans π, φ one hemisphere
//!   level >= 2     λ inside one quadrant, φ inside one hemisphere
//!
//!   quadrant by s = λmin + λmax:
//!
//!        s < -π        -π <= s < 0      0 <= s < π        s >= π
//!     [-π, -π/2]       [-π/2, 0]        [0, π/2]         [π/2, π]
//!     cos<=0 sin<=0    cos>=0 sin<=0    cos>=0 sin>=0    cos<=0 sin>=0
//! ```
//!
//! Tile edges are aligned to the quadrant and equator boundaries at those
//! levels, so `cos` and `sin` are monotonic over each interval and the box
//! corners are found from the interval ends. Taking the min/max of the
//! transformed corners is wrong near the antimeridian and the poles.

use glam::DVec3;

use super::Plane;
use crate::area::Area;
use crate::constants::{DEFAULT_HEIGHT_MAX, DEFAULT_HEIGHT_MIN};

/// Terrain elevation bounds of a cell in meters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeightRange {
  /// Lowest terrain height.
  pub min: f64,
  /// Highest terrain height.
  pub max: f64,
}

impl HeightRange {
  /// Flat terrain at sea level.
  pub const FLAT: Self = Self { min: 0.0, max: 0.0 };

  /// Range wide enough for any terrain on Earth.
  pub const CONSERVATIVE: Self = Self {
    min: DEFAULT_HEIGHT_MIN,
    max: DEFAULT_HEIGHT_MAX,
  };

  /// Create a height range; the bounds are swapped if given in reverse.
  pub fn new(a: f64, b: f64) -> Self {
    Self {
      min: a.min(b),
      max: a.max(b),
    }
  }

  /// Mid height.
  #[inline]
  pub fn mid(&self) -> f64 {
    (self.min + self.max) * 0.5
  }
}

impl Default for HeightRange {
  fn default() -> Self {
    Self::FLAT
  }
}

/// Double-precision axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DAabb3 {
  /// Minimum corner (inclusive).
  pub min: DVec3,
  /// Maximum corner (inclusive).
  pub max: DVec3,
}

impl DAabb3 {
  /// Create a new AABB from min and max corners.
  ///
  /// # Panics
  /// Debug-asserts that min <= max on all axes.
  pub fn new(min: DVec3, max: DVec3) -> Self {
    debug_assert!(
      min.x <= max.x && min.y <= max.y && min.z <= max.z,
      "AABB min must be <= max on all axes"
    );
    Self { min, max }
  }

  /// Check if this AABB contains a point.
  #[inline]
  pub fn contains_point(&self, point: DVec3) -> bool {
    point.cmpge(self.min).all() && point.cmple(self.max).all()
  }

  /// Corner furthest along the plane normal.
  #[inline]
  fn positive_vertex(&self, plane: &Plane) -> DVec3 {
    DVec3::select(plane.normal.cmpge(DVec3::ZERO), self.max, self.min)
  }

  /// True when the whole box lies on the outer side of `plane`.
  #[inline]
  pub fn is_outside(&self, plane: &Plane) -> bool {
    plane.distance_to(self.positive_vertex(plane)) < 0.0
  }
}

/// Bounding volume of one tile region.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RegionBounds {
  /// Whole planet, tested by sphere radius.
  Sphere {
    /// Outer radius.
    radius: f64,
  },
  /// Box enclosing the shell patch.
  Box(DAabb3),
}

impl RegionBounds {
  /// Bounding volume of `area` with the given terrain heights.
  pub fn new(area: &Area, heights: HeightRange, planet_radius: f64) -> Self {
    let rmin = planet_radius + heights.min;
    let rmax = planet_radius + heights.max;
    match area.z {
      0 => Self::Sphere { radius: rmax },
      1 => Self::Box(half_planet_box(area, rmin, rmax)),
      _ => Self::Box(quadrant_box(area, rmin, rmax)),
    }
  }

  /// True when the volume is entirely outside any of `planes`.
  pub fn is_outside(&self, planes: &[Plane]) -> bool {
    match self {
      Self::Sphere { radius } => planes.iter().any(|p| p.distance < -radius),
      Self::Box(aabb) => planes.iter().any(|p| aabb.is_outside(p)),
    }
  }
}

/// Horizontal radius and z extents for one hemisphere.
///
/// Returns `(h_lo, h_hi, z_lo, z_hi)` where `h = ρ·cos φ`, `z = ρ·sin φ`.
fn meridian_extents(phi_min: f64, phi_max: f64, rmin: f64, rmax: f64) -> (f64, f64, f64, f64) {
  if phi_min + phi_max >= 0.0 {
    // northern: cos decreasing, sin >= 0
    (
      rmin * phi_max.cos(),
      rmax * phi_min.cos(),
      rmin * phi_min.sin(),
      rmax * phi_max.sin(),
    )
  } else {
    // southern: cos increasing, sin <= 0
    (
      rmin * phi_min.cos(),
      rmax * phi_max.cos(),
      rmax * phi_min.sin(),
      rmin * phi_max.sin(),
    )
  }
}

fn half_planet_box(area: &Area, rmin: f64, rmax: f64) -> DAabb3 {
  let region = area.mercator();
  let (lam_min, lam_max) = region.longitudes();
  let (phi_min, phi_max) = region.latitudes();

  // Latitude 0 is always an edge at level 1, so h peaks at rmax.
  let (_, _, z_lo, z_hi) = meridian_extents(phi_min, phi_max, rmin, rmax);
  let h_hi = rmax;

  // λ spans a full half turn: cos covers [-1, 1], sin keeps one sign.
  let (y_lo, y_hi) = if lam_min + lam_max < 0.0 {
    (-h_hi, 0.0)
  } else {
    (0.0, h_hi)
  };

  DAabb3::new(
    DVec3::new(-h_hi, y_lo, z_lo),
    DVec3::new(h_hi, y_hi, z_hi),
  )
}

fn quadrant_box(area: &Area, rmin: f64, rmax: f64) -> DAabb3 {
  let region = area.mercator();
  let (lam_min, lam_max) = region.longitudes();
  let (phi_min, phi_max) = region.latitudes();
  let (h_lo, h_hi, z_lo, z_hi) = meridian_extents(phi_min, phi_max, rmin, rmax);

  let (cos_min, cos_max) = (lam_min.cos(), lam_max.cos());
  let (sin_min, sin_max) = (lam_min.sin(), lam_max.sin());
  let s = lam_min + lam_max;
  let pi = std::f64::consts::PI;

  let (x_lo, x_hi, y_lo, y_hi) = if s < -pi {
    // [-π, -π/2]
    (h_hi * cos_min, h_lo * cos_max, h_hi * sin_max, h_lo * sin_min)
  } else if s < 0.0 {
    // [-π/2, 0]
    (h_lo * cos_min, h_hi * cos_max, h_hi * sin_min, h_lo * sin_max)
  } else if s < pi {
    // [0, π/2]
    (h_lo * cos_max, h_hi * cos_min, h_lo * sin_min, h_hi * sin_max)
  } else {
    // [π/2, π]
    (h_hi * cos_max, h_lo * cos_min, h_lo * sin_max, h_hi * sin_min)
  };

  DAabb3::new(
    DVec3::new(x_lo.min(x_hi), y_lo.min(y_hi), z_lo.min(z_hi)),
    DVec3::new(x_lo.max(x_hi), y_lo.max(y_hi), z_lo.max(z_hi)),
  )
}

#[cfg(test)]
#[path = "bounds_test.rs"]
mod bounds_test;
